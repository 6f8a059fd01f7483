use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use missive_types::models::Content;

use crate::Database;
use crate::error::MessageError;
use crate::models::parse_timestamp;
use crate::registry::Registry;

/// Store-assigned identity of a freshly written message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedMessage {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

/// Writes a message envelope and its typed payload as one unit.
#[derive(Clone)]
pub struct MessageWriter {
    db: Arc<Database>,
    registry: Arc<dyn Registry>,
}

impl MessageWriter {
    pub fn new(db: Arc<Database>, registry: Arc<dyn Registry>) -> Self {
        Self { db, registry }
    }

    /// Insert the envelope and exactly one payload row inside a single
    /// transaction. On any error nothing is written.
    pub fn create_message(
        &self,
        sender: i64,
        recipient: i64,
        content: &Content,
    ) -> Result<CreatedMessage, MessageError> {
        let created = self.db.with_transaction(
            TransactionBehavior::Immediate,
            |tx| -> Result<CreatedMessage, MessageError> {
                let type_name = content.type_name();
                let type_id = self
                    .registry
                    .message_type_id(tx, type_name)?
                    .ok_or_else(|| MessageError::UnsupportedContentType(type_name.to_string()))?;

                let (id, created_at): (i64, String) = tx.query_row(
                    "INSERT INTO message (sender_id, recipient_id, message_type_id)
                     VALUES (?1, ?2, ?3)
                     RETURNING id, created_at",
                    rusqlite::params![sender, recipient, type_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;

                self.insert_content(tx, id, content)?;

                Ok(CreatedMessage {
                    id,
                    created_at: parse_timestamp(&created_at)?,
                })
            },
        )?;

        debug!(
            "Message {} ({}) stored from {} to {}",
            created.id,
            content.type_name(),
            sender,
            recipient
        );
        Ok(created)
    }

    fn insert_content(&self, conn: &Connection, message_id: i64, content: &Content) -> Result<(), MessageError> {
        match content {
            Content::Text { text } => {
                conn.execute(
                    "INSERT INTO text_message (message_id, text) VALUES (?1, ?2)",
                    rusqlite::params![message_id, text],
                )?;
            }
            Content::Image { url, width, height } => {
                conn.execute(
                    "INSERT INTO image_message (message_id, url, width, height) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![message_id, url, width, height],
                )?;
            }
            Content::Video { url, source } => {
                let source_id = self
                    .registry
                    .video_source_id(conn, source)?
                    .ok_or_else(|| MessageError::UnknownVideoSource(source.clone()))?;
                conn.execute(
                    "INSERT INTO video_message (message_id, url, source) VALUES (?1, ?2, ?3)",
                    rusqlite::params![message_id, url, source_id],
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SqlRegistry;

    fn writer() -> (Arc<Database>, MessageWriter) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let writer = MessageWriter::new(db.clone(), Arc::new(SqlRegistry));
        (db, writer)
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
            .unwrap()
    }

    /// Registry that knows no message types at all.
    struct EmptyRegistry;

    impl Registry for EmptyRegistry {
        fn message_type_id(&self, _conn: &Connection, _name: &str) -> anyhow::Result<Option<i64>> {
            Ok(None)
        }

        fn video_source_id(&self, _conn: &Connection, _name: &str) -> anyhow::Result<Option<i64>> {
            Ok(None)
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let (db, writer) = writer();
        let first = writer
            .create_message(1, 2, &Content::Text { text: "one".into() })
            .unwrap();
        let second = writer
            .create_message(1, 2, &Content::Text { text: "two".into() })
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert!(second.created_at >= first.created_at);
        assert_eq!(count(&db, "text_message"), 2);
    }

    #[test]
    fn each_variant_writes_one_payload_row() {
        let (db, writer) = writer();
        writer
            .create_message(1, 2, &Content::Text { text: "hi".into() })
            .unwrap();
        writer
            .create_message(1, 2, &Content::Image { url: "u".into(), width: 64, height: 64 })
            .unwrap();
        let video = writer
            .create_message(1, 2, &Content::Video { url: "v".into(), source: "youtube".into() })
            .unwrap();

        assert_eq!(count(&db, "message"), 3);
        assert_eq!(count(&db, "text_message"), 1);
        assert_eq!(count(&db, "image_message"), 1);
        assert_eq!(count(&db, "video_message"), 1);

        let (type_id, source): (i64, i64) = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT m.message_type_id, v.source FROM message m
                     JOIN video_message v ON v.message_id = m.id WHERE m.id = ?1",
                    [video.id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?)
            })
            .unwrap();
        assert_eq!((type_id, source), (3, 1));
    }

    #[test]
    fn unregistered_type_writes_nothing() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let writer = MessageWriter::new(db.clone(), Arc::new(EmptyRegistry));

        let err = writer
            .create_message(1, 2, &Content::Text { text: "hi".into() })
            .unwrap_err();
        assert!(matches!(err, MessageError::UnsupportedContentType(ref t) if t == "text"));
        assert_eq!(count(&db, "message"), 0);
    }

    #[test]
    fn unknown_video_source_rolls_back_envelope() {
        let (db, writer) = writer();
        let err = writer
            .create_message(1, 2, &Content::Video { url: "v".into(), source: "vimeo".into() })
            .unwrap_err();
        assert!(matches!(err, MessageError::UnknownVideoSource(ref s) if s == "vimeo"));
        assert_eq!(count(&db, "message"), 0);
        assert_eq!(count(&db, "video_message"), 0);

        // The rollback leaves the connection usable.
        let created = writer
            .create_message(1, 2, &Content::Text { text: "after".into() })
            .unwrap();
        assert_eq!(count(&db, "message"), 1);
        assert!(created.id >= 1);
    }

    #[test]
    fn store_failure_is_transaction_failed() {
        let (db, writer) = writer();
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE image_message")?;
            Ok(())
        })
        .unwrap();

        let err = writer
            .create_message(1, 2, &Content::Image { url: "u".into(), width: 1, height: 1 })
            .unwrap_err();
        assert!(matches!(err, MessageError::TransactionFailed(_)));
        assert_eq!(count(&db, "message"), 0);
    }
}
