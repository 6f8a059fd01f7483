use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rusqlite::{Connection, Row, TransactionBehavior};
use tracing::warn;

use missive_types::models::{Content, Message};

use crate::Database;
use crate::error::MessageError;
use crate::models::timestamp_or_default;

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

const PAGE_IDS_SQL: &str = "
SELECT id
    FROM message
    WHERE recipient_id = ?1 AND id >= ?2
    ORDER BY id
    LIMIT ?3";

const TEXT_MESSAGES_SQL: &str = "
SELECT message.id, message.sender_id, message.recipient_id, message.created_at,
       message_type.name,
       text_message.text
    FROM message
        JOIN message_type ON (message.message_type_id = message_type.id)
        JOIN text_message ON (message.id = text_message.message_id)
    WHERE message.recipient_id = ?1
        AND message.id BETWEEN ?2 AND ?3
    ORDER BY message.id
    LIMIT ?4";

const IMAGE_MESSAGES_SQL: &str = "
SELECT message.id, message.sender_id, message.recipient_id, message.created_at,
       message_type.name,
       image_message.url, image_message.width, image_message.height
    FROM message
        JOIN message_type ON (message.message_type_id = message_type.id)
        JOIN image_message ON (message.id = image_message.message_id)
    WHERE message.recipient_id = ?1
        AND message.id BETWEEN ?2 AND ?3
    ORDER BY message.id
    LIMIT ?4";

const VIDEO_MESSAGES_SQL: &str = "
SELECT message.id, message.sender_id, message.recipient_id, message.created_at,
       message_type.name,
       video_message.url,
       video_source.name
    FROM message
        JOIN message_type ON (message.message_type_id = message_type.id)
        JOIN video_message ON (message.id = video_message.message_id)
        JOIN video_source ON (video_message.source = video_source.id)
    WHERE message.recipient_id = ?1
        AND message.id BETWEEN ?2 AND ?3
    ORDER BY message.id
    LIMIT ?4";

/// Normalise a requested page size: non-positive selects the default,
/// anything above the maximum is clamped.
pub fn page_limit(requested: i64) -> i64 {
    if requested <= 0 {
        DEFAULT_PAGE_LIMIT
    } else {
        requested.min(MAX_PAGE_LIMIT)
    }
}

/// Reads recipient-scoped, cursor-paginated pages of messages.
#[derive(Clone)]
pub struct MessageReader {
    db: Arc<Database>,
}

/// The id window one page covers. Every per-shape query is confined to it.
struct Page {
    recipient: i64,
    first: i64,
    last: i64,
    limit: i64,
}

struct ShapeRow {
    id: i64,
    sender: i64,
    recipient: i64,
    created_at: String,
    type_name: String,
    content: Content,
}

impl MessageReader {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// List up to `limit` messages for `recipient` with id `>= cursor`, in
    /// ascending id order. Pass the last returned id + 1 as the next cursor.
    pub fn list_messages(
        &self,
        recipient: i64,
        cursor: i64,
        limit: i64,
    ) -> Result<Vec<Message>, MessageError> {
        let limit = page_limit(limit);

        // One read transaction so the id page and the per-shape fetches see
        // the same snapshot.
        self.db.with_transaction(
            TransactionBehavior::Deferred,
            |tx| -> Result<Vec<Message>, MessageError> {
                let ids = page_ids(tx, recipient, cursor, limit)?;
                let Some(&last) = ids.last() else {
                    return Ok(Vec::new());
                };

                let page = Page {
                    recipient,
                    first: cursor,
                    last,
                    limit,
                };
                let mut found = HashMap::with_capacity(ids.len());
                collect_shape(tx, TEXT_MESSAGES_SQL, &page, &mut found, text_content)?;
                collect_shape(tx, IMAGE_MESSAGES_SQL, &page, &mut found, image_content)?;
                collect_shape(tx, VIDEO_MESSAGES_SQL, &page, &mut found, video_content)?;

                Ok(merge(&ids, found))
            },
        )
    }
}

fn page_ids(conn: &Connection, recipient: i64, cursor: i64, limit: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(PAGE_IDS_SQL)?;
    let ids = stmt
        .query_map(rusqlite::params![recipient, cursor, limit], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn text_content(row: &Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content::Text { text: row.get(5)? })
}

fn image_content(row: &Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content::Image {
        url: row.get(5)?,
        width: row.get(6)?,
        height: row.get(7)?,
    })
}

fn video_content(row: &Row<'_>) -> rusqlite::Result<Content> {
    Ok(Content::Video {
        url: row.get(5)?,
        source: row.get(6)?,
    })
}

fn collect_shape(
    conn: &Connection,
    sql: &str,
    page: &Page,
    found: &mut HashMap<i64, Message>,
    content_from_row: fn(&Row<'_>) -> rusqlite::Result<Content>,
) -> Result<()> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(
        rusqlite::params![page.recipient, page.first, page.last, page.limit],
        |row| {
            Ok(ShapeRow {
                id: row.get(0)?,
                sender: row.get(1)?,
                recipient: row.get(2)?,
                created_at: row.get(3)?,
                type_name: row.get(4)?,
                content: content_from_row(row)?,
            })
        },
    )?;

    for row in rows {
        let row = row?;
        // Payload stored in a table that disagrees with the envelope's type.
        if row.type_name != row.content.type_name() {
            warn!(
                "Message {} is typed '{}' but has a {} payload; skipping",
                row.id,
                row.type_name,
                row.content.type_name()
            );
            continue;
        }

        found.insert(
            row.id,
            Message {
                id: row.id,
                sender: row.sender,
                recipient: row.recipient,
                timestamp: timestamp_or_default(&row.created_at, row.id),
                content: row.content,
            },
        );
    }

    Ok(())
}

/// Emit records in page order. Ids with no reconstructed record are
/// dropped.
fn merge(ids: &[i64], mut found: HashMap<i64, Message>) -> Vec<Message> {
    ids.iter()
        .filter_map(|id| {
            let message = found.remove(id);
            if message.is_none() {
                warn!("Message {} has no usable payload; skipping", id);
            }
            message
        })
        .collect()
}
