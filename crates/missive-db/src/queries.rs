use crate::Database;
use crate::models::{SessionRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, OptionalExtension};

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the username is already taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO chat_user (username, password) VALUES (?1, ?2)",
                (username, password_hash),
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Sessions --

    pub fn create_session(&self, session: &SessionRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, token, created_at, last_seen_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    session.id,
                    session.user_id,
                    session.token,
                    session.created_at,
                    session.last_seen_at,
                    session.expires_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| query_session(conn, id))
    }

    pub fn touch_session(&self, id: &str, now: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE sessions SET last_seen_at = ?2 WHERE id = ?1",
                rusqlite::params![id, now],
            )?;
            Ok(())
        })
    }

    /// Delete sessions past their absolute expiry or idle for longer than
    /// `idle_secs`. Returns how many were removed.
    pub fn purge_expired_sessions(&self, now: i64, idle_secs: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1 OR last_seen_at <= ?1 - ?2",
                rusqlite::params![now, idle_secs],
            )?;
            Ok(removed)
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password FROM chat_user WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_session(conn: &Connection, id: &str) -> Result<Option<SessionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, token, created_at, last_seen_at, expires_at FROM sessions WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(SessionRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                token: row.get(2)?,
                created_at: row.get(3)?,
                last_seen_at: row.get(4)?,
                expires_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, user_id: i64, last_seen_at: i64, expires_at: i64) -> SessionRow {
        SessionRow {
            id: id.into(),
            user_id,
            token: format!("token-{id}"),
            created_at: 0,
            last_seen_at,
            expires_at,
        }
    }

    #[test]
    fn duplicate_username_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("alice", "hash").unwrap();
        assert_eq!(id, Some(1));
        assert_eq!(db.create_user("alice", "other").unwrap(), None);

        let user = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.password, "hash");
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn sessions_roundtrip_and_touch() {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.create_user("alice", "hash").unwrap().unwrap();

        db.create_session(&session("s1", user_id, 10, 1_000)).unwrap();
        db.touch_session("s1", 50).unwrap();

        let stored = db.get_session("s1").unwrap().unwrap();
        assert_eq!(stored.token, "token-s1");
        assert_eq!(stored.last_seen_at, 50);
        assert!(db.get_session("missing").unwrap().is_none());
    }

    #[test]
    fn purge_removes_expired_and_idle_sessions() {
        let db = Database::open_in_memory().unwrap();
        let user_id = db.create_user("alice", "hash").unwrap().unwrap();

        db.create_session(&session("live", user_id, 900, 5_000)).unwrap();
        db.create_session(&session("expired", user_id, 900, 950)).unwrap();
        db.create_session(&session("idle", user_id, 100, 5_000)).unwrap();

        let removed = db.purge_expired_sessions(1_000, 500).unwrap();
        assert_eq!(removed, 2);
        assert!(db.get_session("live").unwrap().is_some());
        assert!(db.get_session("expired").unwrap().is_none());
        assert!(db.get_session("idle").unwrap().is_none());
    }
}
