use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE chat_user (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                id            TEXT PRIMARY KEY,
                user_id       INTEGER NOT NULL REFERENCES chat_user(id),
                token         TEXT NOT NULL,
                created_at    INTEGER NOT NULL,
                last_seen_at  INTEGER NOT NULL,
                expires_at    INTEGER NOT NULL
            );

            CREATE INDEX idx_sessions_expires ON sessions(expires_at);

            CREATE TABLE message_type (
                id    INTEGER PRIMARY KEY,
                name  TEXT NOT NULL UNIQUE
            );

            CREATE TABLE video_source (
                id    INTEGER PRIMARY KEY,
                name  TEXT NOT NULL UNIQUE
            );

            CREATE TABLE message (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id        INTEGER NOT NULL,
                recipient_id     INTEGER NOT NULL,
                message_type_id  INTEGER NOT NULL REFERENCES message_type(id),
                created_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_message_recipient ON message(recipient_id, id);

            CREATE TABLE text_message (
                message_id  INTEGER PRIMARY KEY REFERENCES message(id),
                text        TEXT NOT NULL
            );

            CREATE TABLE image_message (
                message_id  INTEGER PRIMARY KEY REFERENCES message(id),
                url         TEXT NOT NULL,
                width       INTEGER NOT NULL,
                height      INTEGER NOT NULL
            );

            CREATE TABLE video_message (
                message_id  INTEGER PRIMARY KEY REFERENCES message(id),
                url         TEXT NOT NULL,
                source      INTEGER NOT NULL REFERENCES video_source(id)
            );

            INSERT INTO message_type (id, name) VALUES (1, 'text'), (2, 'image'), (3, 'video');
            INSERT INTO video_source (id, name) VALUES (1, 'youtube');

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
