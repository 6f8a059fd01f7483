//! Database row types. These map directly to SQLite rows.
//! Distinct from missive-types API models to keep the DB layer independent.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
}

/// Session timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub id: String,
    pub user_id: i64,
    pub token: String,
    pub created_at: i64,
    pub last_seen_at: i64,
    pub expires_at: i64,
}

impl SessionRow {
    /// A session is live until its absolute expiry and while it has been
    /// used within the idle window.
    pub fn is_live(&self, now: i64, idle_secs: i64) -> bool {
        now < self.expires_at && now - self.last_seen_at < idle_secs
    }
}

/// Parse a stored timestamp. SQLite's `datetime('now')` yields
/// "YYYY-MM-DD HH:MM:SS" without a timezone; those are UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .map_err(|e| anyhow!("Invalid timestamp '{}': {}", raw, e))
}

/// Like [`parse_timestamp`], but a corrupt value is logged and replaced by
/// the epoch instead of failing the whole read.
pub fn timestamp_or_default(raw: &str, message_id: i64) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt created_at on message {}: {}", message_id, e);
        DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_and_rfc3339_timestamps() {
        let a = parse_timestamp("2024-05-01 12:30:00").unwrap();
        let b = parse_timestamp("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("yesterday").is_err());
        assert_eq!(timestamp_or_default("yesterday", 1), DateTime::<Utc>::default());
    }

    #[test]
    fn session_liveness() {
        let session = SessionRow {
            id: "s".into(),
            user_id: 1,
            token: "t".into(),
            created_at: 0,
            last_seen_at: 100,
            expires_at: 1_000,
        };
        assert!(session.is_live(150, 60));
        assert!(!session.is_live(160, 60));
        assert!(!session.is_live(1_000, 10_000));
    }
}
