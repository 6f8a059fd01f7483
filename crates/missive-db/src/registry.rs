//! Name-to-id lookups for the message type and video source reference
//! tables.
//!
//! Lookups take the connection (usually an open transaction) of the
//! operation they serve, so a write resolves its reference data inside its
//! own transaction. A name that is not registered resolves to `Ok(None)`;
//! callers decide what a miss means.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

pub trait Registry: Send + Sync {
    fn message_type_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>>;

    fn video_source_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>>;
}

/// Queries the reference tables on every lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlRegistry;

impl Registry for SqlRegistry {
    fn message_type_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        lookup(conn, "SELECT id FROM message_type WHERE name = ?1", name)
    }

    fn video_source_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        lookup(conn, "SELECT id FROM video_source WHERE name = ?1", name)
    }
}

fn lookup(conn: &Connection, sql: &str, name: &str) -> Result<Option<i64>> {
    let id = conn
        .prepare_cached(sql)?
        .query_row([name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

/// Process-wide cache of resolved names in front of another registry.
///
/// Only hits are cached: an unknown name is looked up again every time, so
/// newly added reference rows become visible without invalidation. Removing
/// or renumbering rows requires [`CachedRegistry::invalidate`].
pub struct CachedRegistry<R> {
    inner: R,
    message_types: RwLock<HashMap<String, i64>>,
    video_sources: RwLock<HashMap<String, i64>>,
}

impl<R: Registry> CachedRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            message_types: RwLock::new(HashMap::new()),
            video_sources: RwLock::new(HashMap::new()),
        }
    }

    pub fn invalidate(&self) {
        for cache in [&self.message_types, &self.video_sources] {
            match cache.write() {
                Ok(mut map) => map.clear(),
                // A poisoned map may be half-written; drop it entirely.
                Err(poisoned) => poisoned.into_inner().clear(),
            }
        }
        debug!("Registry cache invalidated");
    }
}

impl<R: Registry> Registry for CachedRegistry<R> {
    fn message_type_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        cached(&self.message_types, name, || self.inner.message_type_id(conn, name))
    }

    fn video_source_id(&self, conn: &Connection, name: &str) -> Result<Option<i64>> {
        cached(&self.video_sources, name, || self.inner.video_source_id(conn, name))
    }
}

fn cached<F>(cache: &RwLock<HashMap<String, i64>>, name: &str, load: F) -> Result<Option<i64>>
where
    F: FnOnce() -> Result<Option<i64>>,
{
    let hit = cache
        .read()
        .map_err(|e| anyhow!("Registry cache poisoned: {}", e))?
        .get(name)
        .copied();
    if hit.is_some() {
        return Ok(hit);
    }

    let id = load()?;
    if let Some(id) = id {
        cache
            .write()
            .map_err(|e| anyhow!("Registry cache poisoned: {}", e))?
            .insert(name.to_string(), id);
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn resolves_seeded_names() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            assert_eq!(SqlRegistry.message_type_id(conn, "text")?, Some(1));
            assert_eq!(SqlRegistry.message_type_id(conn, "image")?, Some(2));
            assert_eq!(SqlRegistry.message_type_id(conn, "video")?, Some(3));
            assert_eq!(SqlRegistry.video_source_id(conn, "youtube")?, Some(1));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn miss_is_not_an_error() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            assert_eq!(SqlRegistry.message_type_id(conn, "sticker")?, None);
            assert_eq!(SqlRegistry.video_source_id(conn, "vimeo")?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn cache_serves_hits_until_invalidated() {
        let db = Database::open_in_memory().unwrap();
        let registry = CachedRegistry::new(SqlRegistry);

        db.with_conn(|conn| {
            assert_eq!(registry.video_source_id(conn, "youtube")?, Some(1));
            conn.execute("DELETE FROM video_source WHERE name = 'youtube'", [])?;
            assert_eq!(registry.video_source_id(conn, "youtube")?, Some(1));
            Ok(())
        })
        .unwrap();

        registry.invalidate();

        db.with_conn(|conn| {
            assert_eq!(registry.video_source_id(conn, "youtube")?, None);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn cache_misses_fall_through() {
        let db = Database::open_in_memory().unwrap();
        let registry = CachedRegistry::new(SqlRegistry);

        db.with_conn(|conn| {
            assert_eq!(registry.video_source_id(conn, "vimeo")?, None);
            conn.execute("INSERT INTO video_source (id, name) VALUES (2, 'vimeo')", [])?;
            assert_eq!(registry.video_source_id(conn, "vimeo")?, Some(2));
            Ok(())
        })
        .unwrap();
    }
}
