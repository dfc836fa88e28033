//! The append-only SQLite store of merged feed records.
//!
//! One flat table, indexed by record id. Rows are inserted by the sync
//! engine and never updated or deleted afterwards (`update-db --delete-db`
//! drops the whole table's contents, which is the only mutation the store
//! supports). `when` is stored as epoch seconds; `release_date` as ISO date
//! text; `tags`/`flags`/`data` as JSON text, NULL when empty.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tidings_core::FeedItem;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS feed_items (
    id TEXT PRIMARY KEY,
    ftype TEXT NOT NULL,
    title TEXT NOT NULL,
    score REAL,
    subtitle TEXT,
    creator TEXT,
    part INTEGER,
    subpart INTEGER,
    collection TEXT,
    "when" INTEGER NOT NULL,
    release_date TEXT,
    image_url TEXT,
    url TEXT,
    tags TEXT,
    flags TEXT,
    data TEXT
);
CREATE INDEX IF NOT EXISTS ix_feed_items_when ON feed_items ("when");
CREATE INDEX IF NOT EXISTS ix_feed_items_ftype ON feed_items (ftype);
"#;

/// Columns selected for read queries, in [`StoredItem::from_row`] order.
pub(crate) const COLUMNS: &str = "id, ftype, title, score, subtitle, creator, part, subpart, \
     collection, \"when\", release_date, image_url, url, tags, flags, data";

/// Handle to the durable store.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening feed store at {}", path.display());
        let conn = Connection::open(path)?;
        // WAL keeps concurrent readers unblocked during a sync commit.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All record ids currently in the store.
    pub fn ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM feed_items")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    /// Distinct `ftype` values present in the store, sorted.
    pub fn types(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT ftype FROM feed_items ORDER BY ftype")?;
        let types = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(types)
    }

    /// Number of merged records.
    pub fn count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM feed_items", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Remove every row. Only used by `update-db --delete-db` before a full
    /// re-sync.
    pub fn clear(&mut self) -> Result<usize> {
        tracing::warn!("Clearing the feed store");
        Ok(self.conn.execute("DELETE FROM feed_items", [])?)
    }
}

/// Insert one record. Callers are responsible for id dedup; a duplicate id
/// surfaces as a constraint violation.
pub(crate) fn insert_item(conn: &Connection, item: &FeedItem) -> Result<()> {
    conn.execute(
        "INSERT INTO feed_items (id, ftype, title, score, subtitle, creator, part, subpart, \
         collection, \"when\", release_date, image_url, url, tags, flags, data) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        rusqlite::params![
            item.id,
            item.ftype,
            item.title,
            item.score,
            item.subtitle,
            item.creator,
            item.part,
            item.subpart,
            item.collection,
            item.when.timestamp(),
            item.release_date.map(|d| d.to_string()),
            item.image_url,
            item.url,
            json_column(&item.tags)?,
            json_column(&item.flags)?,
            data_column(&item.data)?,
        ],
    )?;
    Ok(())
}

fn json_column(values: &[String]) -> Result<Option<String>> {
    if values.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(values)?))
    }
}

fn data_column(data: &Map<String, Value>) -> Result<Option<String>> {
    if data.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(data)?))
    }
}

/// A merged record as read back from the store: the API response shape.
///
/// `when` is epoch seconds and `release_date` an ISO date string, exactly as
/// stored; the opaque `data` map and the `tags`/`flags` lists are
/// materialized from their JSON columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub id: String,
    pub ftype: String,
    pub title: String,
    pub score: Option<f64>,
    pub subtitle: Option<String>,
    pub creator: Option<String>,
    pub part: Option<i64>,
    pub subpart: Option<i64>,
    pub collection: Option<String>,
    pub when: i64,
    pub release_date: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl StoredItem {
    /// Build from a row selected with [`COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self> {
        let tags: Option<String> = row.get(13)?;
        let flags: Option<String> = row.get(14)?;
        let data: Option<String> = row.get(15)?;
        Ok(Self {
            id: row.get(0)?,
            ftype: row.get(1)?,
            title: row.get(2)?,
            score: row.get(3)?,
            subtitle: row.get(4)?,
            creator: row.get(5)?,
            part: row.get(6)?,
            subpart: row.get(7)?,
            collection: row.get(8)?,
            when: row.get(9)?,
            release_date: row.get(10)?,
            image_url: row.get(11)?,
            url: row.get(12)?,
            tags: tags.map(|t| serde_json::from_str(&t)).transpose()?.unwrap_or_default(),
            flags: flags.map(|f| serde_json::from_str(&f)).transpose()?.unwrap_or_default(),
            data: data.map(|d| serde_json::from_str(&d)).transpose()?.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn item(id: &str, ftype: &str) -> FeedItem {
        let when = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 3, 4, 12, 0, 0)
            .unwrap();
        FeedItem::new(id, "title", ftype, when)
    }

    #[test]
    fn test_open_and_insert() {
        let store = Store::open_in_memory().unwrap();
        insert_item(&store.conn, &item("a_1", "movie")).unwrap();
        insert_item(&store.conn, &item("a_2", "listen")).unwrap();
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.ids().unwrap().contains("a_1"));
        assert_eq!(store.types().unwrap(), vec!["listen", "movie"]);
    }

    #[test]
    fn test_duplicate_id_is_a_constraint_violation() {
        let store = Store::open_in_memory().unwrap();
        insert_item(&store.conn, &item("a_1", "movie")).unwrap();
        assert!(insert_item(&store.conn, &item("a_1", "movie")).is_err());
    }

    #[test]
    fn test_empty_collections_stored_as_null() {
        let store = Store::open_in_memory().unwrap();
        insert_item(&store.conn, &item("a_1", "movie")).unwrap();
        let (tags, flags, data): (Option<String>, Option<String>, Option<String>) = store
            .conn
            .query_row("SELECT tags, flags, data FROM feed_items", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!((tags, flags, data), (None, None, None));
    }

    #[test]
    fn test_clear() {
        let mut store = Store::open_in_memory().unwrap();
        insert_item(&store.conn, &item("a_1", "movie")).unwrap();
        assert_eq!(store.clear().unwrap(), 1);
        assert_eq!(store.count().unwrap(), 0);
    }
}
