//! The incremental sync engine: merge staged batches into the durable store.
//!
//! One invocation walks a fixed state machine:
//!
//! 1. **Load** the set of ids already in the store.
//! 2. **Enumerate** pending staging batches, oldest first.
//! 3. **Parse** every batch fully; any malformed or empty batch fails the
//!    whole invocation before a single row is written.
//! 4. **Merge** records in parse order inside one transaction, inserting iff
//!    the id is unseen (already stored, or inserted earlier in this same
//!    invocation); duplicates are silently skipped.
//! 5. **Commit** — insertions become visible to readers atomically.
//! 6. **Prune** the processed batches, retaining the newest unless told to
//!    delete all.
//!
//! On a parse or merge failure the transaction rolls back and EVERY pending
//! batch is deleted: corrupt staging data is never partially applied or
//! retried, at the cost of the next extraction run regenerating it.

use std::path::PathBuf;

use serde::Serialize;

use crate::db::{insert_item, Store};
use crate::error::Result;
use crate::staging;

/// Options for one sync invocation.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Directory holding pending staging batches.
    pub staging_dir: PathBuf,
    /// Delete every processed batch instead of retaining the newest.
    pub delete_all_batches: bool,
}

impl SyncOptions {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            delete_all_batches: false,
        }
    }
}

/// Outcome of a successful sync invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Records newly inserted into the store.
    pub merged: usize,
    /// Records skipped because their id was already present.
    pub skipped: usize,
    /// Staging batches processed.
    pub batches: usize,
}

/// Run one sync invocation against the store.
///
/// Errors from the parse or merge phases have already wiped the staging
/// directory by the time they are returned; the caller's only recovery is a
/// fresh extraction run.
pub fn sync(store: &mut Store, opts: &SyncOptions) -> Result<SyncReport> {
    let known = store.ids()?;
    tracing::info!("{} records already in the store", known.len());

    let batches = staging::pending_batches(&opts.staging_dir)?;
    if batches.is_empty() {
        tracing::info!("No pending staging batches");
        return Ok(SyncReport::default());
    }
    tracing::info!("{} pending staging batches", batches.len());

    match merge(store, &batches, known) {
        Ok(report) => {
            staging::prune_batches(&batches, !opts.delete_all_batches)?;
            tracing::info!(
                merged = report.merged,
                skipped = report.skipped,
                batches = report.batches,
                "sync complete"
            );
            Ok(report)
        }
        Err(err) => {
            // Conservative recovery: treat every pending batch as suspect
            // rather than guessing which ones were applied cleanly.
            tracing::error!("Sync failed, removing all pending staging batches: {err}");
            staging::wipe_batches(&batches);
            Err(err)
        }
    }
}

fn merge(
    store: &mut Store,
    batches: &[PathBuf],
    mut known: std::collections::HashSet<String>,
) -> Result<SyncReport> {
    // Parse phase: everything deserializes before anything is written.
    let mut parsed = Vec::with_capacity(batches.len());
    for path in batches {
        tracing::info!("Loading staging batch {}", path.display());
        parsed.push(staging::read_batch(path)?);
    }

    let tx = store.conn.transaction()?;
    let mut merged = 0;
    let mut skipped = 0;
    for items in &parsed {
        for item in items {
            if known.contains(&item.id) {
                skipped += 1;
                continue;
            }
            insert_item(&tx, item)?;
            known.insert(item.id.clone());
            merged += 1;
        }
    }
    tx.commit()?;

    Ok(SyncReport {
        merged,
        skipped,
        batches: batches.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staging::{pending_batches, BatchWriter};
    use chrono::{FixedOffset, TimeZone};
    use std::fs;
    use tempfile::TempDir;
    use tidings_core::FeedItem;

    fn item(id: &str) -> FeedItem {
        let when = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 3, 4, 12, 0, 0)
            .unwrap();
        FeedItem::new(id, "title", "movie", when)
    }

    fn stage(dir: &std::path::Path, ids: &[&str]) {
        let mut writer = BatchWriter::create(dir).unwrap();
        for id in ids {
            writer.write(&item(id)).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_merge_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        let opts = SyncOptions {
            staging_dir: tmp.path().to_path_buf(),
            delete_all_batches: false,
        };

        stage(tmp.path(), &["a_1", "a_2"]);
        let first = sync(&mut store, &opts).unwrap();
        assert_eq!(first.merged, 2);
        assert_eq!(first.skipped, 0);

        // The retained newest batch is still pending; syncing again inserts
        // nothing and the store size is unchanged.
        let second = sync(&mut store, &opts).unwrap();
        assert_eq!(second.merged, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_cross_batch_dedup_within_one_invocation() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        stage(tmp.path(), &["a_1", "a_2"]);
        stage(tmp.path(), &["a_2", "a_3"]);

        let report = sync(&mut store, &SyncOptions::new(tmp.path())).unwrap();
        assert_eq!(report.merged, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.batches, 2);
    }

    #[test]
    fn test_prune_retains_newest_batch_only() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        stage(tmp.path(), &["a_1"]);
        stage(tmp.path(), &["a_2"]);
        stage(tmp.path(), &["a_3"]);

        sync(&mut store, &SyncOptions::new(tmp.path())).unwrap();
        assert_eq!(pending_batches(tmp.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_all_batches_flag() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        stage(tmp.path(), &["a_1"]);

        let opts = SyncOptions {
            staging_dir: tmp.path().to_path_buf(),
            delete_all_batches: true,
        };
        sync(&mut store, &opts).unwrap();
        assert!(pending_batches(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_batch_wipes_everything_and_merges_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        stage(tmp.path(), &["a_1", "a_2"]);
        // A later batch with garbage in it poisons the whole invocation.
        fs::write(tmp.path().join("batch-9999999999999.json"), "{oops\n").unwrap();

        let err = sync(&mut store, &SyncOptions::new(tmp.path())).unwrap_err();
        assert!(matches!(err, crate::Error::StagingCorrupt { .. }));
        // Nothing merged, nothing left pending.
        assert_eq!(store.count().unwrap(), 0);
        assert!(pending_batches(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_empty_staging_dir_is_a_noop() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::open_in_memory().unwrap();
        let report = sync(&mut store, &SyncOptions::new(tmp.path())).unwrap();
        assert_eq!(report.merged, 0);
        assert_eq!(report.batches, 0);
    }
}
