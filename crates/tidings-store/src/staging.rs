//! Staging batch files: the hand-off between extraction and sync.
//!
//! Each extraction run serializes its output into one immutable JSONL file
//! under the staging directory, named `batch-<epoch millis>.json` with the
//! timestamp zero-padded so lexicographic order is creation order. Batches
//! accumulate until a sync merges and prunes them; a written batch is never
//! modified.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tidings_core::FeedItem;

use crate::error::{Error, Result};

const BATCH_PREFIX: &str = "batch-";
const BATCH_SUFFIX: &str = ".json";

/// Writes one extraction run's records into a new staging batch.
pub struct BatchWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    count: usize,
}

impl BatchWriter {
    /// Create a new batch file in `dir`, creating the directory if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;

        // Bump the timestamp on collision so two runs in the same
        // millisecond still get distinct, ordered names.
        let mut millis = Utc::now().timestamp_millis();
        let path = loop {
            let candidate = dir.join(format!("{BATCH_PREFIX}{millis:013}{BATCH_SUFFIX}"));
            if !candidate.exists() {
                break candidate;
            }
            millis += 1;
        };

        tracing::debug!("Creating staging batch {}", path.display());
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            count: 0,
        })
    }

    /// Append one record as a JSON line.
    pub fn write(&mut self, item: &FeedItem) -> Result<()> {
        serde_json::to_writer(&mut self.writer, item)?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Flush and close the batch.
    ///
    /// Returns the batch path, or `None` if no records were written (the
    /// empty file is removed, so zero-record runs leave nothing behind and
    /// an empty file in the staging directory always means corruption).
    pub fn finish(mut self) -> Result<Option<PathBuf>> {
        self.writer.flush()?;
        drop(self.writer);
        if self.count == 0 {
            fs::remove_file(&self.path)?;
            return Ok(None);
        }
        tracing::info!(
            "Wrote {} records to staging batch {}",
            self.count,
            self.path.display()
        );
        Ok(Some(self.path))
    }
}

/// Pending staging batches in `dir`, oldest first. A missing directory means
/// nothing is staged.
pub fn pending_batches(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut batches: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.file_name().and_then(|n| n.to_str()).is_some_and(|name| {
                    name.starts_with(BATCH_PREFIX) && name.ends_with(BATCH_SUFFIX)
                })
        })
        .collect();
    // Names embed zero-padded creation time, so name order is age order.
    batches.sort();
    Ok(batches)
}

/// Parse a whole batch, strictly.
///
/// Any unparseable line, or a batch with no records at all, is corruption:
/// the writer never produces an empty batch.
pub(crate) fn read_batch(path: &Path) -> Result<Vec<FeedItem>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut items = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = FeedItem::from_json_line(&line).map_err(|e| Error::StagingCorrupt {
            path: path.to_path_buf(),
            reason: format!("line {}: {e}", line_num + 1),
        })?;
        items.push(item);
    }

    if items.is_empty() {
        return Err(Error::StagingCorrupt {
            path: path.to_path_buf(),
            reason: "batch contains no records".to_string(),
        });
    }
    Ok(items)
}

/// Delete processed batches after a successful sync, optionally retaining
/// the newest one to smooth over a crash during the next extraction run.
/// `batches` must be in oldest-first order.
pub(crate) fn prune_batches(batches: &[PathBuf], keep_newest: bool) -> Result<usize> {
    let prune = if keep_newest && !batches.is_empty() {
        &batches[..batches.len() - 1]
    } else {
        batches
    };
    for path in prune {
        tracing::info!("Pruning staging batch {}", path.display());
        fs::remove_file(path)?;
    }
    Ok(prune.len())
}

/// Best-effort deletion of every pending batch after a corrupt sync. Removal
/// failures are logged and skipped so one stubborn file cannot keep corrupt
/// data around.
pub(crate) fn wipe_batches(batches: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in batches {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::warn!("Removed suspect staging batch {}", path.display());
                removed += 1;
            }
            Err(e) => {
                tracing::error!("Failed to remove staging batch {}: {e}", path.display());
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use tempfile::TempDir;

    fn item(id: &str) -> FeedItem {
        let when = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2021, 3, 4, 12, 0, 0)
            .unwrap();
        FeedItem::new(id, "title", "movie", when)
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut writer = BatchWriter::create(tmp.path()).unwrap();
        writer.write(&item("a_1")).unwrap();
        writer.write(&item("a_2")).unwrap();
        let path = writer.finish().unwrap().unwrap();

        let items = read_batch(&path).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], item("a_1"));
        assert_eq!(items[1], item("a_2"));
    }

    #[test]
    fn test_empty_run_writes_no_file() {
        let tmp = TempDir::new().unwrap();
        let writer = BatchWriter::create(tmp.path()).unwrap();
        assert_eq!(writer.finish().unwrap(), None);
        assert!(pending_batches(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_pending_batches_sorted_oldest_first() {
        let tmp = TempDir::new().unwrap();
        for _ in 0..3 {
            let mut writer = BatchWriter::create(tmp.path()).unwrap();
            writer.write(&item("a_1")).unwrap();
            writer.finish().unwrap();
        }
        let batches = pending_batches(tmp.path()).unwrap();
        assert_eq!(batches.len(), 3);
        let mut sorted = batches.clone();
        sorted.sort();
        assert_eq!(batches, sorted);
    }

    #[test]
    fn test_missing_directory_means_nothing_staged() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("never-created");
        assert!(pending_batches(&gone).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("batch-0000000000001.json");
        fs::write(&path, "{not json\n").unwrap();
        let err = read_batch(&path).unwrap_err();
        assert!(matches!(err, Error::StagingCorrupt { .. }));
    }

    #[test]
    fn test_empty_file_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("batch-0000000000001.json");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            read_batch(&path).unwrap_err(),
            Error::StagingCorrupt { .. }
        ));
    }

    #[test]
    fn test_prune_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        for _ in 0..3 {
            let mut writer = BatchWriter::create(tmp.path()).unwrap();
            writer.write(&item("a_1")).unwrap();
            writer.finish().unwrap();
        }
        let batches = pending_batches(tmp.path()).unwrap();
        let pruned = prune_batches(&batches, true).unwrap();
        assert_eq!(pruned, 2);
        let left = pending_batches(tmp.path()).unwrap();
        assert_eq!(left, vec![batches[2].clone()]);

        assert_eq!(prune_batches(&left, false).unwrap(), 1);
        assert!(pending_batches(tmp.path()).unwrap().is_empty());
    }
}
