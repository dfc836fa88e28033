//! Feed source adapters.
//!
//! A source is anything that can produce feed records: an exported service
//! history, a scrobble log, a watch history dump. Sources are polymorphic
//! and ordered; the orchestrator drives them one at a time and consumes each
//! one's sequence exactly once.
//!
//! The service-specific adapters that call external personal-data APIs live
//! outside this crate; what ships here is the [`JsonlSource`] replay adapter,
//! which reads records previously exported to JSON Lines files.

mod jsonl;

pub use jsonl::JsonlSource;

use tidings_core::FeedItem;

use crate::error::Result;

/// A lazy, single-pass sequence of records from one source.
///
/// Yielding an `Err` aborts the whole extraction run: sources are not
/// isolated from each other.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<FeedItem>> + 'a>;

/// A producer of feed records.
pub trait FeedSource {
    /// Fully-qualified source name, e.g. `jsonl.trakt_history`. Used for
    /// include/exclude filtering and in logs.
    fn name(&self) -> String;

    /// Produce this source's record sequence. Called at most once per
    /// extraction run.
    fn produce(&mut self) -> Result<RecordIter<'_>>;
}

#[cfg(test)]
pub(crate) struct StaticSource {
    pub name: String,
    pub items: Vec<Result<FeedItem>>,
}

#[cfg(test)]
impl FeedSource for StaticSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn produce(&mut self) -> Result<RecordIter<'_>> {
        Ok(Box::new(self.items.drain(..)))
    }
}
