//! Durable storage for the tidings feed pipeline.
//!
//! This crate owns everything between an extraction run's output and a read
//! client's query:
//!
//! - [`BatchWriter`] and the staging-batch file layout (immutable JSONL
//!   files, one per extraction run, ordered by creation time)
//! - [`Store`], the append-only SQLite store of merged records
//! - [`sync`], the incremental merge engine with all-or-nothing corruption
//!   recovery
//! - [`list`] / [`ListParams`], the filter/sort/paginate query engine
//!
//! # Writer discipline
//!
//! The store assumes a single writer: one sync invocation at a time. Readers
//! are safe concurrently because merged rows are never updated or deleted;
//! a reader sees at worst a stale prefix of the store.

mod db;
mod error;
mod query;
mod staging;
mod sync;

pub use db::{Store, StoredItem};
pub use error::{Error, Result};
pub use query::{list, FeedTypes, ListParams, OrderBy, SortDir, DEFAULT_LIMIT, MAX_LIMIT};
pub use staging::{pending_batches, BatchWriter};
pub use sync::{sync, SyncOptions, SyncReport};
