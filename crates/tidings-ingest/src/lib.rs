//! Extraction side of the tidings feed pipeline.
//!
//! This crate drives the polymorphic set of feed sources and turns their
//! output into staging batches:
//!
//! - [`source::FeedSource`] - the capability a source adapter implements:
//!   produce a lazy, finite, single-pass sequence of records
//! - [`Extractor`] - the orchestrator: source filtering, validation,
//!   duplicate detection, blur annotation, timeshift, transforms
//! - [`ExtractConfig`] - TOML configuration declaring sources, the timeshift
//!   window, and declarative transforms
//!
//! The `tidings` binary in this crate exposes the `index` and `update-db`
//! commands.

pub mod config;
mod error;
mod extract;
pub mod source;

pub use config::ExtractConfig;
pub use error::{Error, Result};
pub use extract::{ExtractStats, Extractor, SourceRun};
