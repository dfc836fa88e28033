//! Error types for extraction.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting and staging records.
#[derive(Error, Debug)]
pub enum Error {
    /// Record-level failure (validation, blur rules, timeshift geometry).
    #[error(transparent)]
    Core(#[from] tidings_core::Error),

    /// Staging or store failure.
    #[error(transparent)]
    Store(#[from] tidings_store::Error),

    /// A source raised mid-iteration. Aborts the entire extraction run;
    /// there is no per-source isolation.
    #[error("source '{name}' failed: {message}")]
    Source {
        /// The source's fully-qualified name.
        name: String,
        /// What went wrong.
        message: String,
    },

    /// Extraction configuration problem.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON error (exclude-ids file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
