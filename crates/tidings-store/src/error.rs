//! Error types for staging, storage, and querying.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the staging/store/query layer.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A staging batch failed to parse or violated shape expectations.
    /// Triggers deletion of every pending batch (see [`crate::sync`]).
    #[error("staging batch {} is corrupt: {reason}", path.display())]
    StagingCorrupt {
        /// The offending batch file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A query parameter failed validation.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Configuration problem (e.g. a malformed feed-types file).
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
