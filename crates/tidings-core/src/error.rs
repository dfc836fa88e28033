//! Error types for record validation and rule parsing.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating or processing a feed record.
#[derive(Error, Debug)]
pub enum Error {
    /// Record failed its validation contract (`FeedItem::check`).
    #[error("validation error: {0}")]
    Validation(String),

    /// A blur rule line could not be parsed.
    #[error("invalid blur rule '{line}': {reason}")]
    BlurRule {
        /// The offending rule file line.
        line: String,
        /// Description of what's wrong.
        reason: String,
    },

    /// Glob pattern failed to compile.
    #[error("glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    /// Regex pattern failed to compile.
    #[error("regex pattern error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
