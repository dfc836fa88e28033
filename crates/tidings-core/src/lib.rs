//! Core types and record-level processing for the tidings feed pipeline.
//!
//! This crate provides:
//! - The canonical [`FeedItem`] record and its validation contract
//! - The blur matcher, a rule-based annotation predicate ([`BlurRules`])
//! - The timeshift engine for remapping pre-tracking dates ([`Timeshift`])
//! - The transform chain for user-configured record rewriting ([`TransformChain`])
//!
//! Everything here is pure record-in/record-out logic; reading sources,
//! staging batches, and the durable store live in the `tidings-ingest` and
//! `tidings-store` crates.

mod blur;
mod error;
mod item;
mod timeshift;
mod transform;

/// Flag appended to a record when a blur rule matches and the record carries
/// an image. Clients use it to blur the image when rendering.
pub const BLUR_FLAG: &str = "i_blur";

pub use blur::{BlurRule, BlurRules};
pub use error::{Error, Result};
pub use item::FeedItem;
pub use timeshift::Timeshift;
pub use transform::{Transform, TransformChain};
