//! HTTP read API for the tidings feed store.
//!
//! Serves the merged store back to clients: filterable, sortable,
//! paginated record listings plus the id dump used for cross-host
//! incremental extraction. The store is append-only outside of sync windows,
//! so any number of readers may run concurrently; the one mutating endpoint
//! (`POST /data/sync`) serializes against readers through the store mutex.
//!
//! # Authentication
//!
//! `/data/ids` and `/data/sync` require a Bearer token from the set
//! configured in `TIDINGS_API_TOKENS`. The listing endpoints are public.

mod auth;
mod error;
mod routes;
mod state;

pub use self::auth::require_auth;
pub use self::error::ApiError;
pub use self::routes::router;
pub use self::state::{AppState, Config};
