//! API route definitions.
//!
//! ## Public (no auth)
//! - `GET /health` - liveness probe
//! - `GET /data/types` - distinct feed types present in the store
//! - `GET /data/items` - filter/sort/paginate merged records
//!
//! ## Protected (bearer token)
//! - `GET /data/ids` - every id in the store, for cross-host incremental
//!   extraction
//! - `POST /data/sync` - merge pending staging batches, returns the count of
//!   newly merged records

mod health;
mod items;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::require_auth;
use crate::state::AppState;

/// Build the complete API router.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health_check))
        .route("/data/types", get(items::types))
        .route("/data/items", get(items::list_items));

    let protected = Router::new()
        .route("/data/ids", get(items::ids))
        .route("/data/sync", post(items::run_sync))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new().merge(public).merge(protected).with_state(state)
}
