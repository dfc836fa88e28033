//! Feed record endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use tidings_store::{
    sync, ListParams, OrderBy, SortDir, StoredItem, SyncOptions, SyncReport, DEFAULT_LIMIT,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for `GET /data/items`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemsQuery {
    /// Rows to skip. Default: 0.
    pub offset: Option<u64>,
    /// Page size, 1..=500. Out-of-range values are rejected. Default: 100.
    pub limit: Option<u64>,
    /// Sort key: "when" (default), "score", "release_date".
    pub order_by: Option<String>,
    /// Sort direction: "asc" or "desc" (default).
    pub sort: Option<String>,
    /// Comma-separated feed-type allow-list.
    pub ftype: Option<String>,
    /// Free-text query against title, creator, subtitle, and id.
    pub query: Option<String>,
    /// Per-field filters, used only when `query` is absent.
    pub title: Option<String>,
    pub creator: Option<String>,
    pub subtitle: Option<String>,
}

fn parse_params(raw: &ItemsQuery) -> Result<ListParams, ApiError> {
    let order_by = match raw.order_by.as_deref() {
        None => OrderBy::default(),
        Some(value) => OrderBy::parse(value).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "invalid order_by '{value}'. Valid options: when, score, release_date"
            ))
        })?,
    };

    let sort = match raw.sort.as_deref() {
        None => SortDir::default(),
        Some(value) => SortDir::parse(value).ok_or_else(|| {
            ApiError::BadRequest(format!("invalid sort '{value}'. Valid options: asc, desc"))
        })?,
    };

    let ftypes = raw
        .ftype
        .as_deref()
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(ListParams {
        offset: raw.offset.unwrap_or(0),
        limit: raw.limit.unwrap_or(DEFAULT_LIMIT),
        order_by,
        sort,
        ftypes,
        query: raw.query.clone(),
        title: raw.title.clone(),
        creator: raw.creator.clone(),
        subtitle: raw.subtitle.clone(),
    })
}

/// `GET /data/items`
///
/// Returns a page of merged records. Validation failures (bad enum values,
/// out-of-range limits, unknown feed types) are 400s.
pub async fn list_items(
    State(state): State<AppState>,
    Query(raw): Query<ItemsQuery>,
) -> Result<Json<Vec<StoredItem>>, ApiError> {
    let params = parse_params(&raw)?;
    let store = state.store.lock();
    let items = tidings_store::list(&store, &state.feed_types, &params)?;
    Ok(Json(items))
}

/// `GET /data/types`
///
/// Distinct feed types present in the store. Cached briefly; the set only
/// changes when a sync merges a new type.
pub async fn types(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    const KEY: &str = "types";
    if let Some(cached) = state.types_cache.get(KEY).await {
        return Ok(Json(cached));
    }

    let types = {
        let store = state.store.lock();
        store.types()?
    };
    state.types_cache.insert(KEY.to_string(), types.clone()).await;
    Ok(Json(types))
}

/// `GET /data/ids` (auth required)
///
/// Every id in the store, sorted. Extraction runs on other hosts feed this
/// to `tidings index --exclude-ids-file` to skip already-synced records.
pub async fn ids(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let mut ids: Vec<String> = {
        let store = state.store.lock();
        store.ids()?.into_iter().collect()
    };
    ids.sort();
    Ok(Json(ids))
}

/// `POST /data/sync` (auth required)
///
/// Runs the incremental sync engine against pending staging batches. The
/// store mutex serializes this against readers and other sync calls.
pub async fn run_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let options = SyncOptions::new(state.config.staging_dir.clone());
    let report = {
        let mut store = state.store.lock();
        sync(&mut store, &options)?
    };
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = parse_params(&ItemsQuery::default()).unwrap();
        assert_eq!(params.offset, 0);
        assert_eq!(params.limit, DEFAULT_LIMIT);
        assert_eq!(params.order_by, OrderBy::When);
        assert_eq!(params.sort, SortDir::Desc);
        assert!(params.ftypes.is_empty());
    }

    #[test]
    fn test_invalid_enums_rejected() {
        let raw = ItemsQuery {
            order_by: Some("rating".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            parse_params(&raw).unwrap_err(),
            ApiError::BadRequest(_)
        ));

        let raw = ItemsQuery {
            sort: Some("sideways".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            parse_params(&raw).unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn test_ftype_list_split_and_trimmed() {
        let raw = ItemsQuery {
            ftype: Some("movie, episode,,listen".to_string()),
            ..Default::default()
        };
        let params = parse_params(&raw).unwrap();
        assert_eq!(params.ftypes, vec!["movie", "episode", "listen"]);
    }
}
