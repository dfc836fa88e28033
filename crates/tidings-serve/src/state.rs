//! Application state and configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use parking_lot::Mutex;
use tidings_store::{FeedTypes, Store};

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g. "0.0.0.0:5100").
    pub bind_addr: String,

    /// Path to the SQLite feed store.
    pub db_path: PathBuf,

    /// Directory pending staging batches are synced from.
    pub staging_dir: PathBuf,

    /// Path to the feed-types JSON file ({"all": [...], "has_scores": [...]}).
    pub feed_types_file: PathBuf,

    /// Valid API tokens (loaded from TIDINGS_API_TOKENS).
    pub api_tokens: HashSet<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `TIDINGS_API_TOKENS`: comma-separated list of valid bearer tokens
    ///
    /// Optional:
    /// - `TIDINGS_BIND_ADDR` (default "0.0.0.0:5100")
    /// - `TIDINGS_DB_PATH` (default "feeddata.sqlite")
    /// - `TIDINGS_STAGING_DIR` (default "staging")
    /// - `TIDINGS_FEEDTYPES_FILE` (default "feedtypes.json")
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("TIDINGS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5100".to_string());

        let db_path = std::env::var("TIDINGS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("feeddata.sqlite"));

        let staging_dir = std::env::var("TIDINGS_STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("staging"));

        let feed_types_file = std::env::var("TIDINGS_FEEDTYPES_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("feedtypes.json"));

        let tokens_str = std::env::var("TIDINGS_API_TOKENS")
            .map_err(|_| anyhow::anyhow!("TIDINGS_API_TOKENS environment variable is required"))?;

        let api_tokens: HashSet<String> = tokens_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if api_tokens.is_empty() {
            anyhow::bail!("TIDINGS_API_TOKENS must contain at least one token");
        }

        tracing::info!(
            bind_addr = %bind_addr,
            db = %db_path.display(),
            staging = %staging_dir.display(),
            token_count = api_tokens.len(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            db_path,
            staging_dir,
            feed_types_file,
            api_tokens,
        })
    }
}

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The feed store. One writer at a time (the sync endpoint); readers
    /// take the lock only for the duration of a query.
    pub store: Arc<Mutex<Store>>,

    /// The feed-type universe, loaded once at startup.
    pub feed_types: Arc<FeedTypes>,

    /// Cached `/data/types` response; the distinct-type set only changes on
    /// sync, so a short TTL is plenty.
    pub types_cache: Cache<String, Vec<String>>,

    /// Application configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Open the store and build the shared state.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::open(&config.db_path)?;
        tracing::info!("feed store contains {} rows", store.count()?);

        let feed_types = FeedTypes::load(&config.feed_types_file)?;

        let types_cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(60))
            .build();

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            feed_types: Arc::new(feed_types),
            types_cache,
            config: Arc::new(config),
        })
    }
}
