//! The read-side query engine: filter, sort, paginate.
//!
//! Queries are built as a WHERE-clause list with bound parameters; ORDER BY
//! fragments only ever come from the static allowlist below, never from user
//! input. Validation rejects out-of-range pagination and unknown feed types
//! instead of silently clamping.

use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::db::{Store, StoredItem, COLUMNS};
use crate::error::{Error, Result};

/// Default page size when the client does not ask for one.
pub const DEFAULT_LIMIT: u64 = 100;
/// Largest permitted page size. Larger requests are rejected, not clamped.
pub const MAX_LIMIT: u64 = 500;

/// Sort key for a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    When,
    Score,
    ReleaseDate,
}

impl OrderBy {
    /// Parse the wire value (`when`, `score`, `release_date`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "when" => Some(Self::When),
            "score" => Some(Self::Score),
            "release_date" => Some(Self::ReleaseDate),
            _ => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    /// Parse the wire value (`asc`, `desc`).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// The feed-type universe: every known `ftype`, and the subset whose records
/// carry meaningful scores. Everything outside `has_scores` is excluded from
/// score-ranked views so high-churn episodic types cannot flood them.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedTypes {
    pub all: Vec<String>,
    #[serde(default)]
    pub has_scores: Vec<String>,
}

impl FeedTypes {
    /// Load from a JSON file: `{"all": [...], "has_scores": [...]}`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let types: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        if types.all.is_empty() {
            return Err(Error::Config(format!(
                "{}: feed types file has no 'all' entries",
                path.display()
            )));
        }
        if types.has_scores.is_empty() {
            tracing::warn!(
                "{}: no 'has_scores' entries, sorting by score will match nothing",
                path.display()
            );
        }
        Ok(types)
    }

    pub fn is_known(&self, ftype: &str) -> bool {
        self.all.iter().any(|t| t == ftype)
    }

    /// Feed types excluded from score-ranked views.
    pub fn without_scores(&self) -> Vec<String> {
        self.all
            .iter()
            .filter(|t| !self.has_scores.contains(*t))
            .cloned()
            .collect()
    }
}

/// Validated-on-use parameters for a list query.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub offset: u64,
    pub limit: u64,
    pub order_by: OrderBy,
    pub sort: SortDir,
    /// Allow-list of feed types; empty means all.
    pub ftypes: Vec<String>,
    /// Free-text query matched against title, creator, subtitle, and id.
    pub query: Option<String>,
    /// Per-field filters, only consulted when `query` is absent.
    pub title: Option<String>,
    pub creator: Option<String>,
    pub subtitle: Option<String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
            order_by: OrderBy::default(),
            sort: SortDir::default(),
            ftypes: Vec::new(),
            query: None,
            title: None,
            creator: None,
            subtitle: None,
        }
    }
}

impl ListParams {
    fn validate(&self, types: &FeedTypes) -> Result<()> {
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidQuery(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        for ftype in &self.ftypes {
            if !types.is_known(ftype) {
                return Err(Error::InvalidQuery(format!("unknown ftype '{ftype}'")));
            }
        }
        Ok(())
    }
}

fn like_pattern(needle: &str) -> SqlValue {
    SqlValue::from(format!("%{}%", needle.trim()))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Run a list query against the store.
pub fn list(store: &Store, types: &FeedTypes, params: &ListParams) -> Result<Vec<StoredItem>> {
    params.validate(types)?;

    let mut clauses: Vec<String> = Vec::new();
    let mut binds: Vec<SqlValue> = Vec::new();

    if !params.ftypes.is_empty() {
        clauses.push(format!("ftype IN ({})", placeholders(params.ftypes.len())));
        binds.extend(params.ftypes.iter().cloned().map(SqlValue::from));
    }

    match params.order_by {
        OrderBy::Score => {
            clauses.push("score IS NOT NULL".to_string());
            // Curation rule: keep episodic/high-churn types out of
            // score-ranked views even when individual records carry scores.
            let denied = types.without_scores();
            if !denied.is_empty() {
                clauses.push(format!("ftype NOT IN ({})", placeholders(denied.len())));
                binds.extend(denied.into_iter().map(SqlValue::from));
            }
        }
        OrderBy::ReleaseDate => {
            clauses.push("release_date IS NOT NULL".to_string());
        }
        OrderBy::When => {}
    }

    let trimmed_query = params.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    if let Some(q) = trimmed_query {
        // SQLite LIKE is case-insensitive for ASCII, which is good enough
        // for feed titles in practice.
        clauses.push("(title LIKE ? OR creator LIKE ? OR subtitle LIKE ? OR id LIKE ?)".to_string());
        for _ in 0..4 {
            binds.push(like_pattern(q));
        }
    } else {
        for (column, value) in [
            ("title", &params.title),
            ("creator", &params.creator),
            ("subtitle", &params.subtitle),
        ] {
            if let Some(needle) = value.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                clauses.push(format!("{column} LIKE ?"));
                binds.push(like_pattern(needle));
            }
        }
    }

    // 'when' is a reserved word in SQLite, hence the quoting. The secondary
    // `"when" DESC` keeps score and release-date orderings deterministic and
    // surfaces recently-finished items first among ties.
    let order_sql = match params.order_by {
        OrderBy::When => format!("\"when\" {}", params.sort.sql()),
        OrderBy::Score => format!("score {}, \"when\" DESC", params.sort.sql()),
        OrderBy::ReleaseDate => format!("release_date {}, \"when\" DESC", params.sort.sql()),
    };

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let sql = format!(
        "SELECT {COLUMNS} FROM feed_items{where_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?"
    );
    binds.push(SqlValue::from(params.limit as i64));
    binds.push(SqlValue::from(params.offset as i64));

    tracing::debug!(sql = %sql, "list query");

    let mut stmt = store.conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(binds))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(StoredItem::from_row(row)?);
    }
    Ok(items)
}
