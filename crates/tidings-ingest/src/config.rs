//! Extraction configuration.
//!
//! A TOML file declares the source set, the optional timeshift window, and
//! an optional list of declarative transforms:
//!
//! ```toml
//! [[source]]
//! kind = "jsonl"
//! name = "trakt_history"
//! path = "~/data/feed/trakt.jsonl"
//!
//! [timeshift]
//! ftypes = ["movie", "episode"]
//! tracking_start = "2010-01-01"
//! tracking_end = "2016-06-01"
//!
//! [[transform]]
//! kind = "drop"
//! field = "ftype"
//! equals = "osrs_achievement"
//!
//! [[transform]]
//! kind = "rewrite"
//! field = "creator"
//! from = "Some Mispelled Artist"
//! to = "Some Misspelled Artist"
//! ```
//!
//! Dates are quoted ISO strings. Transforms run in declaration order with
//! the chain semantics documented in `tidings-core`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use tidings_core::{FeedItem, Timeshift, Transform, TransformChain};

use crate::error::{Error, Result};
use crate::source::{FeedSource, JsonlSource};

/// Top-level extraction config.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub timeshift: Option<TimeshiftConfig>,
    #[serde(default, rename = "transform")]
    pub transforms: Vec<TransformConfig>,
}

/// One declared source.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Replay a JSONL export (file or directory).
    Jsonl { name: String, path: PathBuf },
}

/// The timeshift window.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeshiftConfig {
    /// Feed types eligible for shifting.
    pub ftypes: Vec<String>,
    /// Earliest date ever considered; defaults to 1940-01-01.
    pub anchor: Option<String>,
    pub tracking_start: String,
    pub tracking_end: String,
}

/// A declarative transform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    /// Drop records whose field equals the given value exactly.
    Drop { field: FieldRef, equals: String },
    /// Rewrite a field when it equals `from` exactly.
    Rewrite {
        field: FieldRef,
        from: String,
        to: String,
    },
}

/// Record fields addressable from transform config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRef {
    Ftype,
    Title,
    Creator,
    Subtitle,
}

impl FieldRef {
    fn get(self, item: &FeedItem) -> Option<&str> {
        match self {
            Self::Ftype => Some(&item.ftype),
            Self::Title => Some(&item.title),
            Self::Creator => item.creator.as_deref(),
            Self::Subtitle => item.subtitle.as_deref(),
        }
    }

    fn set(self, item: &mut FeedItem, value: String) {
        match self {
            Self::Ftype => item.ftype = value,
            Self::Title => item.title = value,
            Self::Creator => item.creator = Some(value),
            Self::Subtitle => item.subtitle = Some(value),
        }
    }
}

fn parse_date(value: &str, what: &str) -> Result<NaiveDate> {
    NaiveDate::from_str(value)
        .map_err(|e| Error::Config(format!("{what}: '{value}' is not an ISO date: {e}")))
}

impl ExtractConfig {
    /// Load and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        if config.sources.is_empty() {
            return Err(Error::Config(format!(
                "{}: no sources declared",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Instantiate the declared sources, in declaration order.
    pub fn build_sources(&self) -> Vec<Box<dyn FeedSource>> {
        self.sources
            .iter()
            .map(|source| match source {
                SourceConfig::Jsonl { name, path } => {
                    Box::new(JsonlSource::new(name.clone(), path.clone())) as Box<dyn FeedSource>
                }
            })
            .collect()
    }

    /// Build the timeshift engine, if a window is configured.
    pub fn build_timeshift(&self) -> Result<Option<Timeshift>> {
        let Some(config) = &self.timeshift else {
            return Ok(None);
        };
        let anchor = match &config.anchor {
            Some(raw) => parse_date(raw, "timeshift.anchor")?,
            None => Timeshift::default_anchor(),
        };
        let timeshift = Timeshift::new(
            config.ftypes.iter().cloned().collect::<HashSet<_>>(),
            anchor,
            parse_date(&config.tracking_start, "timeshift.tracking_start")?,
            parse_date(&config.tracking_end, "timeshift.tracking_end")?,
        )?;
        Ok(Some(timeshift))
    }

    /// Compile the declared transforms into a chain.
    pub fn build_transforms(&self) -> TransformChain {
        let transforms: Vec<Transform> = self
            .transforms
            .iter()
            .cloned()
            .map(|config| -> Transform {
                match config {
                    TransformConfig::Drop { field, equals } => Box::new(move |item: &FeedItem| {
                        if field.get(item) == Some(equals.as_str()) {
                            None
                        } else {
                            Some(item.clone())
                        }
                    }),
                    TransformConfig::Rewrite { field, from, to } => {
                        Box::new(move |item: &FeedItem| {
                            let mut out = item.clone();
                            if field.get(item) == Some(from.as_str()) {
                                field.set(&mut out, to.clone());
                            }
                            Some(out)
                        })
                    }
                }
            })
            .collect();
        TransformChain::new(transforms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset};

    const CONFIG: &str = r#"
[[source]]
kind = "jsonl"
name = "trakt_history"
path = "/data/feed/trakt.jsonl"

[timeshift]
ftypes = ["movie"]
tracking_start = "2010-01-01"
tracking_end = "2016-06-01"

[[transform]]
kind = "drop"
field = "ftype"
equals = "osrs_achievement"

[[transform]]
kind = "rewrite"
field = "creator"
from = "Old Name"
to = "New Name"
"#;

    fn item(ftype: &str, creator: Option<&str>) -> FeedItem {
        let when =
            DateTime::<FixedOffset>::parse_from_rfc3339("2021-05-01T10:00:00+00:00").unwrap();
        let mut item = FeedItem::new("x_1", "title", ftype, when);
        item.creator = creator.map(String::from);
        item
    }

    #[test]
    fn test_parses_and_builds() {
        let config: ExtractConfig = toml::from_str(CONFIG).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.build_sources().len(), 1);

        let timeshift = config.build_timeshift().unwrap().unwrap();
        assert!(timeshift.matches(&item("movie", None)));
        assert!(!timeshift.matches(&item("listen", None)));

        let chain = config.build_transforms();
        assert_eq!(chain.len(), 2);
        assert!(chain.apply(&item("osrs_achievement", None)).is_none());
        let rewritten = chain.apply(&item("movie", Some("Old Name"))).unwrap();
        assert_eq!(rewritten.creator.as_deref(), Some("New Name"));
        let untouched = chain.apply(&item("movie", Some("Other"))).unwrap();
        assert_eq!(untouched.creator.as_deref(), Some("Other"));
    }

    #[test]
    fn test_default_anchor_applied() {
        let config: ExtractConfig = toml::from_str(CONFIG).unwrap();
        let timeshift = config.build_timeshift().unwrap().unwrap();
        // A record well before any plausible anchor still shifts into the
        // window start rather than erroring.
        let when =
            DateTime::<FixedOffset>::parse_from_rfc3339("1935-01-01T00:00:00+00:00").unwrap();
        let old = FeedItem::new("x_1", "title", "movie", when);
        let shifted = timeshift.apply(&old).unwrap();
        assert_eq!(
            shifted.when.date_naive(),
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_bad_date_is_a_config_error() {
        let raw = CONFIG.replace("2010-01-01", "not-a-date");
        let config: ExtractConfig = toml::from_str(&raw).unwrap();
        assert!(matches!(
            config.build_timeshift().unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let raw = format!("{CONFIG}\n[unknown_table]\nx = 1\n");
        assert!(toml::from_str::<ExtractConfig>(&raw).is_err());
    }
}
