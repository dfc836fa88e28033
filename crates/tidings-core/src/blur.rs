//! Rule-based blur annotation matching.
//!
//! A blur rule pairs a record attribute (`id`, `title`, `image_url`) with a
//! glob or regex pattern. A rule set is a logical OR: the first matching rule
//! wins and evaluation stops. Matching is a pure predicate; the caller (the
//! extraction orchestrator) is responsible for appending the blur flag to a
//! matched record.
//!
//! # Rule file format
//!
//! One rule per line, `attribute: pattern`. Glob attributes are `id`,
//! `title`, `image_url`; regex variants are `id_regex`, `title_regex`,
//! `image_url_regex`. Blank lines are skipped.
//!
//! ```text
//! id: *up_2009_*
//! title_regex: (?i)season finale
//! image_url: https://img.example/private/*
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::error::{Error, Result};
use crate::item::FeedItem;

/// Which record attribute a rule tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    ImageUrl,
}

impl Field {
    /// Extract the attribute's value, `None` when absent on this record.
    fn value<'a>(self, item: &'a FeedItem) -> Option<&'a str> {
        match self {
            Self::Id => Some(item.id.as_str()),
            Self::Title => Some(item.title.as_str()),
            Self::ImageUrl => item.image_url.as_deref(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::ImageUrl => "image_url",
        }
    }
}

/// Compiled pattern half of a rule.
#[derive(Debug, Clone)]
enum Pattern {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl Pattern {
    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Glob(glob) => glob.is_match(value),
            // Unanchored search, like the original list format.
            Self::Regex(re) => re.is_match(value),
        }
    }
}

/// One compiled blur rule.
#[derive(Debug, Clone)]
pub struct BlurRule {
    field: Field,
    pattern: Pattern,
    /// The raw pattern text, kept for display.
    raw: String,
}

impl BlurRule {
    /// Parse a single `attribute: pattern` line.
    fn from_line(line: &str) -> Result<Self> {
        let (attr, pattern) = line.split_once(':').ok_or_else(|| Error::BlurRule {
            line: line.to_string(),
            reason: "expected 'attribute: pattern'".to_string(),
        })?;
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::BlurRule {
                line: line.to_string(),
                reason: "empty pattern".to_string(),
            });
        }

        let (field, is_regex) = match attr.trim().to_lowercase().as_str() {
            "id" => (Field::Id, false),
            "title" => (Field::Title, false),
            "image_url" => (Field::ImageUrl, false),
            "id_regex" => (Field::Id, true),
            "title_regex" => (Field::Title, true),
            "image_url_regex" => (Field::ImageUrl, true),
            other => {
                return Err(Error::BlurRule {
                    line: line.to_string(),
                    reason: format!("unknown attribute '{other}'"),
                })
            }
        };

        let pattern_text = pattern.to_string();
        let pattern = if is_regex {
            Pattern::Regex(Regex::new(pattern)?)
        } else {
            Pattern::Glob(Glob::new(pattern)?.compile_matcher())
        };

        Ok(Self {
            field,
            pattern,
            raw: pattern_text,
        })
    }

    /// Test this rule against a record. Rules targeting an absent attribute
    /// never match.
    fn matches(&self, item: &FeedItem) -> bool {
        self.field
            .value(item)
            .is_some_and(|value| self.pattern.is_match(value))
    }
}

impl fmt::Display for BlurRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.pattern {
            Pattern::Glob(_) => "",
            Pattern::Regex(_) => "_regex",
        };
        write!(f, "{}{}: {}", self.field.name(), suffix, self.raw)
    }
}

/// A compiled set of blur rules.
#[derive(Debug, Clone, Default)]
pub struct BlurRules {
    rules: Vec<BlurRule>,
}

impl BlurRules {
    /// Parse a rule set from text, one rule per line.
    pub fn parse_str(text: &str) -> Result<Self> {
        let rules = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(BlurRule::from_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Parse a rule set from a file.
    pub fn parse_file(path: &Path) -> Result<Self> {
        Self::parse_str(&fs::read_to_string(path)?)
    }

    /// Whether any rule matches the record. First match short-circuits.
    pub fn matches(&self, item: &FeedItem) -> bool {
        self.rules.iter().any(|rule| rule.matches(item))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Iterate the rules, for logging the active set at startup.
    pub fn iter(&self) -> impl Iterator<Item = &BlurRule> {
        self.rules.iter()
    }
}
