//! The extraction orchestrator.
//!
//! Drives the configured sources in declaration order and streams every
//! surviving record into a sink (normally a staging batch writer). Per
//! record, in order: validation, duplicate-id detection (warn, still
//! emitted), previously-synced-id exclusion, blur annotation, timeshift,
//! transform chain.
//!
//! Failure policy: a record that fails validation, or a source that raises
//! mid-iteration, aborts the entire run. Sources are not isolated from each
//! other; a partial run leaves no batch behind, and the next run simply
//! re-extracts.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tidings_core::{BlurRules, FeedItem, Timeshift, TransformChain};

use crate::error::Result;
use crate::source::FeedSource;

/// Orchestrates one extraction run over an ordered set of sources.
pub struct Extractor {
    sources: Vec<Box<dyn FeedSource>>,
    /// Substring filters against source names; empty means all sources.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub blur: Option<BlurRules>,
    pub timeshift: Option<Timeshift>,
    pub transforms: TransformChain,
    /// Ids already merged elsewhere (e.g. fetched from `/data/ids`); matching
    /// records are skipped to cut re-transmission.
    pub exclude_ids: HashSet<String>,
}

/// Timing and count accounting for one source's run.
#[derive(Debug, Clone)]
pub struct SourceRun {
    pub name: String,
    /// Records the source yielded.
    pub seen: usize,
    /// Records that made it through to the sink.
    pub emitted: usize,
    pub took: Duration,
}

/// Accounting for a whole extraction run.
#[derive(Debug, Default)]
pub struct ExtractStats {
    pub emitted: usize,
    pub excluded: usize,
    pub blurred: usize,
    pub timeshifted: usize,
    pub dropped: usize,
    pub duplicate_ids: usize,
    pub sources: Vec<SourceRun>,
}

impl Extractor {
    pub fn new(sources: Vec<Box<dyn FeedSource>>) -> Self {
        Self {
            sources,
            include: Vec::new(),
            exclude: Vec::new(),
            blur: None,
            timeshift: None,
            transforms: TransformChain::default(),
            exclude_ids: HashSet::new(),
        }
    }

    /// Run extraction, streaming every surviving record into `sink`.
    ///
    /// The sink is called in source-declaration order; a sink error aborts
    /// the run like any other.
    pub fn run<F>(&mut self, mut sink: F) -> Result<ExtractStats>
    where
        F: FnMut(FeedItem) -> Result<()>,
    {
        let Self {
            sources,
            include,
            exclude,
            blur,
            timeshift,
            transforms,
            exclude_ids,
        } = self;

        let selected = |name: &str| {
            if !include.is_empty() && !include.iter().any(|s| name.contains(s.as_str())) {
                return false;
            }
            !exclude.iter().any(|s| name.contains(s.as_str()))
        };

        let mut stats = ExtractStats::default();

        for source in sources.iter_mut() {
            let name = source.name();
            if !selected(&name) {
                tracing::debug!("Skipping source {name} (filtered)");
                continue;
            }

            tracing::info!("Extracting {name}...");
            let started = Instant::now();
            let mut seen_ids: HashSet<String> = HashSet::new();
            let mut seen = 0usize;
            let mut emitted = 0usize;

            for record in source.produce()? {
                let mut item = record?;
                seen += 1;
                item.check()?;

                // Within one source's run a repeated id is suspicious but
                // not fatal; it is logged and the record still flows.
                if !seen_ids.insert(item.id.clone()) {
                    tracing::warn!("Duplicate id from {name}: {}", item.id);
                    stats.duplicate_ids += 1;
                }

                if exclude_ids.contains(&item.id) {
                    stats.excluded += 1;
                    continue;
                }

                if let Some(blur) = &*blur {
                    if blur.matches(&item) {
                        item.mark_blurred();
                        tracing::info!(
                            id = %item.id,
                            title = %item.title,
                            "blurred image"
                        );
                        stats.blurred += 1;
                    }
                }

                if let Some(timeshift) = &*timeshift {
                    if let Some(shifted) = timeshift.apply(&item) {
                        item = shifted;
                        stats.timeshifted += 1;
                    }
                }

                match transforms.apply(&item) {
                    Some(out) => {
                        sink(out)?;
                        emitted += 1;
                        stats.emitted += 1;
                    }
                    None => stats.dropped += 1,
                }
            }

            let took = started.elapsed();
            tracing::info!(
                "Extracting {name}: {} items ({:.2}s)",
                seen,
                took.as_secs_f64()
            );
            stats.sources.push(SourceRun {
                name,
                seen,
                emitted,
                took,
            });
        }

        Ok(stats)
    }
}
