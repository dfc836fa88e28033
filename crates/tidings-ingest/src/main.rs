//! The `tidings` command line: extraction and store maintenance.
//!
//! ```bash
//! # Extract everything the config declares into a new staging batch
//! tidings index --config feed.toml -o ./staging
//!
//! # Only sources whose name mentions trakt, with blur rules applied
//! tidings index -i trakt -B blur.txt
//!
//! # Merge pending staging batches into the store
//! tidings update-db --db-path feeddata.sqlite --staging-dir ./staging
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tidings_core::BlurRules;
use tidings_ingest::{ExtractConfig, Extractor};
use tidings_store::{sync, BatchWriter, Store, SyncOptions};

/// Personal activity feed aggregator.
#[derive(Parser, Debug)]
#[command(name = "tidings")]
#[command(about = "Personal activity feed aggregator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run extraction and write a staging batch.
    #[command(alias = "extract")]
    Index(IndexArgs),
    /// Merge pending staging batches into the feed store.
    UpdateDb(UpdateDbArgs),
}

#[derive(Parser, Debug)]
struct IndexArgs {
    /// Extraction config file (sources, timeshift, transforms).
    #[arg(long, default_value = "feed.toml", env = "TIDINGS_CONFIG")]
    config: PathBuf,

    /// Comma-separated substrings of source names to include.
    #[arg(short = 'i', long, value_delimiter = ',', env = "TIDINGS_INCLUDE_SOURCES")]
    include: Vec<String>,

    /// Comma-separated substrings of source names to exclude.
    #[arg(short = 'e', long, value_delimiter = ',', env = "TIDINGS_EXCLUDE_SOURCES")]
    exclude: Vec<String>,

    /// Blur rule file, one 'attribute: pattern' per line.
    #[arg(short = 'B', long)]
    blur_file: Option<PathBuf>,

    /// JSON file with a list of already-synced ids to skip (from /data/ids).
    #[arg(short = 'E', long)]
    exclude_ids_file: Option<PathBuf>,

    /// Directory staging batches are written to.
    #[arg(short = 'o', long, default_value = "staging", env = "TIDINGS_STAGING_DIR")]
    output_dir: PathBuf,

    /// Write the number of emitted records to this file.
    #[arg(short = 'C', long)]
    write_count_to: Option<PathBuf>,

    /// Print records to stdout as they are extracted.
    #[arg(long)]
    echo: bool,
}

#[derive(Parser, Debug)]
struct UpdateDbArgs {
    /// Path to the SQLite feed store.
    #[arg(long, default_value = "feeddata.sqlite", env = "TIDINGS_DB_PATH")]
    db_path: PathBuf,

    /// Directory holding pending staging batches.
    #[arg(long, default_value = "staging", env = "TIDINGS_STAGING_DIR")]
    staging_dir: PathBuf,

    /// Clear the store before merging (full re-sync).
    #[arg(long)]
    delete_db: bool,

    /// Delete every processed batch instead of retaining the newest.
    #[arg(long)]
    delete_all_batches: bool,

    /// Write the number of newly merged records to this file.
    #[arg(short = 'C', long)]
    write_count_to: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")),
        )
        .init();

    match Cli::parse().command {
        Command::Index(args) => run_index(args),
        Command::UpdateDb(args) => run_update_db(args),
    }
}

fn run_index(args: IndexArgs) -> Result<()> {
    let config = ExtractConfig::load(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;

    let blur = args
        .blur_file
        .as_deref()
        .map(BlurRules::parse_file)
        .transpose()
        .context("failed to parse blur rule file")?;
    if let Some(blur) = &blur {
        tracing::info!("{} blur matchers:", blur.len());
        for rule in blur.iter() {
            tracing::info!("  {rule}");
        }
    }

    let exclude_ids: HashSet<String> = match &args.exclude_ids_file {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let ids: Vec<String> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON list of ids", path.display()))?;
            tracing::info!("Excluding {} already-synced ids", ids.len());
            ids.into_iter().collect()
        }
        None => HashSet::new(),
    };

    let mut extractor = Extractor::new(config.build_sources());
    extractor.include = args.include;
    extractor.exclude = args.exclude;
    extractor.blur = blur;
    extractor.timeshift = config.build_timeshift()?;
    extractor.transforms = config.build_transforms();
    extractor.exclude_ids = exclude_ids;

    let mut writer = BatchWriter::create(&args.output_dir)
        .with_context(|| format!("failed to create batch in {}", args.output_dir.display()))?;

    let echo = args.echo;
    let stats = extractor.run(|item| {
        if echo {
            println!("{}", serde_json::to_string(&item)?);
        }
        writer.write(&item)?;
        Ok(())
    })?;

    match writer.finish()? {
        Some(path) => tracing::info!("Staging batch written: {}", path.display()),
        None => tracing::info!("No records extracted, no batch written"),
    }

    tracing::info!("Total: {} items", stats.emitted);
    if stats.excluded > 0 {
        tracing::info!("Excluded {} already-synced items", stats.excluded);
    }
    if stats.dropped > 0 {
        tracing::info!("Dropped {} items via transforms", stats.dropped);
    }
    if stats.blurred > 0 || stats.timeshifted > 0 {
        tracing::info!(
            "Annotated: {} blurred, {} timeshifted",
            stats.blurred,
            stats.timeshifted
        );
    }

    if let Some(path) = &args.write_count_to {
        fs::write(path, stats.emitted.to_string())
            .with_context(|| format!("failed to write count to {}", path.display()))?;
    }
    Ok(())
}

fn run_update_db(args: UpdateDbArgs) -> Result<()> {
    let mut store = Store::open(&args.db_path)
        .with_context(|| format!("failed to open store {}", args.db_path.display()))?;

    if args.delete_db {
        let removed = store.clear()?;
        tracing::info!("Deleted {removed} rows from the store");
    }

    let report = sync(
        &mut store,
        &SyncOptions {
            staging_dir: args.staging_dir.clone(),
            delete_all_batches: args.delete_all_batches,
        },
    )?;

    tracing::info!(
        "{} new items added ({} skipped as already present, {} batches)",
        report.merged,
        report.skipped,
        report.batches
    );

    if let Some(path) = &args.write_count_to {
        fs::write(path, report.merged.to_string())
            .with_context(|| format!("failed to write count to {}", path.display()))?;
    }
    Ok(())
}
