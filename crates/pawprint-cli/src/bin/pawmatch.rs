//! pawmatch - Find look-alike animals
//!
//! Usage:
//!   pawmatch [--config <path>] similar <subject> [--threshold t]
//!   pawmatch [--config <path>] image <img> [--species s] [--threshold t]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pawprint_cli::output::{print_json_results, print_json_statistics};
use pawprint_cli::{init_logging, load_config};
use pawprint_core::{open_engine, SearchStatistics, Species, SubjectId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pawmatch")]
#[command(about = "Search stored fingerprints for similar animals", long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Defaults to config.toml if present
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Minimum similarity in [0, 1]; defaults to matching.default_threshold
    #[arg(short, long, global = true)]
    threshold: Option<f64>,

    /// Also print the search statistics record
    #[arg(long, global = true)]
    stats: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Animals of the same species that look like a registered one
    Similar {
        subject: SubjectId,
    },
    /// Animals that look like a single photograph
    Image {
        image: PathBuf,
        /// Restrict to one species; all species when omitted
        #[arg(long)]
        species: Option<Species>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let (_, matcher) = open_engine(&config).await?;
    let threshold = args.threshold.unwrap_or_else(|| matcher.default_threshold());

    let (query, source, result) = match &args.command {
        Command::Similar { subject } => (
            subject.to_string(),
            Some(subject),
            matcher.find_similar(subject, threshold).await,
        ),
        Command::Image { image, species } => {
            let bytes = std::fs::read(image)
                .with_context(|| format!("Failed to read query image: {}", image.display()))?;
            (
                image.display().to_string(),
                None,
                matcher.search_by_image(&bytes, *species, threshold).await,
            )
        }
    };

    match result {
        Ok(outcome) => {
            let statistics = args
                .stats
                .then(|| SearchStatistics::from_outcome(source, threshold, &outcome));
            print_json_results(&query, &outcome, statistics.as_ref());
            Ok(())
        }
        Err(e) => {
            if args.stats {
                print_json_statistics(&SearchStatistics::failed(source, threshold));
            }
            Err(e.into())
        }
    }
}
