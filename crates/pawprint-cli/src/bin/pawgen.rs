//! pawgen - Pet fingerprint generator
//!
//! Usage: pawgen [--config <path>] --subject <id> --species <dog|cat> --status <s>
//!        --main <img> --face <img> --side <img> --fur <img>

use anyhow::{Context, Result};
use clap::Parser;
use pawprint_cli::output::print_json_record;
use pawprint_cli::{init_logging, load_config};
use pawprint_core::{open_engine, Species, SubjectId, View};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pawgen")]
#[command(about = "Generate a visual fingerprint for one animal", long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Defaults to config.toml if present
    #[arg(short, long)]
    config: Option<String>,

    /// Registry id of the animal
    #[arg(long)]
    subject: SubjectId,

    /// dog or cat
    #[arg(long)]
    species: Species,

    /// Lifecycle status copied into match results (lost, found, ...)
    #[arg(long, default_value = "lost")]
    status: String,

    /// Full-body photograph
    #[arg(long)]
    main: PathBuf,

    /// Face close-up
    #[arg(long)]
    face: PathBuf,

    /// Side profile
    #[arg(long)]
    side: PathBuf,

    /// Fur texture close-up
    #[arg(long)]
    fur: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    log::info!("Storage backend: {:?}", config.storage.backend);

    let mut view_images = HashMap::new();
    for (view, path) in [
        (View::Main, &args.main),
        (View::Face, &args.face),
        (View::Side, &args.side),
        (View::Fur, &args.fur),
    ] {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {} image: {}", view, path.display()))?;
        view_images.insert(view, bytes);
    }

    let (generator, _) = open_engine(&config).await?;

    let start = std::time::Instant::now();
    let record = generator
        .generate(args.subject, args.species, args.status, &view_images)
        .await?;
    log::info!("Generated in {:.2}s", start.elapsed().as_secs_f64());

    print_json_record(&record);

    Ok(())
}
