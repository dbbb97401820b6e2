//! Mosaic Patch CLI
//!
//! Patch a tiled raster mosaic in a spatial database with a new raster.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mosaic_patch::{config::SAMPLE_CONFIG, load_patch, run_patch, Config, PatchRunner, SqliteTileStore};

#[derive(Parser)]
#[command(name = "mosaic-patch")]
#[command(about = "Patch a tiled raster mosaic with a new raster", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Override the category tag to patch
    #[arg(long, global = true)]
    category: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the patch (default if no command specified)
    Run,

    /// List the tiles the patch would touch, without writing
    Analyze,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Run) => {
            run_command(cli.config, cli.category)?;
        }

        Some(Commands::Analyze) => {
            analyze_command(cli.config, cli.category)?;
        }

        Some(Commands::Validate) => {
            validate_command(cli.config)?;
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

fn load_config(config_path: &PathBuf, category: Option<String>) -> Result<Config> {
    let mut config = Config::from_file(config_path)?;
    if let Some(category) = category {
        config.patch.category = category;
    }
    config.validate()?;
    Ok(config)
}

fn run_command(config_path: PathBuf, category: Option<String>) -> Result<()> {
    let config = load_config(&config_path, category)?;
    let stats = run_patch(&config)?;

    for failure in &stats.failures {
        eprintln!("tile {} failed: {}", failure.rid, failure.error);
    }
    println!("{stats}");

    Ok(())
}

fn analyze_command(config_path: PathBuf, category: Option<String>) -> Result<()> {
    let config = load_config(&config_path, category)?;

    let patch = load_patch(&config)?;
    let bounds = patch.bounds();

    let store = SqliteTileStore::open(&config.store.database)?;
    let runner = PatchRunner::new(store);
    let rids = runner.affected_tiles(&patch, &config.patch.category)?;

    println!("\n=== Patch Analysis ===");
    println!("Patch: {}x{} pixels", patch.rows(), patch.cols());
    println!(
        "Bounds: [{:.4}, {:.4}, {:.4}, {:.4}] (EPSG:{})",
        bounds[0], bounds[1], bounds[2], bounds[3], patch.srid
    );
    println!("Category: {}", config.patch.category);
    println!("Affected tiles: {}", rids.len());
    for rid in rids {
        println!("  tile {rid}");
    }
    println!("======================\n");

    Ok(())
}

fn validate_command(config_path: PathBuf) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    config.validate()?;
    println!("Configuration is valid");
    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    std::fs::write(&output, SAMPLE_CONFIG)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
