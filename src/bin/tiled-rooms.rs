//! Batch driver for the room pipeline.
//!
//! Usage:
//!   tiled-rooms export                 # tiles/*.tmx -> rooms/*.json
//!   tiled-rooms import                 # rooms/*.json -> tiles/*.tmx
//!   tiled-rooms convert A1.tmx A1.json
//!   tiled-rooms validate [FILES...]
//!   tiled-rooms check-tmx [FILES...]
//!   tiled-rooms migrate --tile-size 32
//!   tiled-rooms cleanup

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiled_rooms::batch::{self, ValidationRun};
use tiled_rooms::{BatchSummary, Direction, PipelineConfig};

/// Tiled TMX <-> room JSON pipeline
#[derive(Parser, Debug)]
#[command(name = "tiled-rooms")]
#[command(about = "Convert and validate Tiled room files")]
struct Cli {
    /// Pipeline config (TOML)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override the authoring maps directory
    #[arg(long, global = true)]
    tiles_dir: Option<PathBuf>,

    /// Override the runtime rooms directory
    #[arg(long, global = true)]
    rooms_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one file; direction follows the source extension
    Convert { src: PathBuf, dst: PathBuf },
    /// Convert every .tmx map into a room
    Export,
    /// Convert every room back into a .tmx map
    Import,
    /// Validate rooms (all rooms when no files are given)
    Validate {
        files: Vec<PathBuf>,
        /// Also check CSV grids against layer sizes
        #[arg(long)]
        strict_grid: bool,
    },
    /// Check that .tmx maps are loadable by Tiled
    CheckTmx { files: Vec<PathBuf> },
    /// Rescale every room to a new tile size
    Migrate {
        #[arg(long, default_value = "32")]
        tile_size: u32,
    },
    /// Remove legacy tilesets from every .tmx map
    Cleanup,
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.tiles_dir {
        config.tiles_dir = dir.clone();
    }
    if let Some(dir) = &cli.rooms_dir {
        config.rooms_dir = dir.clone();
    }
    Ok(config)
}

fn print_summary(what: &str, summary: &BatchSummary) {
    for failure in &summary.failures {
        println!("FAIL {}: {}", failure.path.display(), failure.reason);
    }
    println!(
        "{what} complete: {}/{} succeeded",
        summary.succeeded, summary.total
    );
}

fn print_run(run: &ValidationRun) {
    for (path, report) in &run.reports {
        let status = if report.passed() { "ok" } else { "invalid" };
        println!(
            "{status} {} ({} errors, {} warnings)",
            path.display(),
            report.errors.len(),
            report.warnings.len()
        );
        for e in &report.errors {
            println!("   error: {e}");
        }
        for w in &report.warnings {
            println!("   warning: {w}");
        }
    }
    print_summary("Validation", &run.summary);
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = load_config(&cli)?;

    let ok = match cli.command {
        Command::Convert { src, dst } => {
            tiled_rooms::convert_file(&src, &dst)
                .with_context(|| format!("Converting {}", src.display()))?;
            println!("Converted {} -> {}", src.display(), dst.display());
            true
        }
        Command::Export => {
            let summary = batch::convert_dir(&config, Direction::Export)?;
            print_summary("Export", &summary);
            summary.all_ok()
        }
        Command::Import => {
            let summary = batch::convert_dir(&config, Direction::Import)?;
            print_summary("Import", &summary);
            summary.all_ok()
        }
        Command::Validate { files, strict_grid } => {
            config.strict_grid |= strict_grid;
            let run = if files.is_empty() {
                batch::validate_dir(&config)?
            } else {
                batch::validate_rooms(&files, config.validator_options())
            };
            print_run(&run);
            run.summary.all_ok()
        }
        Command::CheckTmx { files } => {
            let files = if files.is_empty() {
                batch::list_documents(&config.tiles_dir, "tmx", &config)?
            } else {
                files
            };
            let run = batch::check_maps(&files);
            print_run(&run);
            run.summary.all_ok()
        }
        Command::Migrate { tile_size } => {
            let summary = batch::migrate_dir(&config, tile_size)?;
            print_summary("Migration", &summary);
            summary.all_ok()
        }
        Command::Cleanup => {
            let summary = batch::cleanup_dir(&config)?;
            print_summary("Cleanup", &summary);
            summary.all_ok()
        }
    };
    Ok(ok)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiled_rooms=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
