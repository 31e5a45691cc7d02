use std::path::PathBuf;

use clap::{Parser, Subcommand};
use meniscus::{detect, draw};
use meniscus::level::LevelDetectConfig;

#[cfg(not(feature = "tracing"))]
use log::{info, warn, LevelFilter};
#[cfg(feature = "tracing")]
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "meniscus", about = "Liquid-level detection tools")]
struct Cli {
    /// Emit JSON log lines (tracing builds only).
    #[arg(long, global = true)]
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    json_logs: bool,

    /// More verbose logging (`RUST_LOG` takes over in tracing builds).
    #[arg(short, long, global = true)]
    #[cfg_attr(feature = "tracing", allow(dead_code))]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect the liquid level in a single image described by a JSON config.
    Detect {
        /// Path to the detection config.
        #[arg(long)]
        config: PathBuf,
        /// Directory for diagnostic images when no level is found.
        #[arg(long)]
        failure_dir: Option<PathBuf>,
        /// Override the report path from the config.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write the image with the detected level rows drawn on it.
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    #[cfg(not(feature = "tracing"))]
    {
        let level = if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        meniscus::core::init_with_level(level)?;
    }
    #[cfg(feature = "tracing")]
    meniscus::init_tracing(cli.json_logs);

    match cli.command {
        Command::Detect {
            config,
            failure_dir,
            output,
            overlay,
        } => run_detect(&config, failure_dir.as_deref(), output, overlay.as_deref()),
    }
}

#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "info", skip(failure_dir, output, overlay))
)]
fn run_detect(
    config_path: &std::path::Path,
    failure_dir: Option<&std::path::Path>,
    output: Option<PathBuf>,
    overlay: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = LevelDetectConfig::load_json(config_path)?;
    let report = detect::run_detect_config(&cfg, config_path, failure_dir)?;

    match report.best() {
        Some(best) => info!(
            "level at row {} (relative height {:.3}, score {:.3})",
            best.row, best.relative_height, best.score
        ),
        None => warn!(
            "no level: {}",
            report.error.as_deref().unwrap_or("no candidates")
        ),
    }

    if let Some(path) = overlay {
        let img = detect::load_rgb(&cfg.image_path)?;
        draw::save_overlay(path, &img, &report.candidates, None)?;
        info!("overlay written to {}", path.display());
    }

    let out_path = output.unwrap_or_else(|| cfg.output_path());
    report.write_json(&out_path)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    info!("report written to {}", out_path.display());
    Ok(())
}
