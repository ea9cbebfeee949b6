//! posecompare-sim -- run the playback engine against a virtual grid
//!
//! Drives a grid of in-memory video cells from a 60 Hz virtual tick source
//! and prints the final engine snapshot as JSON. Logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pc_common::EngineConfig;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod scenario;

use scenario::ScenarioOptions;

#[derive(Parser, Debug)]
#[command(name = "posecompare-sim")]
#[command(version, about = "Headless driver for the pose-compare playback engine")]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Timeline and media length in milliseconds
    #[arg(long, default_value_t = 10_000.0)]
    duration_ms: f64,

    /// Number of grid cells
    #[arg(long, default_value_t = 4)]
    cells: usize,

    /// Cell to detach from the shared clock (repeatable), e.g. cell-1
    #[arg(long = "independent")]
    independent: Vec<String>,

    /// Signed playback speed
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    speed: f64,

    /// Loop at the timeline boundaries
    #[arg(long = "loop")]
    looping: bool,

    /// Virtual time to run, in milliseconds
    #[arg(long, default_value_t = 2_000.0)]
    run_ms: f64,

    /// Make every media handle refuse play() like an autoplay policy
    #[arg(long)]
    reject_autoplay: bool,

    /// Print every event as a JSON line before the snapshot
    #[arg(long)]
    events: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config(cli.config.as_ref())?;
    info!(fps = %config.fps, "Configuration loaded");

    let options = ScenarioOptions {
        duration_ms: cli.duration_ms,
        cells: cli.cells,
        independent: cli.independent,
        speed: cli.speed,
        looping: cli.looping,
        run_ms: cli.run_ms,
        reject_autoplay: cli.reject_autoplay,
        record_events: cli.events,
    };
    let outcome = scenario::run(config, &options)?;

    if cli.events {
        for event in &outcome.events {
            println!(
                "{}",
                serde_json::to_string(event).context("failed to serialize event")?
            );
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("failed to serialize snapshot")?
    );
    Ok(())
}
