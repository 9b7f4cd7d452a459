//! # Warden Sim
//!
//! Runs the courtyard encounter and prints a JSON summary.
//!
//! Usage: `warden-sim [config.toml] [seconds]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use warden_ai::{AiConfig, CONFIG_FILE};
use warden_sim::Scenario;

/// Simulation ticks per second.
const TICK_RATE: u32 = 20;

/// Default run length in simulated seconds.
const DEFAULT_DURATION: f32 = 30.0;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("warden=info".parse()?))
        .init();

    info!("Warden sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| CONFIG_FILE.to_string());
    let duration = match args.next() {
        Some(raw) => raw
            .parse::<f32>()
            .with_context(|| format!("invalid duration: {raw}"))?,
        None => DEFAULT_DURATION,
    };

    let config = AiConfig::load_or_default(&config_path);
    config.check()?;

    let mut scenario = Scenario::courtyard(&config, TICK_RATE);
    let summary = scenario.run(duration);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("Warden sim finished");
    Ok(())
}
