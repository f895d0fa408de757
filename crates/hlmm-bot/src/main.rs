//! hlmm market maker - Entry Point
//!
//! Loads and validates the configuration, logs the resolved per-pair
//! setup and builds the quote pipeline. The exchange client drives
//! `QuotePipeline` in production.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing::info;

/// hlmm quote engine configuration check
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via HLMM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    hlmm_telemetry::init_logging()?;

    info!(
        started_at = %Utc::now().to_rfc3339(),
        "Starting hlmm v{}",
        env!("CARGO_PKG_VERSION")
    );

    // CLI arg > HLMM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("HLMM_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = hlmm_bot::AppConfig::load(&config_path, |key| std::env::var(key).ok())?;
    info!(
        mode = ?config.behaviour_mode,
        base_spread_bps = %config.mm.base_spread_bps,
        active_layers = config.mm.active_layers,
        layer_multiplier = %config.mm.layer_multiplier,
        "Configuration loaded"
    );

    for pair in &config.pairs {
        let spec = pair.instrument_spec()?;
        match config.pair_sizing.get(&pair.name) {
            Some(sizing) => info!(
                pair = %pair.name,
                tick = %spec.tick_size,
                lot = %spec.lot_size,
                base_clip_usd = %sizing.base_clip_usd,
                max_layers_per_side = sizing.max_layers_per_side,
                max_exposure_per_side_usd = %sizing.max_exposure_per_side_usd,
                "Pair ready (institutional sizing)"
            ),
            None => info!(
                pair = %pair.name,
                tick = %spec.tick_size,
                lot = %spec.lot_size,
                capital_per_side_usd = %config.mm.capital_per_side_usd,
                "Pair ready (default sizing)"
            ),
        }
    }

    let _pipeline = hlmm_bot::QuotePipeline::from_config(&config);
    info!(pairs = config.pairs.len(), "Quote pipeline ready");

    Ok(())
}
