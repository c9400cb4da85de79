// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Solax Sync.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Solax Sync - entry point.
//!
//! Runs either a single sync (`--once`, for external cron setups) or a
//! periodic loop. The configuration file is re-loaded before every run so
//! edits apply at the next tick without a restart.

use clap::Parser;
use solax_sync::config::AppConfig;
use solax_sync::store::MetricStore;
use solax_sync::sync::SyncJob;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "solax-sync", about = "Sync Solax cloud inverter metrics into a local store")]
struct Args {
    /// Path of the TOML configuration file
    #[arg(short, long, default_value = "solax-sync.toml")]
    config: PathBuf,

    /// Run a single sync and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solax_sync=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("Starting Solax Sync (config: {})", args.config.display());

    let config = AppConfig::load(&args.config)?;
    let store = MetricStore::open(&config.storage.path)?;

    if args.once {
        SyncJob::new(&config, &store).run().await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.sync.interval_secs.max(1)));

    loop {
        ticker.tick().await;

        // Re-resolve configuration each run so administrative edits take
        // effect without a restart. A broken file skips the run only.
        match AppConfig::load(&args.config) {
            Ok(config) => {
                SyncJob::new(&config, &store).run().await;
            }
            Err(e) => {
                error!("Skipping run, configuration could not be loaded: {e}");
            }
        }
    }
}
