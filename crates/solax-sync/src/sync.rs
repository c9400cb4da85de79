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

//! One sync run: fetch, normalize, store, report.
//!
//! Every failure is isolated here — a bad run logs what went wrong and
//! reaches a terminal outcome, it never propagates to the scheduler or
//! corrupts state for the next run.

use crate::client::SolaxClient;
use crate::config::{AppConfig, TelemetryMode};
use crate::error::Result;
use crate::fake_data::FakeDataGenerator;
use crate::normalizer::MetricNormalizer;
use crate::source::TelemetrySource;
use crate::store::{MetricStore, StoreOutcome};
use tracing::{debug, error, info};

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRunOutcome {
    /// Metrics were compared against storage; counts in the outcome.
    Completed(StoreOutcome),
    /// The upstream payload contained nothing usable. Treated as success.
    Empty,
    /// The run failed; details were logged. The next run starts fresh.
    Failed,
}

#[derive(Debug)]
pub struct SyncJob<'a> {
    config: &'a AppConfig,
    store: &'a MetricStore,
}

impl<'a> SyncJob<'a> {
    pub fn new(config: &'a AppConfig, store: &'a MetricStore) -> Self {
        Self { config, store }
    }

    /// Execute one run. Infallible from the caller's perspective: errors
    /// are swallowed after logging.
    pub async fn run(&self) -> SyncRunOutcome {
        match self.try_run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Solax sync run failed: {e}");
                SyncRunOutcome::Failed
            }
        }
    }

    async fn try_run(&self) -> Result<SyncRunOutcome> {
        let source: Box<dyn TelemetrySource> = match self.config.telemetry_mode() {
            TelemetryMode::Live => Box::new(SolaxClient::new(self.config.solax.clone())?),
            TelemetryMode::Simulated => {
                debug!("Using simulated telemetry source");
                Box::new(FakeDataGenerator::new(self.config.fake_data.clone()))
            }
        };

        let raw = source.fetch().await?;
        let normalizer = MetricNormalizer::new(self.config.metrics.clone());
        let metrics = normalizer.normalize(&raw);

        if metrics.is_empty() {
            info!("Upstream payload produced no usable metrics, skipping run");
            return Ok(SyncRunOutcome::Empty);
        }

        let outcome = self.store.store(&metrics)?;

        if outcome.has_changes() {
            info!(
                "Stored {} Solax metrics, {} unchanged",
                outcome.written, outcome.unchanged
            );
        } else {
            debug!("No metric changes, {} values checked", outcome.unchanged);
        }

        Ok(SyncRunOutcome::Completed(outcome))
    }
}
