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

//! Solax cloud metric sync: fetches realtime inverter telemetry (or
//! generates a synthetic stand-in), normalizes it into typed key/value
//! metrics and persists only the values that changed since the last run.

pub mod client;
pub mod config;
pub mod error;
pub mod fake_data;
pub mod normalizer;
pub mod source;
pub mod store;
pub mod sync;

pub use client::SolaxClient;
pub use config::{ApiVersion, AppConfig, FakeDataConfig, SolaxConfig, TelemetryMode};
pub use error::{Result, SyncError};
pub use fake_data::FakeDataGenerator;
pub use normalizer::{MetricNormalizer, MetricValue};
pub use source::{RawPayload, TelemetrySource};
pub use store::{MetricStore, StoreOutcome};
pub use sync::{SyncJob, SyncRunOutcome};
