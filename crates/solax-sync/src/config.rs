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

//! Configuration loading and resolution.
//!
//! The configuration file is re-read at the start of every sync run, so
//! edits take effect on the next scheduled invocation without a restart.
//! `resolve()` clamps every bounded field into its documented range rather
//! than rejecting the file.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

fn default_base_url() -> String {
    "https://www.solaxcloud.com:9443".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_latitude() -> f64 {
    52.52
}

fn default_longitude() -> f64 {
    13.405
}

fn default_peak_power_w() -> f64 {
    5000.0
}

fn default_base_total_yield_kwh() -> f64 {
    2500.0
}

fn default_cloud_variability() -> f64 {
    0.35
}

fn default_household_base_load_w() -> f64 {
    600.0
}

fn default_metric_prefix() -> String {
    "solax".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/solax-metrics.db")
}

fn default_interval_secs() -> u64 {
    3600
}

/// Which API generation the Solax cloud account uses. The two versions
/// authenticate with differently named query parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// Settings for the live Solax cloud API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolaxConfig {
    pub base_url: String,
    pub api_version: ApiVersion,
    pub api_key: String,
    pub serial_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    pub timeout_secs: u64,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for SolaxConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: ApiVersion::V1,
            api_key: String::new(),
            serial_number: String::new(),
            site_id: None,
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Settings for the synthetic telemetry generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FakeDataConfig {
    pub enabled: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub peak_power_w: f64,
    pub base_total_yield_kwh: f64,
    pub cloud_variability: f64,
    pub household_base_load_w: f64,
}

impl Default for FakeDataConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            latitude: default_latitude(),
            longitude: default_longitude(),
            peak_power_w: default_peak_power_w(),
            base_total_yield_kwh: default_base_total_yield_kwh(),
            cloud_variability: default_cloud_variability(),
            household_base_load_w: default_household_base_load_w(),
        }
    }
}

/// How raw fields are turned into metric keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prefix for fields without an explicit mapping: `{prefix}.{field}`
    pub prefix: String,
    /// Field name -> metric key overrides
    pub mapping: HashMap<String, String>,
    /// Fields skipped during normalization (matched case-insensitively)
    pub ignore_fields: Vec<String>,
    /// Optional decimal precision for float values (0-6; 0 demotes to int)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_precision: Option<u32>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prefix: default_metric_prefix(),
            mapping: HashMap::new(),
            ignore_fields: Vec::new(),
            decimal_precision: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the sqlite database holding the metric table
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between sync runs when running as a daemon
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// The telemetry source selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    Live,
    Simulated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub solax: SolaxConfig,
    pub fake_data: FakeDataConfig,
    pub metrics: MetricsConfig,
    pub storage: StorageConfig,
    pub sync: SchedulerConfig,
}

impl AppConfig {
    /// Load and resolve the configuration file. A missing file yields the
    /// defaults; a file that fails to parse is a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                SyncError::Configuration(format!("Failed to read {}: {e}", path.display()))
            })?;
            toml::from_str(&content).map_err(|e| {
                SyncError::Configuration(format!("Failed to parse {}: {e}", path.display()))
            })?
        } else {
            Self::default()
        };

        Ok(config.resolve())
    }

    /// Clamp every bounded value into its documented range.
    #[must_use]
    pub fn resolve(mut self) -> Self {
        self.solax.timeout_secs = self.solax.timeout_secs.max(1);
        self.solax.retry_count = self.solax.retry_count.min(10);
        self.solax.retry_delay_ms = self.solax.retry_delay_ms.clamp(100, 60_000);

        self.fake_data.latitude = self.fake_data.latitude.clamp(-90.0, 90.0);
        self.fake_data.longitude = self.fake_data.longitude.clamp(-180.0, 180.0);
        self.fake_data.peak_power_w = self.fake_data.peak_power_w.max(0.0);
        self.fake_data.base_total_yield_kwh = self.fake_data.base_total_yield_kwh.max(0.0);
        self.fake_data.cloud_variability = self.fake_data.cloud_variability.clamp(0.0, 1.0);
        self.fake_data.household_base_load_w = self.fake_data.household_base_load_w.max(0.0);

        if self.metrics.prefix.trim().is_empty() {
            self.metrics.prefix = default_metric_prefix();
        }
        self.metrics.decimal_precision = self.metrics.decimal_precision.map(|p| p.min(6));

        self
    }

    /// Whether the live API credentials are present.
    pub fn has_credentials(&self) -> bool {
        !self.solax.api_key.is_empty() && !self.solax.serial_number.is_empty()
    }

    /// Select the telemetry source for this run. Fake mode wins when
    /// enabled; missing credentials also fall back to the simulator so an
    /// unconfigured installation produces demo data instead of errors.
    pub fn telemetry_mode(&self) -> TelemetryMode {
        if self.fake_data.enabled {
            return TelemetryMode::Simulated;
        }

        if !self.has_credentials() {
            warn!("Solax credentials are not configured, falling back to simulated data");
            return TelemetryMode::Simulated;
        }

        TelemetryMode::Live
    }
}
