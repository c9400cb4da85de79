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

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Raw field map as delivered by the Solax API (or its simulated stand-in).
/// Values are heterogeneous: numbers, numeric strings, booleans, nulls.
pub type RawPayload = serde_json::Map<String, Value>;

/// A source of realtime inverter telemetry. The live client and the fake
/// data generator both produce the same raw payload shape, so everything
/// downstream of the fetch is identical for the two.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch(&self) -> Result<RawPayload>;
}
