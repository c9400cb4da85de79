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

//! Solax cloud REST API client.
//!
//! The cloud endpoint is flaky in the field, so every request runs through
//! a bounded retry loop with linear backoff. An explicit API-reported error
//! (`success: false` in the envelope) is never retried — the credentials or
//! serial number are wrong and repeating the call will not fix them.

use crate::config::{ApiVersion, SolaxConfig};
use crate::error::{Result, SyncError};
use crate::source::{RawPayload, TelemetrySource};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Backoff cap; a delay longer than this just stalls the scheduler.
const MAX_BACKOFF_MS: u64 = 30_000;

enum AttemptError {
    /// API-level failure reported by the upstream; retrying is pointless.
    Fatal(SyncError),
    /// Transport/HTTP/decoding failure; worth another attempt.
    Retryable(SyncError),
}

/// Client for the Solax cloud realtime API.
pub struct SolaxClient {
    config: SolaxConfig,
    client: Client,
}

impl std::fmt::Debug for SolaxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolaxClient")
            .field("base_url", &self.config.base_url)
            .field("api_version", &self.config.api_version)
            .finish_non_exhaustive()
    }
}

impl SolaxClient {
    /// Create a new client. Fails fast when credentials are missing so a
    /// misconfigured installation never sends a request.
    pub fn new(config: SolaxConfig) -> Result<Self> {
        if config.api_key.is_empty() || config.serial_number.is_empty() {
            return Err(SyncError::Configuration(
                "Solax API key and serial number must be configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Fetch the latest realtime metrics.
    pub async fn fetch_realtime(&self) -> Result<RawPayload> {
        self.request("getRealtimeInfo").await
    }

    /// Fetch static inverter information, if the account supports it.
    pub async fn fetch_inverter_info(&self) -> Result<RawPayload> {
        self.request("getInverterInfo").await
    }

    async fn request(&self, operation: &str) -> Result<RawPayload> {
        let url = self.endpoint_url(operation);
        let params = self.query_params();
        let total = u64::from(self.config.retry_count) + 1;
        let mut attempt: u64 = 1;

        debug!("Requesting {operation} from {url}");

        loop {
            match self.attempt(&url, &params).await {
                Ok(payload) => return Ok(payload),
                Err(AttemptError::Fatal(e)) => {
                    error!("Solax API returned an error: {e}");
                    return Err(e);
                }
                Err(AttemptError::Retryable(e)) if attempt >= total => {
                    error!("Solax request failed after {attempt}/{total} attempts: {e}");
                    return Err(e);
                }
                Err(AttemptError::Retryable(e)) => {
                    let delay = backoff_delay(self.config.retry_delay_ms, attempt);
                    warn!(
                        "Solax request failed (attempt {attempt}/{total}): {e}. Retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> std::result::Result<RawPayload, AttemptError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                AttemptError::Retryable(SyncError::Upstream(format!("request failed: {e}")))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Retryable(SyncError::Upstream(format!(
                "HTTP {status} from Solax API"
            ))));
        }

        let body: Value = response.json().await.map_err(|e| {
            AttemptError::Retryable(SyncError::Upstream(format!("invalid JSON body: {e}")))
        })?;

        extract_payload(body)
    }

    fn endpoint_url(&self, operation: &str) -> String {
        format!(
            "{}/api/{}/{operation}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version.as_str()
        )
    }

    /// Authentication parameters differ between the two API generations:
    /// v1 wants `tokenId`/`plantId`, v2 wants `accessToken`/`uid`. The
    /// device serial is always sent as `sn`.
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("sn", self.config.serial_number.clone())];

        match self.config.api_version {
            ApiVersion::V1 => {
                params.push(("tokenId", self.config.api_key.clone()));
                if let Some(site_id) = &self.config.site_id {
                    params.push(("plantId", site_id.clone()));
                }
            }
            ApiVersion::V2 => {
                params.push(("accessToken", self.config.api_key.clone()));
                if let Some(site_id) = &self.config.site_id {
                    params.push(("uid", site_id.clone()));
                }
            }
        }

        params
    }
}

/// Linear backoff, capped at [`MAX_BACKOFF_MS`].
fn backoff_delay(retry_delay_ms: u64, attempt: u64) -> Duration {
    Duration::from_millis((retry_delay_ms * attempt).min(MAX_BACKOFF_MS))
}

/// Unwrap the heterogeneous response envelope: explicit `success: false`
/// aborts with the upstream message, otherwise the payload object lives
/// under `result`, `data`, or is the body itself.
fn extract_payload(body: Value) -> std::result::Result<RawPayload, AttemptError> {
    if let Some(success) = body.get("success")
        && is_falsy(success)
    {
        let message = body
            .get("exception")
            .and_then(Value::as_str)
            .or_else(|| body.get("message").and_then(Value::as_str))
            .unwrap_or("Solax API reported an error")
            .to_string();
        return Err(AttemptError::Fatal(SyncError::Upstream(message)));
    }

    for key in ["result", "data"] {
        if let Some(Value::Object(payload)) = body.get(key) {
            return Ok(payload.clone());
        }
    }

    if let Value::Object(payload) = body {
        return Ok(payload);
    }

    Err(AttemptError::Retryable(SyncError::MalformedResponse(
        "unexpected response format from Solax API".to_string(),
    )))
}

/// The API reports failure as `false`, `0`, `"false"` or `"0"` depending
/// on the version.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s == "false" || s == "0",
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

#[async_trait]
impl TelemetrySource for SolaxClient {
    async fn fetch(&self) -> Result<RawPayload> {
        self.fetch_realtime().await
    }
}
