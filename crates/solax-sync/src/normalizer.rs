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

//! Payload normalization.
//!
//! The Solax cloud is loose about types: the same field arrives as a
//! number, a numeric string (sometimes with a decimal comma), or a boolean
//! in string clothing, depending on API version and firmware. Normalization
//! applies an explicit, ordered coercion into a tagged scalar and maps
//! field names to stable metric keys.

use crate::config::MetricsConfig;
use crate::source::RawPayload;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A normalized metric value. The logical type is established here and is
/// not persisted; storage works on the string encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// Canonical string encoding used for diffing and storage.
    pub fn encode(&self) -> String {
        match self {
            Self::Bool(true) => "1".to_string(),
            Self::Bool(false) => "0".to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Converts a raw payload into canonical metric keys and typed values.
#[derive(Debug, Clone)]
pub struct MetricNormalizer {
    config: MetricsConfig,
    ignored_fields: Vec<String>,
}

impl MetricNormalizer {
    pub fn new(config: MetricsConfig) -> Self {
        let ignored_fields = config
            .ignore_fields
            .iter()
            .map(|field| field.to_lowercase())
            .collect();

        Self {
            config,
            ignored_fields,
        }
    }

    /// Normalize a raw payload. Fields that are null, empty, ignored or
    /// non-coercible are dropped silently; input order is irrelevant.
    pub fn normalize(&self, payload: &RawPayload) -> BTreeMap<String, MetricValue> {
        let mut metrics = BTreeMap::new();

        for (field, value) in payload {
            if self.ignored_fields.contains(&field.to_lowercase()) {
                continue;
            }

            let Some(coerced) = coerce(value) else {
                continue;
            };

            let normalized = self.apply_precision(coerced);
            let key = self
                .config
                .mapping
                .get(field)
                .cloned()
                .unwrap_or_else(|| format!("{}.{field}", self.config.prefix));

            metrics.insert(key, normalized);
        }

        metrics
    }

    /// Round floats to the configured precision; precision 0 demotes the
    /// value to an integer.
    fn apply_precision(&self, value: MetricValue) -> MetricValue {
        let (MetricValue::Float(float), Some(precision)) =
            (value, self.config.decimal_precision)
        else {
            return value;
        };

        let factor = 10f64.powi(precision as i32);
        let rounded = (float * factor).round() / factor;

        if precision == 0 {
            MetricValue::Int(rounded as i64)
        } else {
            MetricValue::Float(rounded)
        }
    }
}

/// Ordered coercion: native scalars pass through, boolean strings become
/// booleans, numeric strings (decimal comma tolerated) become numbers,
/// everything else is dropped.
fn coerce(value: &Value) -> Option<MetricValue> {
    match value {
        Value::Bool(b) => Some(MetricValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(int) = n.as_i64() {
                Some(MetricValue::Int(int))
            } else {
                n.as_f64().map(MetricValue::Float)
            }
        }
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => coerce_string(s),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn coerce_string(value: &str) -> Option<MetricValue> {
    match value.to_lowercase().as_str() {
        "true" | "1" => return Some(MetricValue::Bool(true)),
        "false" | "0" => return Some(MetricValue::Bool(false)),
        _ => {}
    }

    let normalized = value.replace(',', ".");

    if is_integer_literal(&normalized) {
        return normalized.parse::<i64>().ok().map(MetricValue::Int);
    }

    normalized.parse::<f64>().ok().map(MetricValue::Float)
}

fn is_integer_literal(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);

    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer(config: MetricsConfig) -> MetricNormalizer {
        MetricNormalizer::new(config)
    }

    fn payload_from(value: Value) -> RawPayload {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_strings_become_typed_scalars() {
        let normalizer = normalizer(MetricsConfig::default());
        let payload = payload_from(json!({
            "acpower": "1234",
            "soc": 87,
            "yieldtoday": "12,345",
            "temperature": "-5"
        }));

        let metrics = normalizer.normalize(&payload);

        assert_eq!(metrics.get("solax.acpower"), Some(&MetricValue::Int(1234)));
        assert_eq!(metrics.get("solax.soc"), Some(&MetricValue::Int(87)));
        assert_eq!(
            metrics.get("solax.yieldtoday"),
            Some(&MetricValue::Float(12.345))
        );
        assert_eq!(metrics.get("solax.temperature"), Some(&MetricValue::Int(-5)));
    }

    #[test]
    fn test_boolean_strings_and_natives() {
        let normalizer = normalizer(MetricsConfig::default());
        let payload = payload_from(json!({
            "online": "TRUE",
            "charging": "0",
            "ready": true
        }));

        let metrics = normalizer.normalize(&payload);

        assert_eq!(metrics.get("solax.online"), Some(&MetricValue::Bool(true)));
        assert_eq!(metrics.get("solax.charging"), Some(&MetricValue::Bool(false)));
        assert_eq!(metrics.get("solax.ready"), Some(&MetricValue::Bool(true)));
    }

    #[test]
    fn test_nulls_empties_and_garbage_are_dropped() {
        let normalizer = normalizer(MetricsConfig::default());
        let payload = payload_from(json!({
            "a": null,
            "b": "",
            "c": "offline",
            "d": {"nested": 1},
            "e": 42
        }));

        let metrics = normalizer.normalize(&payload);

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.get("solax.e"), Some(&MetricValue::Int(42)));
    }

    #[test]
    fn test_ignored_fields_are_case_insensitive() {
        let config = MetricsConfig {
            ignore_fields: vec!["UploadTime".to_string()],
            ..MetricsConfig::default()
        };
        let normalizer = normalizer(config);
        let payload = payload_from(json!({"uploadtime": 1700000000, "soc": 50}));

        let metrics = normalizer.normalize(&payload);

        assert!(!metrics.contains_key("solax.uploadtime"));
        assert_eq!(metrics.get("solax.soc"), Some(&MetricValue::Int(50)));
    }

    #[test]
    fn test_mapping_overrides_prefix() {
        let mut config = MetricsConfig::default();
        config
            .mapping
            .insert("acpower".to_string(), "pv.output_watts".to_string());
        let normalizer = normalizer(config);
        let payload = payload_from(json!({"acpower": 900, "soc": 60}));

        let metrics = normalizer.normalize(&payload);

        assert_eq!(metrics.get("pv.output_watts"), Some(&MetricValue::Int(900)));
        assert_eq!(metrics.get("solax.soc"), Some(&MetricValue::Int(60)));
    }

    #[test]
    fn test_decimal_precision_rounds_floats() {
        let config = MetricsConfig {
            decimal_precision: Some(2),
            ..MetricsConfig::default()
        };
        let normalizer = normalizer(config);
        let payload = payload_from(json!({"power": 1234.5678, "count": 7}));

        let metrics = normalizer.normalize(&payload);

        assert_eq!(metrics.get("solax.power"), Some(&MetricValue::Float(1234.57)));
        // integers are untouched by precision
        assert_eq!(metrics.get("solax.count"), Some(&MetricValue::Int(7)));
    }

    #[test]
    fn test_precision_zero_demotes_to_int() {
        let config = MetricsConfig {
            decimal_precision: Some(0),
            ..MetricsConfig::default()
        };
        let normalizer = normalizer(config);
        let payload = payload_from(json!({"power": 1234.5678}));

        let metrics = normalizer.normalize(&payload);

        assert_eq!(metrics.get("solax.power"), Some(&MetricValue::Int(1235)));
    }

    #[test]
    fn test_normalize_is_idempotent_over_numeric_maps() {
        let normalizer = normalizer(MetricsConfig::default());
        let payload = payload_from(json!({"a": 1, "b": 2.5}));

        let first = normalizer.normalize(&payload);

        // re-encode the output as a raw payload under the same field names
        let mut second_input = RawPayload::new();
        second_input.insert("a".to_string(), json!(1));
        second_input.insert("b".to_string(), json!(2.5));
        let second = normalizer.normalize(&second_input);

        assert_eq!(first.get("solax.a"), second.get("solax.a"));
        assert_eq!(first.get("solax.b"), second.get("solax.b"));
    }

    #[test]
    fn test_encoding() {
        assert_eq!(MetricValue::Bool(true).encode(), "1");
        assert_eq!(MetricValue::Bool(false).encode(), "0");
        assert_eq!(MetricValue::Int(-12).encode(), "-12");
        assert_eq!(MetricValue::Float(87.5).encode(), "87.5");
    }
}
