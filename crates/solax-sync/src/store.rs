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

//! Latest-value metric persistence.
//!
//! Each metric key holds exactly one row; a sync run updates rows in place
//! and skips values that did not change, so `updated_at` doubles as a
//! staleness indicator for operators.

use crate::error::{Result, SyncError};
use crate::normalizer::MetricValue;
use chrono::Utc;
use rusqlite::params;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

/// Counts reported by one `store` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOutcome {
    pub written: usize,
    pub unchanged: usize,
}

impl StoreOutcome {
    pub fn total(&self) -> usize {
        self.written + self.unchanged
    }

    pub fn has_changes(&self) -> bool {
        self.written > 0
    }
}

#[derive(Debug)]
pub struct MetricStore {
    conn: Mutex<rusqlite::Connection>,
}

impl MetricStore {
    /// Open (or create) the metric database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Configuration(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = rusqlite::Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(rusqlite::Connection::open_in_memory()?)
    }

    fn from_connection(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS solax_metric (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                metric_key   TEXT NOT NULL UNIQUE,
                metric_value TEXT NOT NULL,
                updated_at   INTEGER NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist the metrics that changed since the last run. All writes of
    /// one call share a single transaction; a failure rolls everything
    /// back. An empty input returns `{0, 0}` without touching the database.
    pub fn store(&self, metrics: &BTreeMap<String, MetricValue>) -> Result<StoreOutcome> {
        if metrics.is_empty() {
            return Ok(StoreOutcome::default());
        }

        let encoded: Vec<(&str, String)> = metrics
            .iter()
            .map(|(key, value)| (key.as_str(), value.encode()))
            .collect();

        let mut conn = self.conn.lock().expect("metric store mutex poisoned");
        let existing = fetch_existing(&conn, &encoded)?;
        let timestamp = Utc::now().timestamp();

        let tx = conn.transaction()?;
        let mut written = 0usize;

        for (key, value) in &encoded {
            match existing.get(*key) {
                Some(current) if current == value => continue,
                Some(_) => {
                    tx.execute(
                        "UPDATE solax_metric SET metric_value = ?1, updated_at = ?2 WHERE metric_key = ?3",
                        params![value, timestamp, key],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO solax_metric (metric_key, metric_value, updated_at) VALUES (?1, ?2, ?3)",
                        params![key, value, timestamp],
                    )?;
                }
            }

            written += 1;
        }

        tx.commit()?;

        Ok(StoreOutcome {
            written,
            unchanged: encoded.len() - written,
        })
    }

    /// Read back a stored value, mostly for diagnostics and tests.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("metric store mutex poisoned");
        let value = conn
            .query_row(
                "SELECT metric_value FROM solax_metric WHERE metric_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        Ok(value)
    }

    /// Number of stored metric rows.
    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("metric store mutex poisoned");
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM solax_metric", [], |row| row.get(0))?;

        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Batched lookup of the current values for exactly the incoming keys.
fn fetch_existing(
    conn: &rusqlite::Connection,
    encoded: &[(&str, String)],
) -> Result<HashMap<String, String>> {
    let placeholders = vec!["?"; encoded.len()].join(", ");
    let sql = format!(
        "SELECT metric_key, metric_value FROM solax_metric WHERE metric_key IN ({placeholders})"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(encoded.iter().map(|(key, _)| *key)),
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;

    let mut existing = HashMap::with_capacity(encoded.len());
    for row in rows {
        let (key, value) = row?;
        existing.insert(key, value);
    }

    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(entries: &[(&str, MetricValue)]) -> BTreeMap<String, MetricValue> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), *value))
            .collect()
    }

    #[test]
    fn test_store_empty_is_a_noop() {
        let store = MetricStore::open_in_memory().unwrap();
        let outcome = store.store(&BTreeMap::new()).unwrap();

        assert_eq!(outcome, StoreOutcome::default());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_first_store_writes_everything() {
        let store = MetricStore::open_in_memory().unwrap();
        let input = metrics(&[
            ("solax.acpower", MetricValue::Int(1234)),
            ("solax.soc", MetricValue::Float(87.5)),
            ("solax.online", MetricValue::Bool(true)),
        ]);

        let outcome = store.store(&input).unwrap();

        assert_eq!(outcome.written, 3);
        assert_eq!(outcome.unchanged, 0);
        assert!(outcome.has_changes());
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn test_identical_second_store_writes_nothing() {
        let store = MetricStore::open_in_memory().unwrap();
        let input = metrics(&[
            ("solax.acpower", MetricValue::Int(1234)),
            ("solax.soc", MetricValue::Int(87)),
        ]);

        store.store(&input).unwrap();
        let second = store.store(&input).unwrap();

        assert_eq!(second.written, 0);
        assert_eq!(second.unchanged, 2);
        assert!(!second.has_changes());
    }

    #[test]
    fn test_changed_value_is_updated_in_place() {
        let store = MetricStore::open_in_memory().unwrap();

        store
            .store(&metrics(&[("solax.soc", MetricValue::Int(80))]))
            .unwrap();
        let outcome = store
            .store(&metrics(&[("solax.soc", MetricValue::Int(81))]))
            .unwrap();

        assert_eq!(outcome.written, 1);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("solax.soc").unwrap().as_deref(), Some("81"));
    }

    #[test]
    fn test_string_encoding_round_trip() {
        let store = MetricStore::open_in_memory().unwrap();
        let input = metrics(&[
            ("solax.online", MetricValue::Bool(true)),
            ("solax.offline", MetricValue::Bool(false)),
            ("solax.yield", MetricValue::Float(12.345)),
            ("solax.count", MetricValue::Int(-3)),
        ]);

        store.store(&input).unwrap();

        assert_eq!(store.get("solax.online").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("solax.offline").unwrap().as_deref(), Some("0"));
        assert_eq!(store.get("solax.yield").unwrap().as_deref(), Some("12.345"));
        assert_eq!(store.get("solax.count").unwrap().as_deref(), Some("-3"));
    }

    #[test]
    fn test_mixed_run_counts_written_and_unchanged() {
        let store = MetricStore::open_in_memory().unwrap();
        store
            .store(&metrics(&[
                ("solax.a", MetricValue::Int(1)),
                ("solax.b", MetricValue::Int(2)),
            ]))
            .unwrap();

        let outcome = store
            .store(&metrics(&[
                ("solax.a", MetricValue::Int(1)),
                ("solax.b", MetricValue::Int(99)),
                ("solax.c", MetricValue::Int(3)),
            ]))
            .unwrap();

        assert_eq!(outcome.written, 2);
        assert_eq!(outcome.unchanged, 1);
        assert_eq!(outcome.total(), 3);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/metrics.db");

        let store = MetricStore::open(&path).unwrap();
        store
            .store(&metrics(&[("solax.a", MetricValue::Int(1))]))
            .unwrap();

        assert!(path.exists());
    }
}
