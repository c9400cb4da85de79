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

//! Error types for the sync crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid configuration. Raised before any network attempt.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The Solax cloud API could not be reached or reported a failure,
    /// after all retries were exhausted.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The response decoded but its shape was not recognized.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Metric persistence failed; the surrounding transaction is rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
