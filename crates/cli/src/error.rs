// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// All possible errors that can occur in the purse CLI.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not initialized: no purse.toml found\n  hint: run 'purse init' or pass --config <path>")]
    NotInitialized,

    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("another sync is running for {owner}\n  hint: wait for it to finish and retry")]
    OwnerLocked { owner: String },

    #[error("no snapshot stored for {0}\n  hint: run 'purse sync' first")]
    NoSnapshot(String),

    #[error("invalid {field}: '{value}'\n  hint: expected an even-length hex string")]
    InvalidHex { field: &'static str, value: String },

    #[error("cannot import {path}: {reason}")]
    Import { path: String, reason: String },

    #[error("sync failed ({code}): {message}")]
    SyncFailed { code: String, message: String },

    #[error("{0}")]
    Core(#[from] purse_core::Error),

    #[error("{0}")]
    Engine(#[from] purse_sync::SyncError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
