// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for purse-core operations.

use thiserror::Error;

/// All possible errors that can occur in purse-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid outbox transition: cannot go from {from} to {to}\n  hint: from '{from}' you can go to: {valid_targets}")]
    InvalidTransition {
        from: String,
        to: String,
        valid_targets: String,
    },

    #[error("outbox entry {0} has not been replicated yet\n  hint: entries leave PENDING_IPFS_SYNC only after a verified publish")]
    NotReplicated(String),

    #[error("unknown outbox status: {0}")]
    InvalidStatus(String),

    #[error("outbox entry not found: {0}")]
    EntryNotFound(String),

    #[error("new outbox entry {id} must start in PENDING_IPFS_SYNC, got {status}")]
    EntryNotPending { id: String, status: String },

    #[error("malformed token: {0}")]
    Decode(#[from] DecodeError),

    #[error("broken state-hash chain: {0}")]
    Chain(#[from] ChainError),

    #[error("invalid hex value: {0}")]
    InvalidHex(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: {available} available, {required} required")]
    InsufficientBalance { available: u128, required: u128 },

    #[error("unsupported snapshot format version {found}\n  hint: this build reads format version {supported}")]
    UnsupportedFormat { found: u32, supported: u32 },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// Reasons a wire token fails the strict decode step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("token is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' is malformed: {reason}")]
    MalformedField { field: String, reason: String },
}

/// Violations of the state-hash link invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("transaction {index} has no previousStateHash")]
    MissingPreviousHash { index: usize },

    #[error("transaction {index} has no newStateHash")]
    MissingNewHash { index: usize },

    #[error("transaction {index} previousStateHash {found} does not match {expected}")]
    LinkMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("first transaction does not start from the genesis state {expected} (found {found})")]
    GenesisMismatch { expected: String, found: String },
}

/// A specialized Result type for purse-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
