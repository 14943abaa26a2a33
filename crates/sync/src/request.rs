// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync request and result types.
//!
//! Both serialize as camelCase JSON so they can cross a process boundary
//! unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use purse_core::merge::TokenConflict;
use purse_core::snapshot::{InventoryStats, Nametag};
use purse_core::{CircuitBreakerState, Hex, MintOutboxEntry, OutboxEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A transfer the caller knows has finished; the token state moves to sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTransfer {
    pub token_id: Hex,
    pub state_hash: Hex,
    #[serde(default)]
    pub spent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncRequest {
    pub owner_address: String,
    pub owner_public_key: Hex,
    pub pointer_name: String,
    /// Skip the remote entirely.
    pub local: bool,
    /// Only read the nametag; writes nothing.
    pub nametag_only: bool,
    /// Raw wire tokens to import.
    pub incoming_tokens: Vec<Value>,
    pub outbox_entries: Vec<OutboxEntry>,
    pub mint_entries: Vec<MintOutboxEntry>,
    pub completed_transfers: Vec<CompletedTransfer>,
    pub nametag: Option<Nametag>,
}

impl SyncRequest {
    pub fn new(owner_address: impl Into<String>, owner_public_key: Hex, pointer_name: impl Into<String>) -> Self {
        SyncRequest {
            owner_address: owner_address.into(),
            owner_public_key,
            pointer_name: pointer_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Success,
    PartialSuccess,
    LocalOnly,
    NametagOnly,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncMode {
    Normal,
    Local,
    Nametag,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "SUCCESS",
            SyncStatus::PartialSuccess => "PARTIAL_SUCCESS",
            SyncStatus::LocalOnly => "LOCAL_ONLY",
            SyncStatus::NametagOnly => "NAMETAG_ONLY",
            SyncStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Normal => "NORMAL",
            SyncMode::Local => "LOCAL",
            SyncMode::Nametag => "NAMETAG",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RemoteUnavailable,
    PublishFailed,
    ValidatorUnavailable,
    DeliveryFailed,
    LocalStoreCorrupt,
    StaleWrite,
    StorageFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            ErrorCode::PublishFailed => "PUBLISH_FAILED",
            ErrorCode::ValidatorUnavailable => "VALIDATOR_UNAVAILABLE",
            ErrorCode::DeliveryFailed => "DELIVERY_FAILED",
            ErrorCode::LocalStoreCorrupt => "LOCAL_STORE_CORRUPT",
            ErrorCode::StaleWrite => "STALE_WRITE",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
        }
    }

    /// Codes that turn a normal sync into a partial success.
    pub fn degrades(&self) -> bool {
        matches!(
            self,
            ErrorCode::RemoteUnavailable
                | ErrorCode::PublishFailed
                | ErrorCode::ValidatorUnavailable
                | ErrorCode::DeliveryFailed
        )
    }

    /// Codes that discard the sync's result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCode::StaleWrite | ErrorCode::StorageFailed)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem met during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIssue {
    pub code: ErrorCode,
    pub message: String,
}

/// Counters for what a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    pub tokens_imported: usize,
    pub tokens_updated: usize,
    pub tokens_added: usize,
    pub tokens_removed: usize,
    pub tokens_repaired: usize,
    pub tokens_validated: usize,
    pub tokens_invalidated: usize,
    pub tokens_spent: usize,
    pub conflicts_resolved: usize,
    pub entries_upserted: usize,
    pub entries_rejected: usize,
    pub entries_promoted: usize,
    pub entries_delivered: usize,
    pub entries_cleaned: usize,
    pub boomerangs_removed: usize,
    pub mints_finalized: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub status: SyncStatus,
    pub mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Every problem met, in order; `errorCode` is the most severe.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<SyncIssue>,
    pub operation_stats: OperationStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_stats: Option<InventoryStats>,
    pub new_version: u64,
    pub publish_pending: bool,
    pub recovery_attempt: bool,
    pub circuit_breaker: CircuitBreakerState,
    #[serde(default)]
    pub conflicts: Vec<TokenConflict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nametag: Option<Nametag>,
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        !matches!(self.status, SyncStatus::Error)
    }

    pub fn has_issue(&self, code: ErrorCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
