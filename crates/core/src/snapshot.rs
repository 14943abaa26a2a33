// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Versioned inventory snapshot.
//!
//! A snapshot holds everything an owner has: active tokens, spent tokens
//! (tombstones), tokens that failed validation, and the two durable outboxes.
//! A token state `(tokenId, stateHash)` lives in exactly one of the active,
//! sent and invalid partitions; when it shows up in more than one, sent wins
//! over invalid, which wins over active.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::binary::Hex;
use crate::codec::encode_token;
use crate::outbox::{Lifecycle, MintOutboxEntry, OutboxEntry, OutboxStatus};
use crate::token::{sha256_json, Amount, Token};

/// Snapshot format written by this build. Anything else is rejected.
pub const FORMAT_VERSION: u32 = 2;

/// Identity of a token state: `(tokenId, stateHash)`.
pub type StateKey = (Hex, Hex);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub version: u64,
    pub address: String,
    pub pointer_name: String,
    /// Content id of the newest remote replica folded into this snapshot.
    #[serde(default)]
    pub last_cid: Option<String>,
    /// Content hash of the replica at `last_cid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_hash: Option<Hex>,
    pub format_version: u32,
}

/// Binding of a human-readable name to the owner's public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nametag {
    pub name: String,
    pub public_key: Hex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Value>,
}

/// A spent token state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEntry {
    pub token: Token,
    pub state_hash: Hex,
    pub spent_at: DateTime<Utc>,
}

impl SentEntry {
    pub fn key(&self) -> StateKey {
        (self.token.token_id().clone(), self.state_hash.clone())
    }
}

/// Why a token was moved out of the active partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    Malformed,
    BrokenChain,
    ValidationFailed,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Malformed => "MALFORMED",
            InvalidReason::BrokenChain => "BROKEN_CHAIN",
            InvalidReason::ValidationFailed => "VALIDATION_FAILED",
        }
    }
}

/// A token that failed decoding or validation. The raw JSON is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidEntry {
    #[serde(default)]
    pub token_id: Option<Hex>,
    #[serde(default)]
    pub state_hash: Option<Hex>,
    pub token: Value,
    pub reason: InvalidReason,
    #[serde(default)]
    pub detail: String,
    pub detected_at: DateTime<Utc>,
}

impl InvalidEntry {
    /// Builds an entry from raw JSON, recovering identifiers where possible.
    pub fn from_raw(token: Value, reason: InvalidReason, detail: String, detected_at: DateTime<Utc>) -> Self {
        let token_id = token
            .pointer("/genesis/data/tokenId")
            .and_then(|v| Hex::from_value(v).ok());
        let state_hash = token
            .get("transactions")
            .and_then(Value::as_array)
            .and_then(|txs| txs.last())
            .and_then(|tx| tx.get("newStateHash"))
            .and_then(|v| Hex::from_value(v).ok());
        InvalidEntry { token_id, state_hash, token, reason, detail, detected_at }
    }

    pub fn from_token(token: &Token, reason: InvalidReason, detail: String, detected_at: DateTime<Utc>) -> Self {
        InvalidEntry {
            token_id: Some(token.token_id().clone()),
            state_hash: token.current_state_hash().cloned(),
            token: encode_token(token),
            reason,
            detail,
            detected_at,
        }
    }

    /// Entries with unknown identifiers are keyed by the digest of their JSON.
    pub fn key(&self) -> StateKey {
        let token_id = self.token_id.clone().unwrap_or_default();
        let state_hash = self.state_hash.clone().unwrap_or_else(|| sha256_json(&self.token));
        (token_id, state_hash)
    }
}

/// Counts and balances for display and sync results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub active: usize,
    pub sent: usize,
    pub invalid: usize,
    pub outbox: usize,
    pub mint_outbox: usize,
    pub pending_replication: usize,
    pub failed: usize,
    pub balances: BTreeMap<Hex, Amount>,
}

/// Complete owner inventory at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    #[serde(default)]
    pub nametag: Option<Nametag>,
    #[serde(default)]
    pub active: BTreeMap<Hex, Token>,
    #[serde(default)]
    pub sent: Vec<SentEntry>,
    #[serde(default)]
    pub invalid: Vec<InvalidEntry>,
    #[serde(default)]
    pub outbox: Vec<OutboxEntry>,
    #[serde(default)]
    pub mint_outbox: Vec<MintOutboxEntry>,
}

impl Snapshot {
    /// An empty snapshot at version 0.
    pub fn new(address: impl Into<String>, pointer_name: impl Into<String>) -> Self {
        Snapshot {
            meta: SnapshotMeta {
                version: 0,
                address: address.into(),
                pointer_name: pointer_name.into(),
                last_cid: None,
                published_hash: None,
                format_version: FORMAT_VERSION,
            },
            nametag: None,
            active: BTreeMap::new(),
            sent: Vec::new(),
            invalid: Vec::new(),
            outbox: Vec::new(),
            mint_outbox: Vec::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.meta.version
    }

    /// Sorts and deduplicates the list partitions so equal content encodes
    /// to equal bytes. The first occurrence of a duplicate key is kept.
    pub fn canonicalize(&mut self) {
        let mut seen = BTreeSet::new();
        self.sent.retain(|e| seen.insert(e.key()));
        self.sent.sort_by_key(SentEntry::key);

        let mut seen = BTreeSet::new();
        self.invalid.retain(|e| seen.insert(e.key()));
        self.invalid.sort_by_key(InvalidEntry::key);

        let mut seen = BTreeSet::new();
        self.outbox.retain(|e| seen.insert(e.id.clone()));
        self.outbox.sort_by(|a, b| a.id.cmp(&b.id));

        let mut seen = BTreeSet::new();
        self.mint_outbox.retain(|e| seen.insert(e.id.clone()));
        self.mint_outbox.sort_by(|a, b| a.id.cmp(&b.id));
    }

    /// SHA-256 of the canonical encoding with `version`, `lastCid` and
    /// `publishedHash` blanked.
    ///
    /// Two snapshots with the same content hash hold the same inventory.
    pub fn content_hash(&self) -> Hex {
        let mut content = self.clone();
        content.meta.version = 0;
        content.meta.last_cid = None;
        content.meta.published_hash = None;
        content.canonicalize();
        sha256_json(&content)
    }

    pub fn sent_keys(&self) -> BTreeSet<StateKey> {
        self.sent.iter().map(SentEntry::key).collect()
    }

    pub fn invalid_keys(&self) -> BTreeSet<StateKey> {
        self.invalid.iter().map(InvalidEntry::key).collect()
    }

    /// Adds a tombstone unless one with the same key exists.
    pub fn add_sent(&mut self, entry: SentEntry) -> bool {
        let key = entry.key();
        if self.sent.iter().any(|e| e.key() == key) {
            return false;
        }
        self.sent.push(entry);
        true
    }

    pub fn add_invalid(&mut self, entry: InvalidEntry) -> bool {
        let key = entry.key();
        if self.invalid.iter().any(|e| e.key() == key) {
            return false;
        }
        self.invalid.push(entry);
        true
    }

    /// Moves an active token to the sent partition.
    pub fn move_to_sent(&mut self, token_id: &Hex, state_hash: Hex, spent_at: DateTime<Utc>) -> bool {
        match self.active.remove(token_id) {
            Some(token) => {
                self.add_sent(SentEntry { token, state_hash, spent_at });
                true
            }
            None => false,
        }
    }

    /// Moves an active token to the invalid partition.
    pub fn move_to_invalid(
        &mut self,
        token_id: &Hex,
        reason: InvalidReason,
        detail: impl Into<String>,
        detected_at: DateTime<Utc>,
    ) -> bool {
        match self.active.remove(token_id) {
            Some(token) => {
                self.add_invalid(InvalidEntry::from_token(&token, reason, detail.into(), detected_at));
                true
            }
            None => false,
        }
    }

    /// Removes active tokens whose current state is already recorded as sent
    /// or invalid. Returns the removed ids.
    pub fn enforce_exclusive_placement(&mut self) -> Vec<Hex> {
        let sent = self.sent_keys();
        let invalid = self.invalid_keys();
        let shadowed: Vec<Hex> = self
            .active
            .iter()
            .filter_map(|(id, token)| {
                let key = (id.clone(), token.current_state_hash()?.clone());
                (sent.contains(&key) || invalid.contains(&key)).then(|| id.clone())
            })
            .collect();
        for id in &shadowed {
            self.active.remove(id);
        }
        shadowed
    }

    /// Returns true if the token appears in any of the three token partitions.
    pub fn holds_token(&self, token_id: &Hex) -> bool {
        self.active.contains_key(token_id)
            || self.sent.iter().any(|e| e.token.token_id() == token_id)
            || self.invalid.iter().any(|e| e.token_id.as_ref() == Some(token_id))
    }

    pub fn stats(&self) -> InventoryStats {
        let mut balances: BTreeMap<Hex, Amount> = BTreeMap::new();
        for token in self.active.values() {
            for coin in &token.genesis.data.coin_data {
                let total = balances.entry(coin.coin_id.clone()).or_default();
                total.0 = total.0.saturating_add(coin.amount.0);
            }
        }
        let pending = self.outbox.iter().filter(|e| e.status() == OutboxStatus::PendingIpfsSync).count()
            + self.mint_outbox.iter().filter(|e| e.status() == OutboxStatus::PendingIpfsSync).count();
        let failed = self.outbox.iter().filter(|e| e.status() == OutboxStatus::Failed).count()
            + self.mint_outbox.iter().filter(|e| e.status() == OutboxStatus::Failed).count();
        InventoryStats {
            active: self.active.len(),
            sent: self.sent.len(),
            invalid: self.invalid.len(),
            outbox: self.outbox.len(),
            mint_outbox: self.mint_outbox.len(),
            pending_replication: pending,
            failed,
            balances,
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
