// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable log of in-flight transfers and mints.
//!
//! An outbox entry carries everything needed to rebuild its commitment
//! offline: the salt, the request id, the previous state hash and the
//! transaction data. The salt is random and exists nowhere else, so an entry
//! must not move past `PENDING_IPFS_SYNC` until a snapshot containing it has
//! been published to the remote replica. [`Lifecycle::advance`] enforces that
//! gate; only [`Lifecycle::mark_replicated`] opens it.
//!
//! Status machine:
//!
//! ```text
//! standard: PENDING_IPFS_SYNC -> READY_TO_SUBMIT -> SUBMITTED -> PROOF_RECEIVED -> NOSTR_SENT -> COMPLETED
//! instant:  PENDING_IPFS_SYNC -> READY_TO_SEND -> NOSTR_SENT -> COMPLETED
//! mint:     PENDING_IPFS_SYNC -> READY_TO_SUBMIT -> SUBMITTED -> PROOF_RECEIVED -> COMPLETED
//! ```
//!
//! Every non-terminal status may also move to `FAILED`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::binary::Hex;
use crate::error::{Error, Result};
use crate::snapshot::Snapshot;
use crate::token::{Amount, Authenticator, InclusionProof, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    PendingIpfsSync,
    ReadyToSubmit,
    Submitted,
    ProofReceived,
    ReadyToSend,
    NostrSent,
    Completed,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::PendingIpfsSync => "PENDING_IPFS_SYNC",
            OutboxStatus::ReadyToSubmit => "READY_TO_SUBMIT",
            OutboxStatus::Submitted => "SUBMITTED",
            OutboxStatus::ProofReceived => "PROOF_RECEIVED",
            OutboxStatus::ReadyToSend => "READY_TO_SEND",
            OutboxStatus::NostrSent => "NOSTR_SENT",
            OutboxStatus::Completed => "COMPLETED",
            OutboxStatus::Failed => "FAILED",
        }
    }

    /// How far along its path an entry is. Used to pick the more advanced
    /// copy when two replicas disagree.
    pub fn rank(&self) -> u8 {
        match self {
            OutboxStatus::PendingIpfsSync => 0,
            OutboxStatus::ReadyToSubmit | OutboxStatus::ReadyToSend => 1,
            OutboxStatus::Submitted => 2,
            OutboxStatus::ProofReceived => 3,
            OutboxStatus::NostrSent => 4,
            OutboxStatus::Failed => 5,
            OutboxStatus::Completed => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboxStatus::Completed | OutboxStatus::Failed)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "PENDING_IPFS_SYNC" => Ok(OutboxStatus::PendingIpfsSync),
            "READY_TO_SUBMIT" => Ok(OutboxStatus::ReadyToSubmit),
            "SUBMITTED" => Ok(OutboxStatus::Submitted),
            "PROOF_RECEIVED" => Ok(OutboxStatus::ProofReceived),
            "READY_TO_SEND" => Ok(OutboxStatus::ReadyToSend),
            "NOSTR_SENT" => Ok(OutboxStatus::NostrSent),
            "COMPLETED" => Ok(OutboxStatus::Completed),
            "FAILED" => Ok(OutboxStatus::Failed),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Which status machine an entry follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryPath {
    #[default]
    Standard,
    Instant,
    Mint,
}

impl DeliveryPath {
    /// Statuses reachable from `from` on this path.
    pub fn valid_targets(&self, from: OutboxStatus) -> &'static [OutboxStatus] {
        use OutboxStatus::*;
        match (self, from) {
            (_, Completed | Failed) => &[],
            (DeliveryPath::Standard | DeliveryPath::Mint, PendingIpfsSync) => &[ReadyToSubmit, Failed],
            (DeliveryPath::Standard | DeliveryPath::Mint, ReadyToSubmit) => &[Submitted, Failed],
            (DeliveryPath::Standard | DeliveryPath::Mint, Submitted) => &[ProofReceived, Failed],
            (DeliveryPath::Standard, ProofReceived) => &[NostrSent, Failed],
            (DeliveryPath::Mint, ProofReceived) => &[Completed, Failed],
            (DeliveryPath::Instant, PendingIpfsSync) => &[ReadyToSend, Failed],
            (DeliveryPath::Instant, ReadyToSend) => &[NostrSent, Failed],
            (DeliveryPath::Standard | DeliveryPath::Instant, NostrSent) => &[Completed, Failed],
            _ => &[Failed],
        }
    }

    /// The status an entry enters once its record is replicated.
    pub fn replication_target(&self) -> OutboxStatus {
        match self {
            DeliveryPath::Instant => OutboxStatus::ReadyToSend,
            DeliveryPath::Standard | DeliveryPath::Mint => OutboxStatus::ReadyToSubmit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferKind {
    #[default]
    DirectTransfer,
    SplitBurn,
    SplitTransfer,
}

/// Material needed to rebuild a transfer commitment without the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    pub request_id: Hex,
    pub previous_state_hash: Hex,
    #[serde(default)]
    pub transaction_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator: Option<Authenticator>,
}

/// An in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub id: String,
    #[serde(default)]
    pub kind: TransferKind,
    pub status: OutboxStatus,
    #[serde(default)]
    pub delivery: DeliveryPath,
    pub source_token_id: Hex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_token: Option<Token>,
    pub recipient_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_public_key: Option<Hex>,
    pub coin_id: Hex,
    pub amount: Amount,
    pub salt: Hex,
    pub commitment: Commitment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<InclusionProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_event_id: Option<String>,
}

impl OutboxEntry {
    /// Returns true when the entry is waiting to be handed to messaging.
    pub fn awaits_delivery(&self) -> bool {
        self.recipient_public_key.is_some()
            && match self.delivery {
                DeliveryPath::Standard => self.status == OutboxStatus::ProofReceived,
                DeliveryPath::Instant => self.status == OutboxStatus::ReadyToSend,
                DeliveryPath::Mint => false,
            }
    }

    /// The message sent to the recipient.
    pub fn delivery_payload(&self) -> Value {
        json!({
            "type": "token_transfer",
            "outboxId": self.id,
            "sourceTokenId": self.source_token_id,
            "token": self.source_token,
            "coinId": self.coin_id,
            "amount": self.amount,
            "salt": self.salt,
            "commitment": self.commitment,
            "inclusionProof": self.inclusion_proof,
            "recipientAddress": self.recipient_address,
        })
    }
}

/// An in-flight mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintOutboxEntry {
    pub id: String,
    pub status: OutboxStatus,
    pub token_id: Hex,
    pub token_type: Hex,
    pub coin_id: Hex,
    pub amount: Amount,
    pub salt: Hex,
    pub recipient_address: String,
    pub request_id: Hex,
    #[serde(default)]
    pub mint_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<InclusionProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted_token: Option<Token>,
}

/// Status handling shared by transfer and mint entries.
pub trait Lifecycle {
    fn id(&self) -> &str;
    fn status(&self) -> OutboxStatus;
    fn path(&self) -> DeliveryPath;
    fn updated_at(&self) -> DateTime<Utc>;
    fn replicated_at(&self) -> Option<DateTime<Utc>>;
    fn split_group_id(&self) -> Option<&str>;

    /// Sets the status and bumps `updatedAt` without any checks.
    fn stamp(&mut self, status: OutboxStatus, at: DateTime<Utc>);
    fn set_replicated(&mut self, at: DateTime<Utc>);
    fn attach_proof(&mut self, proof: InclusionProof);
    /// Records a failed attempt without changing status.
    fn note_error(&mut self, error: String, at: DateTime<Utc>);

    /// Moves to `to` if the path allows it.
    ///
    /// Leaving `PENDING_IPFS_SYNC` for anything but `FAILED` is refused with
    /// [`Error::NotReplicated`]; use [`Lifecycle::mark_replicated`].
    fn advance(&mut self, to: OutboxStatus, at: DateTime<Utc>) -> Result<()> {
        let from = self.status();
        if from == OutboxStatus::PendingIpfsSync && to != OutboxStatus::Failed {
            return Err(Error::NotReplicated(self.id().to_string()));
        }
        let targets = self.path().valid_targets(from);
        if !targets.contains(&to) {
            return Err(invalid_transition(from, to, targets));
        }
        self.stamp(to, at);
        Ok(())
    }

    /// Opens the durability gate. Returns true if the entry was pending.
    fn mark_replicated(&mut self, at: DateTime<Utc>) -> bool {
        if self.status() != OutboxStatus::PendingIpfsSync {
            return false;
        }
        let target = self.path().replication_target();
        self.set_replicated(at);
        self.stamp(target, at);
        true
    }

    fn fail(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<()>
    where
        Self: Sized,
    {
        self.advance(OutboxStatus::Failed, at)?;
        self.note_error(reason.into(), at);
        Ok(())
    }

    /// Returns a failed entry to where its path resumes: the replication
    /// target if its record was replicated, `PENDING_IPFS_SYNC` otherwise.
    fn retry_failed(&mut self, at: DateTime<Utc>) -> Result<OutboxStatus> {
        let target = match self.replicated_at() {
            Some(_) => self.path().replication_target(),
            None => OutboxStatus::PendingIpfsSync,
        };
        if self.status() != OutboxStatus::Failed {
            return Err(invalid_transition(self.status(), target, self.path().valid_targets(self.status())));
        }
        self.stamp(target, at);
        Ok(target)
    }
}

fn invalid_transition(from: OutboxStatus, to: OutboxStatus, targets: &[OutboxStatus]) -> Error {
    let valid_targets = if targets.is_empty() {
        "none (terminal)".to_string()
    } else {
        targets.iter().map(OutboxStatus::as_str).collect::<Vec<_>>().join(", ")
    };
    Error::InvalidTransition { from: from.to_string(), to: to.to_string(), valid_targets }
}

impl Lifecycle for OutboxEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> OutboxStatus {
        self.status
    }

    fn path(&self) -> DeliveryPath {
        match self.delivery {
            DeliveryPath::Instant => DeliveryPath::Instant,
            DeliveryPath::Standard | DeliveryPath::Mint => DeliveryPath::Standard,
        }
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn replicated_at(&self) -> Option<DateTime<Utc>> {
        self.replicated_at
    }

    fn split_group_id(&self) -> Option<&str> {
        self.split_group_id.as_deref()
    }

    fn stamp(&mut self, status: OutboxStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    fn set_replicated(&mut self, at: DateTime<Utc>) {
        self.replicated_at = Some(at);
    }

    fn attach_proof(&mut self, proof: InclusionProof) {
        self.inclusion_proof = Some(proof);
    }

    fn note_error(&mut self, error: String, at: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_error = Some(error);
        self.updated_at = at;
    }
}

impl Lifecycle for MintOutboxEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> OutboxStatus {
        self.status
    }

    fn path(&self) -> DeliveryPath {
        DeliveryPath::Mint
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn replicated_at(&self) -> Option<DateTime<Utc>> {
        self.replicated_at
    }

    fn split_group_id(&self) -> Option<&str> {
        self.split_group_id.as_deref()
    }

    fn stamp(&mut self, status: OutboxStatus, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }

    fn set_replicated(&mut self, at: DateTime<Utc>) {
        self.replicated_at = Some(at);
    }

    fn attach_proof(&mut self, proof: InclusionProof) {
        self.inclusion_proof = Some(proof);
    }

    fn note_error(&mut self, error: String, at: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_error = Some(error);
        self.updated_at = at;
    }
}

/// Result of [`upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
    Unchanged,
}

/// Applies an entry reported by the caller.
///
/// New ids must start in `PENDING_IPFS_SYNC`. A known id is replaced only by
/// a valid forward transition, or by the same status with a newer
/// `updatedAt`. Stale copies are ignored.
pub fn upsert<E: Lifecycle>(entries: &mut Vec<E>, incoming: E) -> Result<Upsert> {
    let Some(pos) = entries.iter().position(|e| e.id() == incoming.id()) else {
        if incoming.status() != OutboxStatus::PendingIpfsSync {
            return Err(Error::EntryNotPending {
                id: incoming.id().to_string(),
                status: incoming.status().to_string(),
            });
        }
        entries.push(incoming);
        return Ok(Upsert::Inserted);
    };

    let stored = &entries[pos];
    let (from, to) = (stored.status(), incoming.status());
    if from == to {
        if incoming.updated_at() > stored.updated_at() {
            entries[pos] = incoming;
            return Ok(Upsert::Replaced);
        }
        return Ok(Upsert::Unchanged);
    }
    if from == OutboxStatus::PendingIpfsSync && to != OutboxStatus::Failed {
        return Err(Error::NotReplicated(incoming.id().to_string()));
    }
    let targets = stored.path().valid_targets(from);
    if targets.contains(&to) {
        entries[pos] = incoming;
        return Ok(Upsert::Replaced);
    }
    if to.rank() < from.rank() {
        return Ok(Upsert::Unchanged);
    }
    Err(invalid_transition(from, to, targets))
}

/// Union of two entry lists by id. For an id on both sides the more advanced
/// status wins, then the later `updatedAt`, then `base`.
pub fn merge_entries<E: Lifecycle + Clone>(base: &[E], other: &[E]) -> Vec<E> {
    let mut merged: BTreeMap<String, E> = base.iter().map(|e| (e.id().to_string(), e.clone())).collect();
    for entry in other {
        match merged.get(entry.id()) {
            None => {
                merged.insert(entry.id().to_string(), entry.clone());
            }
            Some(current) => {
                if is_ahead(entry, current) {
                    merged.insert(entry.id().to_string(), entry.clone());
                }
            }
        }
    }
    merged.into_values().collect()
}

/// True if merging `other` into `base` would keep every entry of `base`:
/// each entry of `other` exists in `base` and is not ahead of that copy.
pub fn covers<E: Lifecycle>(base: &[E], other: &[E]) -> bool {
    other
        .iter()
        .all(|entry| base.iter().any(|current| current.id() == entry.id() && !is_ahead(entry, current)))
}

fn is_ahead<E: Lifecycle>(entry: &E, current: &E) -> bool {
    (entry.status().rank(), entry.updated_at()) > (current.status().rank(), current.updated_at())
}

/// Promotes every pending entry after a verified publish. Returns the number
/// promoted.
pub fn mark_replicated(snapshot: &mut Snapshot, at: DateTime<Utc>) -> usize {
    let transfers = snapshot.outbox.iter_mut().map(|e| e.mark_replicated(at)).filter(|promoted| *promoted).count();
    let mints = snapshot.mint_outbox.iter_mut().map(|e| e.mark_replicated(at)).filter(|promoted| *promoted).count();
    transfers + mints
}

/// Drops transfers whose source token came back with a different state.
///
/// If the source token is active again and its current state hash differs
/// from the state the entry was committing from, the transfer completed by
/// another path and must not be resubmitted. Failed entries are left alone.
/// Returns the removed ids.
pub fn reconcile_boomerangs(snapshot: &mut Snapshot) -> Vec<String> {
    let mut removed = Vec::new();
    let active = &snapshot.active;
    snapshot.outbox.retain(|entry| {
        if entry.status == OutboxStatus::Failed {
            return true;
        }
        let Some(current) = active.get(&entry.source_token_id).and_then(Token::current_state_hash) else {
            return true;
        };
        if current == &entry.commitment.previous_state_hash {
            return true;
        }
        tracing::info!(
            entry = %entry.id,
            token_id = %entry.source_token_id,
            "source token returned with a new state, dropping outbox entry"
        );
        removed.push(entry.id.clone());
        false
    });
    removed
}

/// Completes mints whose proof arrived together with the minted token. The
/// token is added to the active partition unless the snapshot already holds
/// it. Returns the finalized ids.
pub fn finalize_mints(snapshot: &mut Snapshot, at: DateTime<Utc>) -> Result<Vec<String>> {
    let mut finalized = Vec::new();
    let mut minted = Vec::new();
    for entry in &mut snapshot.mint_outbox {
        if entry.status != OutboxStatus::ProofReceived {
            continue;
        }
        let Some(token) = entry.minted_token.clone() else {
            continue;
        };
        entry.advance(OutboxStatus::Completed, at)?;
        finalized.push(entry.id.clone());
        minted.push(token);
    }
    for token in minted {
        if !snapshot.holds_token(token.token_id()) {
            snapshot.active.insert(token.token_id().clone(), token);
        }
    }
    Ok(finalized)
}

/// Removes completed entries. Failed entries stay until retried.
pub fn cleanup_completed(snapshot: &mut Snapshot) -> usize {
    let before = snapshot.outbox.len() + snapshot.mint_outbox.len();
    snapshot.outbox.retain(|e| e.status != OutboxStatus::Completed);
    snapshot.mint_outbox.retain(|e| e.status != OutboxStatus::Completed);
    before - snapshot.outbox.len() - snapshot.mint_outbox.len()
}

/// Status counts of one split group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
}

impl GroupProgress {
    fn record(&mut self, status: OutboxStatus) {
        self.total += 1;
        match status {
            OutboxStatus::Completed => self.completed += 1,
            OutboxStatus::Failed => self.failed += 1,
            _ => self.pending += 1,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.pending == 0
    }
}

/// Progress of every split group across both outboxes.
pub fn split_groups(snapshot: &Snapshot) -> BTreeMap<String, GroupProgress> {
    let mut groups: BTreeMap<String, GroupProgress> = BTreeMap::new();
    let statuses = snapshot
        .outbox
        .iter()
        .map(|e| (e.split_group_id(), e.status()))
        .chain(snapshot.mint_outbox.iter().map(|e| (e.split_group_id(), e.status())));
    for (group, status) in statuses {
        if let Some(group) = group {
            groups.entry(group.to_string()).or_default().record(status);
        }
    }
    groups
}

/// Applies an externally observed status change to the entry with `id` in
/// either outbox, attaching `proof` when given.
pub fn apply_status(
    snapshot: &mut Snapshot,
    id: &str,
    status: OutboxStatus,
    proof: Option<InclusionProof>,
    at: DateTime<Utc>,
) -> Result<()> {
    if let Some(entry) = snapshot.outbox.iter_mut().find(|e| e.id == id) {
        entry.advance(status, at)?;
        if let Some(proof) = proof {
            entry.attach_proof(proof);
        }
        return Ok(());
    }
    if let Some(entry) = snapshot.mint_outbox.iter_mut().find(|e| e.id == id) {
        entry.advance(status, at)?;
        if let Some(proof) = proof {
            entry.attach_proof(proof);
        }
        return Ok(());
    }
    Err(Error::EntryNotFound(id.to_string()))
}

/// Retries the failed entry with `id` in either outbox.
pub fn retry(snapshot: &mut Snapshot, id: &str, at: DateTime<Utc>) -> Result<OutboxStatus> {
    if let Some(entry) = snapshot.outbox.iter_mut().find(|e| e.id == id) {
        return entry.retry_failed(at);
    }
    if let Some(entry) = snapshot.mint_outbox.iter_mut().find(|e| e.id == id) {
        return entry.retry_failed(at);
    }
    Err(Error::EntryNotFound(id.to_string()))
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
