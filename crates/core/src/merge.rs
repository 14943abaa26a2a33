// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic reconciliation of two snapshot replicas.
//!
//! Merge rules:
//! - the side with the higher `meta.version` is the base (ties go to local);
//!   the merged version is one past the larger of the two
//! - a token present on one side only is kept as-is
//! - a token present on both sides is decided by, in order: longer chain,
//!   more committed proofs, larger genesis payload hash, larger token digest,
//!   then the base side
//! - sent and invalid entries are unioned by `(tokenId, stateHash)`
//! - outbox entries are unioned by id, the more advanced copy winning
//! - the nametag prefers local
//!
//! The per-token outcome does not depend on argument order.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::binary::Hex;
use crate::outbox::{covers, merge_entries};
use crate::snapshot::{Snapshot, SnapshotMeta, FORMAT_VERSION};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }
}

/// The rule that decided between two variants of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionRule {
    LongerChain,
    MoreProofs,
    GenesisHash,
    ContentDigest,
    BaseFallback,
}

/// A token whose non-base variant won.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConflict {
    pub token_id: Hex,
    pub winner: Side,
    pub rule: ResolutionRule,
    pub local_chain_len: usize,
    pub remote_chain_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: Snapshot,
    pub base: Side,
    pub conflicts: Vec<TokenConflict>,
    /// Active ids present after the merge but not in local.
    pub added: Vec<Hex>,
    /// Active ids present in local but not after the merge.
    pub removed: Vec<Hex>,
}

/// Trait for reconciling a local replica with a remote one.
pub trait Merge {
    fn merge(&self, remote: &Self) -> MergeOutcome;
}

impl Merge for Snapshot {
    fn merge(&self, remote: &Self) -> MergeOutcome {
        resolve(self, remote)
    }
}

/// Decides between two variants of the same token.
///
/// Returns the winning side and the rule that decided. Identical variants
/// go to `base`.
pub fn pick_token(local: &Token, remote: &Token, base: Side) -> (Side, ResolutionRule) {
    if local == remote {
        return (base, ResolutionRule::BaseFallback);
    }
    let decide = |ordering: Ordering, rule| match ordering {
        Ordering::Greater => Some((Side::Local, rule)),
        Ordering::Less => Some((Side::Remote, rule)),
        Ordering::Equal => None,
    };
    decide(local.chain_len().cmp(&remote.chain_len()), ResolutionRule::LongerChain)
        .or_else(|| decide(local.committed_proofs().cmp(&remote.committed_proofs()), ResolutionRule::MoreProofs))
        .or_else(|| {
            decide(
                local.compute_genesis_data_hash().cmp(&remote.compute_genesis_data_hash()),
                ResolutionRule::GenesisHash,
            )
        })
        .or_else(|| decide(local.digest().cmp(&remote.digest()), ResolutionRule::ContentDigest))
        .unwrap_or((base, ResolutionRule::BaseFallback))
}

/// Merges `local` and `remote` into a new snapshot.
pub fn resolve(local: &Snapshot, remote: &Snapshot) -> MergeOutcome {
    let base_side = if remote.meta.version > local.meta.version { Side::Remote } else { Side::Local };
    let (base, other) = match base_side {
        Side::Local => (local, remote),
        Side::Remote => (remote, local),
    };

    let mut merged = Snapshot {
        meta: SnapshotMeta {
            version: local.meta.version.max(remote.meta.version) + 1,
            address: local.meta.address.clone(),
            pointer_name: local.meta.pointer_name.clone(),
            last_cid: base.meta.last_cid.clone(),
            published_hash: base.meta.published_hash.clone(),
            format_version: FORMAT_VERSION,
        },
        nametag: local.nametag.clone().or_else(|| remote.nametag.clone()),
        active: Default::default(),
        sent: base.sent.iter().chain(&other.sent).cloned().collect(),
        invalid: base.invalid.iter().chain(&other.invalid).cloned().collect(),
        outbox: merge_entries(&base.outbox, &other.outbox),
        mint_outbox: merge_entries(&base.mint_outbox, &other.mint_outbox),
    };

    let mut conflicts = Vec::new();
    let ids: BTreeSet<&Hex> = local.active.keys().chain(remote.active.keys()).collect();
    for id in ids {
        let token = match (local.active.get(id), remote.active.get(id)) {
            (Some(l), None) => l,
            (None, Some(r)) => r,
            (Some(l), Some(r)) => {
                let (winner, rule) = pick_token(l, r, base_side);
                if winner != base_side {
                    conflicts.push(TokenConflict {
                        token_id: id.clone(),
                        winner,
                        rule,
                        local_chain_len: l.chain_len(),
                        remote_chain_len: r.chain_len(),
                    });
                }
                match winner {
                    Side::Local => l,
                    Side::Remote => r,
                }
            }
            (None, None) => continue,
        };
        merged.active.insert(id.clone(), token.clone());
    }

    merged.canonicalize();
    merged.enforce_exclusive_placement();

    let added = merged.active.keys().filter(|id| !local.active.contains_key(*id)).cloned().collect();
    let removed = local.active.keys().filter(|id| !merged.active.contains_key(*id)).cloned().collect();

    if !conflicts.is_empty() {
        tracing::debug!(conflicts = conflicts.len(), base = ?base_side, "merge resolved conflicting tokens");
    }

    MergeOutcome { merged, base: base_side, conflicts, added, removed }
}

/// True if `remote` already contains everything in `local` and more, so it
/// can be adopted without a full merge.
pub fn is_remote_newer(local: &Snapshot, remote: &Snapshot) -> bool {
    dominates(remote, local)
}

/// True if `local` already contains everything in `remote` and more.
pub fn is_local_newer(local: &Snapshot, remote: &Snapshot) -> bool {
    dominates(local, remote)
}

fn dominates(newer: &Snapshot, older: &Snapshot) -> bool {
    if newer.meta.version <= older.meta.version {
        return false;
    }
    if newer.active.len() <= older.active.len() {
        return false;
    }
    let covers_tokens = older.active.iter().all(|(id, token)| {
        newer.active.get(id).is_some_and(|candidate| candidate.chain_len() >= token.chain_len())
    });
    if !covers_tokens {
        return false;
    }
    // a binding only the older side knows, or a different one, needs the
    // nametag rule of a full merge
    let covers_nametag = older.nametag.is_none() || older.nametag == newer.nametag;
    covers_nametag
        && older.sent_keys().is_subset(&newer.sent_keys())
        && older.invalid_keys().is_subset(&newer.invalid_keys())
        && covers(&newer.outbox, &older.outbox)
        && covers(&newer.mint_outbox, &older.mint_outbox)
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
