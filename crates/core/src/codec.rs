// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical token codec.
//!
//! Everything entering the system goes through this module: wire JSON is
//! normalized (see [`crate::binary`]), decoded strictly into [`Token`], and
//! repaired explicitly with [`repair`] before anything is hashed or merged.
//! Encoding is the inverse and is stable, so equal content always produces
//! equal bytes.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::binary::{normalize_value, Hex};
use crate::error::{DecodeError, Error, Result};
use crate::outbox::{MintOutboxEntry, OutboxEntry};
use crate::snapshot::{InvalidEntry, InvalidReason, Nametag, SentEntry, Snapshot, SnapshotMeta, FORMAT_VERSION};
use crate::token::{Token, TokenState};

/// Computes state hashes for genesis-only tokens.
///
/// Implemented by the token validator, which owns the predicate scheme.
pub trait StateHasher: Send + Sync {
    fn state_hash(&self, token_id: &Hex, state: &TokenState) -> Hex;
}

/// Decodes a wire token.
///
/// Binary fields are normalized first. A missing or malformed field yields a
/// [`DecodeError`] naming it; callers treat that as a non-fatal invalid token.
pub fn decode_token(value: &Value) -> std::result::Result<Token, DecodeError> {
    let mut value = value.clone();
    let Value::Object(root) = &value else {
        return Err(DecodeError::NotAnObject);
    };
    require_fields(root)?;

    normalize_value(&mut value);
    serde_json::from_value(value)
        .map_err(|e| DecodeError::MalformedField { field: "token".to_string(), reason: e.to_string() })
}

fn require_fields(root: &Map<String, Value>) -> std::result::Result<(), DecodeError> {
    let genesis = object(root, "genesis")?;
    let data = object(genesis, "data")?;
    for field in ["tokenId", "tokenType", "salt", "recipient"] {
        if matches!(data.get(field), None | Some(Value::Null)) {
            return Err(DecodeError::MissingField(field));
        }
    }
    object(genesis, "inclusionProof")?;
    let state = object(root, "state")?;
    if matches!(state.get("predicate"), None | Some(Value::Null)) {
        return Err(DecodeError::MissingField("predicate"));
    }
    if let Some(txs) = root.get("transactions") {
        if !txs.is_array() && !txs.is_null() {
            return Err(DecodeError::MalformedField {
                field: "transactions".to_string(),
                reason: "expected an array".to_string(),
            });
        }
    }
    Ok(())
}

fn object<'a>(
    parent: &'a Map<String, Value>,
    field: &'static str,
) -> std::result::Result<&'a Map<String, Value>, DecodeError> {
    match parent.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(DecodeError::MalformedField {
            field: field.to_string(),
            reason: "expected an object".to_string(),
        }),
    }
}

/// Encodes a token into its canonical wire form.
pub fn encode_token(token: &Token) -> Value {
    serde_json::to_value(token).unwrap_or(Value::Null)
}

/// The current state hash, consulting `hasher` for genesis-only tokens that
/// have no cached value.
pub fn current_state_hash(token: &Token, hasher: &dyn StateHasher) -> Option<Hex> {
    match token.transactions.last() {
        Some(last) => last.new_state_hash.clone(),
        None => Some(
            token
                .integrity
                .current_state_hash
                .clone()
                .unwrap_or_else(|| hasher.state_hash(token.token_id(), &token.state)),
        ),
    }
}

/// One change made by [`repair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Patch {
    PreviousHash { index: usize },
    NewHash { index: usize },
    GenesisDataHash,
    CachedStateHash,
    ClearedStateHash,
}

/// What [`repair`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub patches: Vec<Patch>,
    /// The first transaction has no `previousStateHash` and the genesis proof
    /// carries no state hash to fill it from.
    pub unlinked_first_transaction: bool,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.patches.is_empty()
    }
}

/// Fills derivable gaps in a token. Running it twice changes nothing the
/// second time.
///
/// - missing `newStateHash` comes from the next transaction's
///   `previousStateHash`, or from `hasher` for the last transaction
/// - missing `previousStateHash` comes from the preceding `newStateHash`, or
///   the genesis state hash for the first transaction
/// - `genesisDataJSONHash` is recomputed from the genesis payload
/// - the cached current-state hash is kept only for genesis-only tokens
pub fn repair(token: &mut Token, hasher: &dyn StateHasher) -> RepairReport {
    let mut report = RepairReport::default();
    let token_id = token.token_id().clone();
    let count = token.transactions.len();

    for index in 0..count {
        if token.transactions[index].new_state_hash.is_some() {
            continue;
        }
        let derived = if index + 1 < count {
            token.transactions[index + 1].previous_state_hash.clone()
        } else {
            Some(hasher.state_hash(&token_id, &token.state))
        };
        if let Some(hash) = derived {
            token.transactions[index].new_state_hash = Some(hash);
            report.patches.push(Patch::NewHash { index });
        }
    }

    let genesis = token.genesis_state_hash().cloned();
    for index in 0..count {
        if token.transactions[index].previous_state_hash.is_some() {
            continue;
        }
        let derived = if index == 0 {
            genesis.clone()
        } else {
            token.transactions[index - 1].new_state_hash.clone()
        };
        match derived {
            Some(hash) => {
                token.transactions[index].previous_state_hash = Some(hash);
                report.patches.push(Patch::PreviousHash { index });
            }
            None if index == 0 => report.unlinked_first_transaction = true,
            None => {}
        }
    }

    let genesis_hash = token.compute_genesis_data_hash();
    if token.integrity.genesis_data_hash.as_ref() != Some(&genesis_hash) {
        token.integrity.genesis_data_hash = Some(genesis_hash);
        report.patches.push(Patch::GenesisDataHash);
    }

    if count == 0 {
        let hash = hasher.state_hash(&token_id, &token.state);
        if token.integrity.current_state_hash.as_ref() != Some(&hash) {
            token.integrity.current_state_hash = Some(hash);
            report.patches.push(Patch::CachedStateHash);
        }
    } else if token.integrity.current_state_hash.take().is_some() {
        report.patches.push(Patch::ClearedStateHash);
    }

    if report.unlinked_first_transaction {
        tracing::debug!(token_id = %token_id, "first transaction left unlinked");
    }
    report
}

/// Checks the state-hash link invariant of a token.
pub fn validate_chain(token: &Token) -> std::result::Result<(), crate::error::ChainError> {
    token.validate_chain()
}

/// Everything a snapshot carries except the active tokens and sent entries,
/// which are decoded one by one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotBody {
    meta: SnapshotMeta,
    #[serde(default)]
    nametag: Option<Nametag>,
    #[serde(default)]
    invalid: Vec<InvalidEntry>,
    #[serde(default)]
    outbox: Vec<OutboxEntry>,
    #[serde(default)]
    mint_outbox: Vec<MintOutboxEntry>,
}

/// Decodes a stored or fetched snapshot.
///
/// An unsupported `formatVersion` fails the whole decode. Active tokens and
/// sent entries that do not decode are moved to the invalid partition with
/// reason `MALFORMED`; their raw JSON is kept.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    decode_snapshot_at(bytes, Utc::now())
}

/// Like [`decode_snapshot`], stamping demoted tokens with `detected_at`.
pub fn decode_snapshot_at(bytes: &[u8], detected_at: DateTime<Utc>) -> Result<Snapshot> {
    let mut root: Value = serde_json::from_slice(bytes)?;
    let Value::Object(map) = &mut root else {
        return Err(Error::CorruptedData("snapshot is not a JSON object".to_string()));
    };

    let found = map
        .get("meta")
        .and_then(|m| m.get("formatVersion"))
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::CorruptedData("snapshot has no meta.formatVersion".to_string()))?;
    if found != u64::from(FORMAT_VERSION) {
        return Err(Error::UnsupportedFormat {
            found: u32::try_from(found).unwrap_or(u32::MAX),
            supported: FORMAT_VERSION,
        });
    }

    let active = map.remove("active").unwrap_or(Value::Null);
    let sent = map.remove("sent").unwrap_or(Value::Null);
    let body: SnapshotBody = serde_json::from_value(root)?;

    let mut snapshot = Snapshot {
        meta: body.meta,
        nametag: body.nametag,
        active: Default::default(),
        sent: Vec::new(),
        invalid: body.invalid,
        outbox: body.outbox,
        mint_outbox: body.mint_outbox,
    };

    if let Value::Object(tokens) = active {
        for (key, raw) in tokens {
            match decode_token(&raw) {
                Ok(token) => {
                    snapshot.active.insert(token.token_id().clone(), token);
                }
                Err(e) => {
                    tracing::warn!(token = %key, error = %e, "undecodable active token");
                    snapshot.add_invalid(InvalidEntry::from_raw(
                        raw,
                        InvalidReason::Malformed,
                        e.to_string(),
                        detected_at,
                    ));
                }
            }
        }
    }

    if let Value::Array(entries) = sent {
        for raw in entries {
            match decode_sent(&raw) {
                Ok(entry) => {
                    snapshot.add_sent(entry);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable sent entry");
                    let token = raw.get("token").cloned().unwrap_or(raw);
                    snapshot.add_invalid(InvalidEntry::from_raw(
                        token,
                        InvalidReason::Malformed,
                        e.to_string(),
                        detected_at,
                    ));
                }
            }
        }
    }

    snapshot.canonicalize();
    Ok(snapshot)
}

fn decode_sent(raw: &Value) -> std::result::Result<SentEntry, DecodeError> {
    let token = decode_token(raw.get("token").ok_or(DecodeError::MissingField("token"))?)?;
    let mut rest = raw.clone();
    if let Value::Object(map) = &mut rest {
        map.remove("token");
    }
    normalize_value(&mut rest);

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct SentFields {
        state_hash: Hex,
        spent_at: DateTime<Utc>,
    }
    let fields: SentFields = serde_json::from_value(rest)
        .map_err(|e| DecodeError::MalformedField { field: "sent".to_string(), reason: e.to_string() })?;
    Ok(SentEntry { token, state_hash: fields.state_hash, spent_at: fields.spent_at })
}

/// Encodes a snapshot into its canonical byte form.
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let mut canonical = snapshot.clone();
    canonical.canonicalize();
    Ok(serde_json::to_vec(&canonical)?)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
