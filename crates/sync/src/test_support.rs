// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory collaborators and fixtures for the engine tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use purse_core::clock::ManualClock;
use purse_core::codec::{self, StateHasher};
use purse_core::outbox::{Commitment, DeliveryPath, OutboxEntry, OutboxStatus, TransferKind};
use purse_core::token::{sha256_json, Amount, TokenState};
use purse_core::{Database, Hex, Snapshot, SnapshotStore, Stored, Token};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::messaging::{Messaging, MessagingError};
use crate::progress::SyncProgress;
use crate::remote::{Published, RemoteError, RemoteResult, RemoteStore, Resolved};
use crate::validator::{SpentToken, TokenIssue, ValidationReport, Validator, ValidatorError};
use crate::{BoxFuture, SyncConfig, SyncEngine, SyncRequest};

pub const OWNER: &str = "owner-address";
pub const POINTER: &str = "owner-pointer";

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

pub fn hash(a: u8, b: u8) -> Hex {
    Hex::parse(&format!("{a:02x}{b:02x}").repeat(16)).unwrap()
}

pub fn token_id(id: u8) -> Hex {
    hash(0x1d, id)
}

pub fn coin() -> Hex {
    hash(0xc0, 0x01)
}

pub fn state_hash(id: u8, step: u8) -> Hex {
    hash(id, step)
}

pub fn owner_key() -> Hex {
    hash(0xaa, 0x01)
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, hour, 0, 0).unwrap()
}

/// Wire JSON for a token carrying `amount` of [`coin`] with `chain`
/// committed transactions.
pub fn token_json(id: u8, amount: u128, chain: u8) -> Value {
    let transactions: Vec<Value> = (0..chain)
        .map(|i| {
            json!({
                "data": {"recipient": format!("addr-{i}")},
                "previousStateHash": state_hash(id, i).to_string(),
                "newStateHash": state_hash(id, i + 1).to_string(),
                "predicate": hash(0xee, i).to_string(),
                "inclusionProof": {"merkleTreePath": {"steps": []}, "transactionHash": hash(0x7a, i).to_string()},
            })
        })
        .collect();
    json!({
        "version": "2.0",
        "genesis": {
            "data": {
                "tokenId": token_id(id).to_string(),
                "tokenType": hash(0x77, 0x01).to_string(),
                "coinData": [[coin().to_string(), amount.to_string()]],
                "salt": hash(0x5a, id).to_string(),
                "recipient": OWNER,
            },
            "inclusionProof": {
                "authenticator": {
                    "algorithm": "secp256k1",
                    "publicKey": owner_key().to_string(),
                    "signature": hash(0xbb, id).to_string(),
                    "stateHash": state_hash(id, 0).to_string(),
                },
                "merkleTreePath": {"steps": []},
            },
        },
        "state": {"predicate": hash(0xee, chain).to_string()},
        "transactions": transactions,
    })
}

/// A decoded token, already repaired the way a sync would repair it.
pub fn token(id: u8, amount: u128, chain: u8) -> Token {
    let mut token = codec::decode_token(&token_json(id, amount, chain)).unwrap();
    codec::repair(&mut token, &MockValidator::default());
    token
}

pub fn snapshot(version: u64, tokens: &[Token]) -> Snapshot {
    let mut snapshot = Snapshot::new(OWNER, POINTER);
    snapshot.meta.version = version;
    for token in tokens {
        snapshot.active.insert(token.token_id().clone(), token.clone());
    }
    snapshot
}

/// A transfer of token `source`, committed from `previous_state_hash`.
pub fn outbox_entry(id: &str, source: u8, previous_state_hash: Hex, delivery: DeliveryPath) -> OutboxEntry {
    OutboxEntry {
        id: id.to_string(),
        kind: TransferKind::DirectTransfer,
        status: OutboxStatus::PendingIpfsSync,
        delivery,
        source_token_id: token_id(source),
        source_token: None,
        recipient_address: "recipient-address".to_string(),
        recipient_public_key: Some(hash(0xab, 0x01)),
        coin_id: coin(),
        amount: Amount(100),
        salt: hash(0x5a, 0xff),
        commitment: Commitment {
            request_id: hash(0x0e, source),
            previous_state_hash,
            transaction_data: json!({"recipient": "recipient-address"}),
            authenticator: None,
        },
        split_group_id: None,
        created_at: at(1),
        updated_at: at(1),
        replicated_at: None,
        retry_count: 0,
        last_error: None,
        inclusion_proof: None,
        delivery_event_id: None,
    }
}

#[derive(Default)]
struct RemoteState {
    blobs: Vec<(String, Vec<u8>)>,
    pointers: HashMap<String, (String, u64)>,
    resolves: usize,
    publishes: usize,
    fail_resolve: bool,
    fail_publish: bool,
    unverified: bool,
}

/// Content-addressed store held in memory.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    fn store_blob(state: &mut RemoteState, bytes: Vec<u8>) -> String {
        if let Some((cid, _)) = state.blobs.iter().find(|(_, b)| *b == bytes) {
            return cid.clone();
        }
        let cid = format!("cid-{}", state.blobs.len() + 1);
        state.blobs.push((cid.clone(), bytes));
        cid
    }

    /// Points `pointer` at raw `bytes`.
    pub fn seed_bytes(&self, pointer: &str, bytes: Vec<u8>) -> String {
        let mut state = locked(&self.state);
        let cid = Self::store_blob(&mut state, bytes);
        let sequence = state.pointers.get(pointer).map_or(1, |(_, s)| s + 1);
        state.pointers.insert(pointer.to_string(), (cid.clone(), sequence));
        cid
    }

    pub fn seed(&self, snapshot: &Snapshot) -> String {
        self.seed_bytes(&snapshot.meta.pointer_name, codec::encode_snapshot(snapshot).unwrap())
    }

    /// The replica `pointer` currently points at.
    pub fn replica(&self, pointer: &str) -> Option<Snapshot> {
        let state = locked(&self.state);
        let (cid, _) = state.pointers.get(pointer)?;
        let (_, bytes) = state.blobs.iter().find(|(c, _)| c == cid)?;
        Some(codec::decode_snapshot(bytes).unwrap())
    }

    pub fn set_fail_resolve(&self, fail: bool) {
        locked(&self.state).fail_resolve = fail;
    }

    pub fn set_fail_publish(&self, fail: bool) {
        locked(&self.state).fail_publish = fail;
    }

    pub fn set_unverified(&self, unverified: bool) {
        locked(&self.state).unverified = unverified;
    }

    pub fn resolves(&self) -> usize {
        locked(&self.state).resolves
    }

    pub fn publishes(&self) -> usize {
        locked(&self.state).publishes
    }
}

impl RemoteStore for MemoryRemote {
    fn resolve<'a>(&'a self, pointer: &'a str) -> BoxFuture<'a, RemoteResult<Resolved>> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            state.resolves += 1;
            if state.fail_resolve {
                return Err(RemoteError::Unavailable("gateway down".to_string()));
            }
            let (cid, sequence) = state.pointers.get(pointer).cloned().ok_or_else(|| RemoteError::NotFound(pointer.to_string()))?;
            Ok(Resolved { cid, sequence, content: None })
        })
    }

    fn fetch<'a>(&'a self, cid: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>> {
        Box::pin(async move {
            let state = locked(&self.state);
            state
                .blobs
                .iter()
                .find(|(c, _)| c == cid)
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| RemoteError::NotFound(cid.to_string()))
        })
    }

    fn upload(&self, bytes: Vec<u8>) -> BoxFuture<'_, RemoteResult<String>> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            if state.fail_publish {
                return Err(RemoteError::Unavailable("gateway down".to_string()));
            }
            Ok(Self::store_blob(&mut state, bytes))
        })
    }

    fn publish<'a>(&'a self, pointer: &'a str, cid: &'a str) -> BoxFuture<'a, RemoteResult<Published>> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            if state.fail_publish {
                return Err(RemoteError::Unavailable("gateway down".to_string()));
            }
            state.publishes += 1;
            let sequence = state.pointers.get(pointer).map_or(1, |(_, s)| s + 1);
            if state.unverified {
                return Ok(Published { sequence, verified: false });
            }
            state.pointers.insert(pointer.to_string(), (cid.to_string(), sequence));
            Ok(Published { sequence, verified: true })
        })
    }
}

#[derive(Default)]
struct ValidatorState {
    rejected: HashMap<Hex, String>,
    spent: Vec<SpentToken>,
    unavailable: bool,
}

/// Accepts every token unless told otherwise.
#[derive(Clone, Default)]
pub struct MockValidator {
    state: Arc<Mutex<ValidatorState>>,
}

impl MockValidator {
    pub fn reject(&self, id: Hex, reason: &str) {
        locked(&self.state).rejected.insert(id, reason.to_string());
    }

    pub fn spend(&self, id: Hex, state_hash: Hex) {
        locked(&self.state).spent.push(SpentToken { token_id: id.clone(), state_hash, local_id: id });
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        locked(&self.state).unavailable = unavailable;
    }
}

impl StateHasher for MockValidator {
    fn state_hash(&self, token_id: &Hex, state: &TokenState) -> Hex {
        sha256_json(&(token_id, state))
    }
}

impl Validator for MockValidator {
    fn validate_all<'a>(&'a self, tokens: &'a [Token]) -> BoxFuture<'a, Result<ValidationReport, ValidatorError>> {
        Box::pin(async move {
            let state = locked(&self.state);
            if state.unavailable {
                return Err(ValidatorError::Unavailable("aggregator offline".to_string()));
            }
            let mut report = ValidationReport::default();
            for token in tokens {
                match state.rejected.get(token.token_id()) {
                    Some(reason) => report.issues.push(TokenIssue { token_id: token.token_id().clone(), reason: reason.clone() }),
                    None => report.valid_tokens.push(token.token_id().clone()),
                }
            }
            Ok(report)
        })
    }

    fn check_spent<'a>(
        &'a self,
        tokens: &'a [Token],
        _owner_key: &'a Hex,
    ) -> BoxFuture<'a, Result<Vec<SpentToken>, ValidatorError>> {
        Box::pin(async move {
            let state = locked(&self.state);
            if state.unavailable {
                return Err(ValidatorError::Unavailable("aggregator offline".to_string()));
            }
            Ok(state.spent.iter().filter(|s| tokens.iter().any(|t| t.token_id() == &s.local_id)).cloned().collect())
        })
    }
}

#[derive(Default)]
struct MessagingState {
    delivered: Vec<(Hex, Value)>,
    nametags: HashMap<String, Hex>,
    fail: bool,
}

#[derive(Clone, Default)]
pub struct MockMessaging {
    state: Arc<Mutex<MessagingState>>,
}

impl MockMessaging {
    pub fn delivered(&self) -> Vec<(Hex, Value)> {
        locked(&self.state).delivered.clone()
    }

    pub fn nametag(&self, name: &str) -> Option<Hex> {
        locked(&self.state).nametags.get(name).cloned()
    }

    pub fn bind(&self, name: &str, key: Hex) {
        locked(&self.state).nametags.insert(name.to_string(), key);
    }

    pub fn set_fail(&self, fail: bool) {
        locked(&self.state).fail = fail;
    }
}

impl Messaging for MockMessaging {
    fn deliver<'a>(&'a self, recipient: &'a Hex, payload: Value) -> BoxFuture<'a, Result<String, MessagingError>> {
        Box::pin(async move {
            let mut state = locked(&self.state);
            if state.fail {
                return Err(MessagingError::Unavailable("relay offline".to_string()));
            }
            state.delivered.push((recipient.clone(), payload));
            Ok(format!("event-{}", state.delivered.len()))
        })
    }

    fn resolve_nametag<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<Hex>, MessagingError>> {
        Box::pin(async move { Ok(locked(&self.state).nametags.get(name).cloned()) })
    }

    fn publish_nametag<'a>(&'a self, name: &'a str, key: &'a Hex) -> BoxFuture<'a, Result<(), MessagingError>> {
        Box::pin(async move {
            locked(&self.state).nametags.insert(name.to_string(), key.clone());
            Ok(())
        })
    }
}

/// An engine wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<dyn SnapshotStore>,
    pub remote: MemoryRemote,
    pub validator: MockValidator,
    pub messaging: MockMessaging,
    pub clock: Arc<ManualClock>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Arc::new(Database::open_in_memory().unwrap()), SyncConfig::default(), None)
    }

    pub fn with_store(store: Arc<dyn SnapshotStore>) -> Self {
        Self::build(store, SyncConfig::default(), None)
    }

    pub fn with_config(config: SyncConfig) -> Self {
        Self::build(Arc::new(Database::open_in_memory().unwrap()), config, None)
    }

    pub fn with_progress(sender: UnboundedSender<SyncProgress>) -> Self {
        Self::build(Arc::new(Database::open_in_memory().unwrap()), SyncConfig::default(), Some(sender))
    }

    fn build(store: Arc<dyn SnapshotStore>, config: SyncConfig, progress: Option<UnboundedSender<SyncProgress>>) -> Self {
        let remote = MemoryRemote::default();
        let validator = MockValidator::default();
        let messaging = MockMessaging::default();
        let clock = Arc::new(ManualClock::new(at(1)));
        let mut engine = SyncEngine::new(
            Arc::clone(&store),
            Arc::new(remote.clone()),
            Arc::new(validator.clone()),
            Arc::new(messaging.clone()),
            clock.clone(),
            config,
        );
        if let Some(sender) = progress {
            engine = engine.with_progress(sender);
        }
        Harness { store, remote, validator, messaging, clock, engine }
    }

    pub fn request(&self) -> SyncRequest {
        SyncRequest::new(OWNER, owner_key(), POINTER)
    }

    /// Writes `snapshot` as the stored row, whatever is there now.
    pub fn put(&self, snapshot: &Snapshot) {
        let expected = match self.store.load(OWNER).unwrap() {
            Stored::Found(s) => Some(s.meta.version),
            Stored::Corrupt { version, .. } => Some(version),
            Stored::Missing => None,
        };
        assert!(self.store.save_if_version(snapshot, expected).unwrap());
    }

    pub fn stored(&self) -> Snapshot {
        match self.store.load(OWNER).unwrap() {
            Stored::Found(snapshot) => snapshot,
            other => unreachable!("expected a stored snapshot, got {other:?}"),
        }
    }
}
