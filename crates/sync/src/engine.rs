// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The sync orchestrator.
//!
//! A sync for one owner runs as a single unit of work:
//!
//! 1. take the owner lock and load the local snapshot
//! 2. fold in the remote replica (normal mode only)
//! 3. apply the caller's inputs
//! 4. repair, chain-check and validate every active token
//! 5. move spent tokens to sent (normal mode only)
//! 6. enforce placement, drop boomerangs, finalize mints
//! 7. deliver proved transfers and check the nametag (normal mode only)
//! 8. clean up completed entries
//! 9. settle the version
//! 10. publish, then promote replicated outbox entries
//! 11. persist with a compare-and-swap on the loaded version
//! 12. report
//!
//! Failures never escape [`SyncEngine::sync`]; they are reported through the
//! result's status and error code.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use purse_core::codec::{self, StateHasher};
use purse_core::merge::{self, pick_token, Merge, TokenConflict};
use purse_core::outbox::{self, Lifecycle, Upsert};
use purse_core::snapshot::{InvalidEntry, InvalidReason, Nametag};
use purse_core::split::{self, SplitPlan};
use purse_core::token::{InclusionProof, TokenState};
use purse_core::{
    CircuitBreaker, CircuitBreakerState, ClockSource, Hex, OutboxStatus, Side, Snapshot, SnapshotStore, Stored, Token,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::SyncConfig;
use crate::messaging::Messaging;
use crate::progress::SyncProgress;
use crate::remote::{RemoteError, RemoteStore};
use crate::request::{ErrorCode, OperationStats, SyncIssue, SyncMode, SyncRequest, SyncResult, SyncStatus};
use crate::validator::Validator;

/// Errors from the engine's single-purpose operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] purse_core::Error),

    #[error("no snapshot stored for {0}\n  hint: run a sync first")]
    OwnerNotFound(String),

    #[error("stored snapshot for {owner} is corrupt: {reason}\n  hint: a sync quarantines it and starts over")]
    CorruptStore { owner: String, reason: String },

    #[error("snapshot for {0} changed concurrently, try again")]
    StaleWrite(String),
}

/// What the remote pointer holds, as far as this sync knows.
#[derive(Debug)]
struct RemoteView {
    cid: String,
    /// Content hash of the replica; unknown when a skipped fetch left no
    /// record of it.
    hash: Option<Hex>,
    /// Version of the replica when it was fetched this sync.
    version: Option<u64>,
}

/// Outcome of folding in the remote replica.
struct RemoteStep {
    snapshot: Snapshot,
    view: Option<RemoteView>,
    /// False when the remote could not be read; publishing is suppressed.
    reachable: bool,
}

/// Bookkeeping for one sync.
struct Run {
    mode: SyncMode,
    recovery: bool,
    stats: OperationStats,
    issues: Vec<SyncIssue>,
    conflicts: Vec<TokenConflict>,
    publish_pending: bool,
    version: u64,
    last_cid: Option<String>,
    snapshot: Option<Snapshot>,
    nametag: Option<Nametag>,
}

impl Run {
    fn new(mode: SyncMode, recovery: bool) -> Self {
        Run {
            mode,
            recovery,
            stats: OperationStats::default(),
            issues: Vec::new(),
            conflicts: Vec::new(),
            publish_pending: false,
            version: 0,
            last_cid: None,
            snapshot: None,
            nametag: None,
        }
    }

    fn issue(&mut self, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(?code, %message, "sync issue");
        self.issues.push(SyncIssue { code, message });
    }

    fn status(&self) -> SyncStatus {
        if self.issues.iter().any(|i| i.code.is_fatal()) {
            return SyncStatus::Error;
        }
        match self.mode {
            SyncMode::Nametag => SyncStatus::NametagOnly,
            SyncMode::Local => SyncStatus::LocalOnly,
            SyncMode::Normal if self.issues.iter().any(|i| i.code.degrades()) => SyncStatus::PartialSuccess,
            SyncMode::Normal => SyncStatus::Success,
        }
    }

    /// The issue reported as the result's error: fatal first, then
    /// degrading, then anything else.
    fn headline(&self) -> Option<&SyncIssue> {
        self.issues
            .iter()
            .find(|i| i.code.is_fatal())
            .or_else(|| self.issues.iter().find(|i| i.code.degrades()))
            .or_else(|| self.issues.first())
    }

    fn into_result(self, circuit_breaker: CircuitBreakerState) -> SyncResult {
        let status = self.status();
        let headline = self.headline().cloned();
        let inventory_stats = match status {
            SyncStatus::Error => None,
            _ => self.snapshot.as_ref().map(Snapshot::stats),
        };
        let nametag = self.nametag.or_else(|| self.snapshot.and_then(|s| s.nametag));
        SyncResult {
            status,
            mode: self.mode,
            error_code: headline.as_ref().map(|i| i.code),
            error_message: headline.map(|i| i.message),
            issues: self.issues,
            operation_stats: self.stats,
            inventory_stats,
            new_version: self.version,
            publish_pending: self.publish_pending,
            recovery_attempt: self.recovery,
            circuit_breaker,
            conflicts: self.conflicts,
            last_cid: self.last_cid,
            nametag,
        }
    }
}

/// Adapts the validator to the codec's hasher seam.
struct ValidatorHasher<'a>(&'a dyn Validator);

impl StateHasher for ValidatorHasher<'_> {
    fn state_hash(&self, token_id: &Hex, state: &TokenState) -> Hex {
        self.0.state_hash(token_id, state)
    }
}

/// Chooses the version of the synced snapshot.
///
/// Content equal to the remote replica adopts its version, content equal to
/// what was loaded keeps the loaded version, anything else moves one past
/// both.
fn next_version(hash: &Hex, loaded_hash: &Hex, loaded_version: u64, remote: Option<&RemoteView>) -> u64 {
    let remote_version = remote.and_then(|r| r.version);
    if let (Some(r), Some(version)) = (remote, remote_version) {
        if r.hash.as_ref() == Some(hash) && version >= loaded_version {
            return version;
        }
    }
    if hash == loaded_hash {
        return loaded_version;
    }
    loaded_version.max(remote_version.unwrap_or(0)) + 1
}

/// Orchestrates syncs for any number of owners.
pub struct SyncEngine {
    store: Arc<dyn SnapshotStore>,
    remote: Arc<dyn RemoteStore>,
    validator: Arc<dyn Validator>,
    messaging: Arc<dyn Messaging>,
    clock: Arc<dyn ClockSource>,
    config: SyncConfig,
    breaker: Mutex<CircuitBreaker>,
    owner_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    progress: Option<UnboundedSender<SyncProgress>>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        remote: Arc<dyn RemoteStore>,
        validator: Arc<dyn Validator>,
        messaging: Arc<dyn Messaging>,
        clock: Arc<dyn ClockSource>,
        config: SyncConfig,
    ) -> Self {
        let breaker = CircuitBreaker::new(config.breaker);
        SyncEngine {
            store,
            remote,
            validator,
            messaging,
            clock,
            config,
            breaker: Mutex::new(breaker),
            owner_locks: Mutex::new(HashMap::new()),
            progress: None,
        }
    }

    /// Sends progress events to `sender` for every subsequent sync.
    pub fn with_progress(mut self, sender: UnboundedSender<SyncProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn breaker_state(&self) -> CircuitBreakerState {
        self.breaker().state().clone()
    }

    /// Restores breaker memory saved by an earlier session.
    pub fn restore_breaker(&self, state: CircuitBreakerState) {
        *self.breaker() = CircuitBreaker::with_state(self.config.breaker, state);
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn owner_lock(&self, owner: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.owner_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(owner.to_string()).or_default())
    }

    fn emit(&self, event: SyncProgress) {
        if let Some(sender) = &self.progress {
            let _ = sender.send(event);
        }
    }

    fn record_remote_failure(&self, now: DateTime<Utc>) {
        if let Some(trip) = self.breaker().record_remote_failure(now) {
            tracing::warn!(?trip, "remote failures tripped the circuit breaker");
        }
    }

    /// Picks the mode for a request. The flag is true when the sync is a
    /// recovery attempt out of LOCAL mode.
    fn select_mode(&self, request: &SyncRequest, now: DateTime<Utc>) -> (SyncMode, bool) {
        if request.nametag_only {
            return (SyncMode::Nametag, false);
        }
        if request.local {
            return (SyncMode::Local, false);
        }
        let breaker = self.breaker();
        match (breaker.is_local_mode(), breaker.recovery_due(now)) {
            (false, _) => (SyncMode::Normal, false),
            (true, true) => (SyncMode::Normal, true),
            (true, false) => (SyncMode::Local, false),
        }
    }

    /// Runs one sync.
    pub async fn sync(&self, request: SyncRequest) -> SyncResult {
        let now = self.clock.now();
        let (mode, recovery) = self.select_mode(&request, now);
        tracing::info!(owner = %request.owner_address, ?mode, recovery, "sync started");
        self.emit(SyncProgress::Started { owner: request.owner_address.clone(), mode });

        let run = match mode {
            SyncMode::Nametag => self.sync_nametag(&request, now).await,
            SyncMode::Normal | SyncMode::Local => {
                let lock = self.owner_lock(&request.owner_address);
                let _guard = lock.lock().await;
                self.sync_inventory(&request, Run::new(mode, recovery), now).await
            }
        };

        let result = run.into_result(self.breaker_state());
        tracing::info!(
            owner = %request.owner_address,
            status = ?result.status,
            version = result.new_version,
            conflicts = result.conflicts.len(),
            "sync finished"
        );
        self.emit(SyncProgress::Finished { status: result.status, version: result.new_version });
        result
    }

    /// Reads the nametag without locking or writing anything.
    async fn sync_nametag(&self, request: &SyncRequest, now: DateTime<Utc>) -> Run {
        let mut run = Run::new(SyncMode::Nametag, false);
        let degraded = {
            let breaker = self.breaker();
            breaker.is_local_mode() && !breaker.recovery_due(now)
        };

        let mut from_remote = false;
        if !degraded {
            match self.fetch_remote(&request.pointer_name, now).await {
                Ok(Some((cid, snapshot))) => {
                    run.nametag = snapshot.nametag;
                    run.version = snapshot.meta.version;
                    run.last_cid = Some(cid);
                    from_remote = true;
                }
                Ok(None) => {}
                Err(message) => run.issue(ErrorCode::RemoteUnavailable, message),
            }
        }
        if !from_remote {
            match self.store.load(&request.owner_address) {
                Ok(Stored::Found(snapshot)) => {
                    run.version = snapshot.meta.version;
                    run.nametag = snapshot.nametag;
                }
                Ok(Stored::Missing) => {}
                Ok(Stored::Corrupt { reason, .. }) => run.issue(ErrorCode::LocalStoreCorrupt, reason),
                Err(e) => tracing::warn!(error = %e, "could not read local nametag"),
            }
        }
        run
    }

    /// Resolves and fetches the replica behind `pointer`. `Ok(None)` means
    /// nothing was ever published there.
    async fn fetch_remote(&self, pointer: &str, now: DateTime<Utc>) -> Result<Option<(String, Snapshot)>, String> {
        let resolved = match self.remote.resolve(pointer).await {
            Ok(resolved) => resolved,
            Err(RemoteError::NotFound(_)) => {
                self.breaker().record_remote_success();
                return Ok(None);
            }
            Err(e) => {
                self.record_remote_failure(now);
                return Err(format!("resolving {pointer}: {e}"));
            }
        };
        let bytes = match resolved.content {
            Some(bytes) => bytes,
            None => match self.remote.fetch(&resolved.cid).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.record_remote_failure(now);
                    return Err(format!("fetching {}: {e}", resolved.cid));
                }
            },
        };
        self.breaker().record_remote_success();
        let snapshot = codec::decode_snapshot_at(&bytes, now)
            .map_err(|e| format!("remote replica {} does not decode: {e}", resolved.cid))?;
        Ok(Some((resolved.cid, snapshot)))
    }

    async fn sync_inventory(&self, request: &SyncRequest, mut run: Run, now: DateTime<Utc>) -> Run {
        let owner = request.owner_address.as_str();

        // 1. load
        let (loaded, expected) = match self.store.load(owner) {
            Ok(Stored::Found(snapshot)) => {
                let version = snapshot.meta.version;
                (Some(snapshot), Some(version))
            }
            Ok(Stored::Missing) => (None, None),
            Ok(Stored::Corrupt { version, reason }) => {
                run.issue(ErrorCode::LocalStoreCorrupt, format!("stored snapshot v{version} is corrupt: {reason}"));
                if let Err(e) = self.store.quarantine(owner, &reason) {
                    run.issue(ErrorCode::StorageFailed, format!("quarantining corrupt snapshot: {e}"));
                    return run;
                }
                (None, None)
            }
            Err(e) => {
                run.issue(ErrorCode::StorageFailed, format!("loading snapshot: {e}"));
                return run;
            }
        };
        let mut local = loaded.clone().unwrap_or_else(|| Snapshot::new(owner, request.pointer_name.clone()));
        if !request.pointer_name.is_empty() {
            local.meta.pointer_name = request.pointer_name.clone();
        }
        let loaded_version = local.meta.version;
        let loaded_hash = loaded.as_ref().map(Snapshot::content_hash).unwrap_or_else(|| local.content_hash());
        run.version = loaded_version;
        self.emit(SyncProgress::LocalLoaded { version: loaded_version, tokens: local.active.len() });

        // 2. remote
        let step = match run.mode {
            SyncMode::Normal => self.reconcile_remote(local, &mut run, now).await,
            _ => RemoteStep { snapshot: local, view: None, reachable: false },
        };
        let RemoteStep { snapshot: mut working, view, reachable } = step;

        // 3. caller inputs
        self.apply_request(&mut working, request, &mut run, now);

        // 4. repair and validate
        self.validate(&mut working, &mut run, now).await;

        // 5. spent check
        if run.mode == SyncMode::Normal {
            self.check_spent(&mut working, &request.owner_public_key, &mut run, now).await;
        }

        // 6. placement and recovery
        run.stats.tokens_removed += working.enforce_exclusive_placement().len();
        run.stats.boomerangs_removed = outbox::reconcile_boomerangs(&mut working).len();
        match outbox::finalize_mints(&mut working, now) {
            Ok(finalized) => run.stats.mints_finalized = finalized.len(),
            Err(e) => tracing::warn!(error = %e, "mint finalization stopped early"),
        }

        // 7. delivery
        if run.mode == SyncMode::Normal {
            self.deliver(&mut working, &mut run, now).await;
            self.check_nametag(&working).await;
        }

        // 8. cleanup
        run.stats.entries_cleaned = outbox::cleanup_completed(&mut working);

        // 9. version
        working.canonicalize();
        let hash = working.content_hash();
        working.meta.version = next_version(&hash, &loaded_hash, loaded_version, view.as_ref());

        // 10. publish
        let known_remote = match &view {
            Some(view) => view.hash.clone(),
            None => working.meta.published_hash.clone(),
        };
        let differs = known_remote.as_ref() != Some(&hash);
        match run.mode {
            SyncMode::Normal if reachable && differs => self.publish(&mut working, &hash, &mut run, now).await,
            _ => run.publish_pending = differs,
        }

        // 11. persist
        if loaded.as_ref() != Some(&working) {
            match self.store.save_if_version(&working, expected) {
                Ok(true) => {}
                Ok(false) => {
                    run.issue(ErrorCode::StaleWrite, format!("snapshot for {owner} changed during the sync"));
                    return run;
                }
                Err(e) => {
                    run.issue(ErrorCode::StorageFailed, format!("saving snapshot: {e}"));
                    return run;
                }
            }
        }

        // 12. report
        run.version = working.meta.version;
        run.last_cid = working.meta.last_cid.clone();
        run.snapshot = Some(working);
        run
    }

    async fn reconcile_remote(&self, local: Snapshot, run: &mut Run, now: DateTime<Utc>) -> RemoteStep {
        let pointer = local.meta.pointer_name.clone();
        let resolved = match self.remote.resolve(&pointer).await {
            Ok(resolved) => resolved,
            Err(RemoteError::NotFound(_)) => {
                self.breaker().record_remote_success();
                tracing::info!(%pointer, "no remote replica yet");
                return RemoteStep { snapshot: local, view: None, reachable: true };
            }
            Err(e) => {
                self.record_remote_failure(now);
                run.issue(ErrorCode::RemoteUnavailable, format!("resolving {pointer}: {e}"));
                return RemoteStep { snapshot: local, view: None, reachable: false };
            }
        };

        if local.meta.last_cid.as_deref() == Some(resolved.cid.as_str()) {
            self.breaker().record_remote_success();
            tracing::debug!(cid = %resolved.cid, "remote unchanged since last sync");
            let view = RemoteView { cid: resolved.cid, hash: local.meta.published_hash.clone(), version: None };
            return RemoteStep { snapshot: local, view: Some(view), reachable: true };
        }

        let bytes = match resolved.content {
            Some(bytes) => bytes,
            None => match self.remote.fetch(&resolved.cid).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.record_remote_failure(now);
                    run.issue(ErrorCode::RemoteUnavailable, format!("fetching {}: {e}", resolved.cid));
                    return RemoteStep { snapshot: local, view: None, reachable: false };
                }
            },
        };
        self.breaker().record_remote_success();

        let remote = match codec::decode_snapshot_at(&bytes, now) {
            Ok(remote) => remote,
            Err(e) => {
                run.issue(ErrorCode::RemoteUnavailable, format!("remote replica {} does not decode: {e}", resolved.cid));
                return RemoteStep { snapshot: local, view: None, reachable: false };
            }
        };
        self.emit(SyncProgress::RemoteFetched { cid: resolved.cid.clone(), version: remote.meta.version });

        let view = RemoteView {
            cid: resolved.cid,
            hash: Some(remote.content_hash()),
            version: Some(remote.meta.version),
        };

        let mut merged = if merge::is_remote_newer(&local, &remote) {
            tracing::info!(local = local.meta.version, remote = remote.meta.version, "adopting newer remote replica");
            self.breaker().record_merge(0, now);
            run.stats.tokens_added += remote.active.keys().filter(|id| !local.active.contains_key(*id)).count();
            let mut adopted = remote;
            adopted.meta.address = local.meta.address;
            adopted.meta.pointer_name = local.meta.pointer_name;
            adopted
        } else if merge::is_local_newer(&local, &remote) {
            tracing::info!(local = local.meta.version, remote = remote.meta.version, "local replica covers remote");
            self.breaker().record_merge(0, now);
            local
        } else {
            let outcome = local.merge(&remote);
            self.emit(SyncProgress::Merged { base: outcome.base, conflicts: outcome.conflicts.len() });
            if let Some(trip) = self.breaker().record_merge(outcome.conflicts.len(), now) {
                tracing::warn!(?trip, "conflicting merges tripped the circuit breaker");
            }
            run.stats.tokens_added += outcome.added.len();
            run.stats.tokens_removed += outcome.removed.len();
            run.stats.conflicts_resolved = outcome.conflicts.len();
            run.conflicts = outcome.conflicts;
            outcome.merged
        };
        merged.meta.last_cid = Some(view.cid.clone());
        merged.meta.published_hash = view.hash.clone();
        RemoteStep { snapshot: merged, view: Some(view), reachable: true }
    }

    fn apply_request(&self, snapshot: &mut Snapshot, request: &SyncRequest, run: &mut Run, now: DateTime<Utc>) {
        let hasher = ValidatorHasher(self.validator.as_ref());
        for raw in &request.incoming_tokens {
            match codec::decode_token(raw) {
                Ok(mut token) => {
                    // compare repaired forms so a bare re-import is a no-op
                    codec::repair(&mut token, &hasher);
                    import_token(snapshot, token, &mut run.stats);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rejecting malformed incoming token");
                    let entry = InvalidEntry::from_raw(raw.clone(), InvalidReason::Malformed, e.to_string(), now);
                    if snapshot.add_invalid(entry) {
                        run.stats.tokens_invalidated += 1;
                    }
                }
            }
        }

        for entry in &request.outbox_entries {
            let id = entry.id.clone();
            tally_upsert(&id, outbox::upsert(&mut snapshot.outbox, entry.clone()), &mut run.stats);
        }
        for entry in &request.mint_entries {
            let id = entry.id.clone();
            tally_upsert(&id, outbox::upsert(&mut snapshot.mint_outbox, entry.clone()), &mut run.stats);
        }

        for transfer in &request.completed_transfers {
            let spent_at = transfer.spent_at.unwrap_or(now);
            if snapshot.move_to_sent(&transfer.token_id, transfer.state_hash.clone(), spent_at) {
                run.stats.tokens_spent += 1;
            }
        }

        if let Some(nametag) = &request.nametag {
            snapshot.nametag = Some(nametag.clone());
        }
    }

    async fn validate(&self, snapshot: &mut Snapshot, run: &mut Run, now: DateTime<Utc>) {
        let hasher = ValidatorHasher(self.validator.as_ref());
        for token in snapshot.active.values_mut() {
            let report = codec::repair(token, &hasher);
            if !report.is_clean() {
                run.stats.tokens_repaired += 1;
                tracing::debug!(token_id = %token.token_id(), patches = ?report.patches, "repaired token");
            }
            if report.unlinked_first_transaction {
                tracing::debug!(token_id = %token.token_id(), "first transaction is unlinked, deferring to validator");
            }
        }

        let broken: Vec<(Hex, String)> = snapshot
            .active
            .iter()
            .filter_map(|(id, token)| codec::validate_chain(token).err().map(|e| (id.clone(), e.to_string())))
            .collect();
        for (id, detail) in broken {
            tracing::warn!(token_id = %id, %detail, "broken state-hash chain");
            if snapshot.move_to_invalid(&id, InvalidReason::BrokenChain, detail, now) {
                run.stats.tokens_invalidated += 1;
            }
        }

        let tokens: Vec<Token> = snapshot.active.values().cloned().collect();
        if !tokens.is_empty() {
            match self.validator.validate_all(&tokens).await {
                Ok(report) => {
                    run.stats.tokens_validated = report.valid_tokens.len();
                    for issue in report.issues {
                        tracing::warn!(token_id = %issue.token_id, reason = %issue.reason, "token failed validation");
                        if snapshot.move_to_invalid(&issue.token_id, InvalidReason::ValidationFailed, issue.reason, now) {
                            run.stats.tokens_invalidated += 1;
                        }
                    }
                }
                Err(e) => run.issue(ErrorCode::ValidatorUnavailable, format!("validating tokens: {e}")),
            }
        }
        self.emit(SyncProgress::Validated { valid: snapshot.active.len(), invalid: snapshot.invalid.len() });
    }

    async fn check_spent(&self, snapshot: &mut Snapshot, owner_key: &Hex, run: &mut Run, now: DateTime<Utc>) {
        let tokens: Vec<Token> = snapshot.active.values().cloned().collect();
        if tokens.is_empty() {
            return;
        }
        match self.validator.check_spent(&tokens, owner_key).await {
            Ok(spent) => {
                for token in spent {
                    if snapshot.move_to_sent(&token.local_id, token.state_hash, now) {
                        tracing::info!(token_id = %token.token_id, "token spent on the ledger");
                        run.stats.tokens_spent += 1;
                    }
                }
            }
            Err(e) => run.issue(ErrorCode::ValidatorUnavailable, format!("checking spent tokens: {e}")),
        }
    }

    async fn deliver(&self, snapshot: &mut Snapshot, run: &mut Run, now: DateTime<Utc>) {
        if !self.config.deliver_transfers {
            return;
        }
        for index in 0..snapshot.outbox.len() {
            let (id, recipient, payload) = {
                let entry = &snapshot.outbox[index];
                let Some(recipient) = entry.recipient_public_key.clone().filter(|_| entry.awaits_delivery()) else {
                    continue;
                };
                (entry.id.clone(), recipient, entry.delivery_payload())
            };
            match self.messaging.deliver(&recipient, payload).await {
                Ok(event_id) => {
                    let entry = &mut snapshot.outbox[index];
                    match entry.advance(OutboxStatus::NostrSent, now) {
                        Ok(()) => {
                            entry.delivery_event_id = Some(event_id);
                            run.stats.entries_delivered += 1;
                            tracing::info!(entry = %id, "transfer delivered");
                        }
                        Err(e) => tracing::warn!(entry = %id, error = %e, "delivered entry could not advance"),
                    }
                }
                Err(e) => {
                    snapshot.outbox[index].note_error(e.to_string(), now);
                    run.issue(ErrorCode::DeliveryFailed, format!("delivering {id}: {e}"));
                }
            }
        }
    }

    async fn check_nametag(&self, snapshot: &Snapshot) {
        if !self.config.publish_nametag {
            return;
        }
        let Some(tag) = &snapshot.nametag else {
            return;
        };
        match self.messaging.resolve_nametag(&tag.name).await {
            Ok(Some(key)) if key == tag.public_key => tracing::debug!(name = %tag.name, "nametag binding verified"),
            Ok(Some(key)) => tracing::warn!(name = %tag.name, bound = %key, "nametag is bound to another key"),
            Ok(None) => match self.messaging.publish_nametag(&tag.name, &tag.public_key).await {
                Ok(()) => tracing::info!(name = %tag.name, "published nametag binding"),
                Err(e) => tracing::warn!(name = %tag.name, error = %e, "could not publish nametag"),
            },
            Err(e) => tracing::warn!(name = %tag.name, error = %e, "could not resolve nametag"),
        }
    }

    async fn publish(&self, snapshot: &mut Snapshot, hash: &Hex, run: &mut Run, now: DateTime<Utc>) {
        let bytes = match codec::encode_snapshot(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                run.issue(ErrorCode::PublishFailed, format!("encoding snapshot: {e}"));
                run.publish_pending = true;
                return;
            }
        };
        let pointer = snapshot.meta.pointer_name.clone();
        let outcome = async {
            let cid = self.remote.upload(bytes).await?;
            let published = self.remote.publish(&pointer, &cid).await?;
            Ok::<_, RemoteError>((cid, published))
        }
        .await;

        match outcome {
            Ok((cid, published)) if published.verified => {
                self.breaker().record_remote_success();
                snapshot.meta.last_cid = Some(cid.clone());
                snapshot.meta.published_hash = Some(hash.clone());
                let promoted = outbox::mark_replicated(snapshot, now);
                if promoted > 0 {
                    snapshot.meta.version += 1;
                    tracing::info!(promoted, "outbox entries replicated");
                }
                run.stats.entries_promoted = promoted;
                tracing::info!(%cid, sequence = published.sequence, version = snapshot.meta.version, "published snapshot");
                self.emit(SyncProgress::Published { cid, version: snapshot.meta.version });
            }
            Ok((cid, _)) => {
                self.record_remote_failure(now);
                run.issue(ErrorCode::PublishFailed, format!("{pointer} did not verify as {cid}"));
                run.publish_pending = true;
            }
            Err(e) => {
                self.record_remote_failure(now);
                run.issue(ErrorCode::PublishFailed, format!("publishing {pointer}: {e}"));
                run.publish_pending = true;
            }
        }
    }

    /// Applies an externally observed status change to one outbox entry.
    /// Returns the new snapshot version.
    pub async fn update_outbox_status(
        &self,
        owner: &str,
        entry_id: &str,
        status: OutboxStatus,
        proof: Option<InclusionProof>,
    ) -> Result<u64, SyncError> {
        let lock = self.owner_lock(owner);
        let _guard = lock.lock().await;
        let (mut snapshot, expected) = self.load_existing(owner)?;
        outbox::apply_status(&mut snapshot, entry_id, status, proof, self.clock.now())?;
        tracing::info!(owner, entry = entry_id, %status, "outbox status updated");
        self.commit(snapshot, expected)
    }

    /// Returns a failed entry to its path. Returns the status it resumed at.
    pub async fn retry_failed(&self, owner: &str, entry_id: &str) -> Result<OutboxStatus, SyncError> {
        let lock = self.owner_lock(owner);
        let _guard = lock.lock().await;
        let (mut snapshot, expected) = self.load_existing(owner)?;
        let status = outbox::retry(&mut snapshot, entry_id, self.clock.now())?;
        self.commit(snapshot, expected)?;
        tracing::info!(owner, entry = entry_id, %status, "retrying failed outbox entry");
        Ok(status)
    }

    /// Plans a payment from the owner's active tokens.
    pub fn plan_split(&self, owner: &str, coin_id: &Hex, amount: u128) -> Result<SplitPlan, SyncError> {
        match self.store.load(owner)? {
            Stored::Found(snapshot) => Ok(split::plan_for_tokens(snapshot.active.values(), coin_id, amount)?),
            Stored::Missing => Ok(split::plan_for_tokens(std::iter::empty(), coin_id, amount)?),
            Stored::Corrupt { reason, .. } => Err(SyncError::CorruptStore { owner: owner.to_string(), reason }),
        }
    }

    fn load_existing(&self, owner: &str) -> Result<(Snapshot, u64), SyncError> {
        match self.store.load(owner)? {
            Stored::Found(snapshot) => {
                let version = snapshot.meta.version;
                Ok((snapshot, version))
            }
            Stored::Missing => Err(SyncError::OwnerNotFound(owner.to_string())),
            Stored::Corrupt { reason, .. } => Err(SyncError::CorruptStore { owner: owner.to_string(), reason }),
        }
    }

    fn commit(&self, mut snapshot: Snapshot, expected: u64) -> Result<u64, SyncError> {
        snapshot.canonicalize();
        snapshot.meta.version = expected + 1;
        if !self.store.save_if_version(&snapshot, Some(expected))? {
            return Err(SyncError::StaleWrite(snapshot.meta.address));
        }
        Ok(snapshot.meta.version)
    }
}

/// Adds a decoded token, resolving against an existing copy with the same
/// rules as a replica merge.
fn import_token(snapshot: &mut Snapshot, token: Token, stats: &mut OperationStats) {
    let id = token.token_id().clone();
    match snapshot.active.get(&id) {
        None => {
            snapshot.active.insert(id, token);
            stats.tokens_imported += 1;
        }
        Some(existing) => {
            let (winner, rule) = pick_token(existing, &token, Side::Local);
            if winner == Side::Remote {
                tracing::debug!(token_id = %id, ?rule, "incoming token supersedes stored copy");
                snapshot.active.insert(id, token);
                stats.tokens_updated += 1;
            }
        }
    }
}

fn tally_upsert(id: &str, outcome: purse_core::Result<Upsert>, stats: &mut OperationStats) {
    match outcome {
        Ok(Upsert::Unchanged) => {}
        Ok(Upsert::Inserted | Upsert::Replaced) => stats.entries_upserted += 1,
        Err(e) => {
            tracing::warn!(entry = id, error = %e, "rejected outbox entry");
            stats.entries_rejected += 1;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
