// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! purse-core: Shared library for the purse token wallet
//!
//! This crate provides the token and snapshot data model, the canonical
//! codec, replica conflict resolution, the outbox lifecycle, the split
//! planner, the circuit breaker, and snapshot storage used by the sync
//! engine and the purse CLI.

pub mod binary;
pub mod breaker;
pub mod clock;
pub mod codec;
pub mod db;
pub mod error;
pub mod merge;
pub mod outbox;
pub mod snapshot;
pub mod split;
pub mod token;

#[cfg(test)]
mod test_support;

pub use binary::Hex;
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitBreakerState, Trip};
pub use clock::{ClockSource, SystemClock};
pub use codec::{decode_snapshot, decode_token, encode_snapshot, encode_token, StateHasher};
pub use db::{Database, SnapshotStore, Stored};
pub use error::{ChainError, DecodeError, Error, Result};
pub use merge::{Merge, MergeOutcome, ResolutionRule, Side, TokenConflict};
pub use outbox::{DeliveryPath, Lifecycle, MintOutboxEntry, OutboxEntry, OutboxStatus, TransferKind};
pub use snapshot::{InvalidEntry, InvalidReason, InventoryStats, SentEntry, Snapshot, FORMAT_VERSION};
pub use split::{Candidate, SplitPlan, SplitPortion};
pub use token::{Amount, Token};
