// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! purse-sync: Sync orchestration for the purse token wallet
//!
//! Reconciles an owner's local snapshot with the replica on a
//! content-addressed remote store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ SyncRequest │────►│  SyncEngine  │────►│ RemoteStore │
//! └─────────────┘     │              │◄────│   (trait)   │
//!                     │              │     └─────────────┘
//! ┌─────────────┐     │              │     ┌─────────────┐
//! │ SyncResult  │◄────│              │────►│  Validator  │
//! └─────────────┘     └──────────────┘     │   (trait)   │
//!                        │        │        └─────────────┘
//!                        ▼        ▼
//!              ┌──────────────┐ ┌─────────────┐
//!              │SnapshotStore │ │  Messaging  │
//!              │   (trait)    │ │   (trait)   │
//!              └──────────────┘ └─────────────┘
//! ```
//!
//! Every collaborator is injected, so tests run the whole pipeline against
//! in-memory implementations.

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod engine;
pub mod messaging;
pub mod progress;
pub mod remote;
pub mod request;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncError};
pub use messaging::{Messaging, MessagingError};
pub use progress::SyncProgress;
pub use remote::{Published, RemoteError, RemoteStore, Resolved};
pub use request::{CompletedTransfer, ErrorCode, OperationStats, SyncIssue, SyncMode, SyncRequest, SyncResult, SyncStatus};
pub use validator::{SpentToken, TokenIssue, ValidationReport, Validator, ValidatorError};

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
