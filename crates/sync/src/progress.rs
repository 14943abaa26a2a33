// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed progress events emitted while a sync runs.

use purse_core::Side;
use serde::Serialize;

use crate::request::{SyncMode, SyncStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SyncProgress {
    Started { owner: String, mode: SyncMode },
    LocalLoaded { version: u64, tokens: usize },
    RemoteFetched { cid: String, version: u64 },
    Merged { base: Side, conflicts: usize },
    Validated { valid: usize, invalid: usize },
    Published { cid: String, version: u64 },
    Finished { status: SyncStatus, version: u64 },
}
