// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.

use purse_core::BreakerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub breaker: BreakerConfig,
    /// Hand transfers with a proof to messaging during normal syncs.
    pub deliver_transfers: bool,
    /// Publish the nametag binding when messaging does not know it yet.
    pub publish_nametag: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig { breaker: BreakerConfig::default(), deliver_transfers: true, publish_nametag: true }
    }
}
