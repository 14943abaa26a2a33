// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker for the remote replica.
//!
//! Repeated remote failures or repeatedly conflicting merges switch an owner
//! into LOCAL mode, where syncs stop talking to the remote store. After the
//! recovery interval a sync runs normally as a recovery attempt; success
//! leaves LOCAL mode and failure schedules the next attempt.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Thresholds and timing for the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failed fetches or publishes before entering LOCAL mode.
    pub failure_threshold: u32,
    /// Consecutive merges with conflicts before entering LOCAL mode.
    pub conflict_threshold: u32,
    pub recovery_interval_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig { failure_threshold: 10, conflict_threshold: 5, recovery_interval_secs: 3600 }
    }
}

/// Upper bound on the recovery interval (about a century).
const MAX_RECOVERY_SECS: u64 = 100 * 365 * 24 * 3600;

impl BreakerConfig {
    pub fn recovery_interval(&self) -> Duration {
        Duration::seconds(i64::try_from(self.recovery_interval_secs.min(MAX_RECOVERY_SECS)).unwrap_or(0))
    }

    fn next_attempt(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.recovery_interval()).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerState {
    pub consecutive_ipfs_failures: u32,
    pub consecutive_conflicts: u32,
    pub local_mode_active: bool,
    pub local_mode_activated_at: Option<DateTime<Utc>>,
    pub next_recovery_attempt: Option<DateTime<Utc>>,
}

/// Why the breaker tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trip {
    RemoteFailures,
    Conflicts,
}

#[derive(Debug, Clone, Default)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: CircuitBreakerState,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        CircuitBreaker { config, state: CircuitBreakerState::default() }
    }

    pub fn with_state(config: BreakerConfig, state: CircuitBreakerState) -> Self {
        CircuitBreaker { config, state }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn is_local_mode(&self) -> bool {
        self.state.local_mode_active
    }

    /// True when LOCAL mode is active and the next recovery attempt is due.
    pub fn recovery_due(&self, now: DateTime<Utc>) -> bool {
        self.state.local_mode_active
            && match self.state.next_recovery_attempt {
                Some(next) => now >= next,
                None => true,
            }
    }

    /// Records a failed fetch or publish.
    ///
    /// While in LOCAL mode this is a failed recovery attempt and pushes the
    /// next attempt one interval out. Returns the trip if this call entered
    /// LOCAL mode.
    pub fn record_remote_failure(&mut self, now: DateTime<Utc>) -> Option<Trip> {
        self.state.consecutive_ipfs_failures = self.state.consecutive_ipfs_failures.saturating_add(1);
        if self.state.local_mode_active {
            self.state.next_recovery_attempt = Some(self.config.next_attempt(now));
            tracing::info!(next = ?self.state.next_recovery_attempt, "recovery attempt failed, staying in local mode");
            return None;
        }
        if self.state.consecutive_ipfs_failures >= self.config.failure_threshold {
            self.activate(now, Trip::RemoteFailures);
            return Some(Trip::RemoteFailures);
        }
        None
    }

    /// Records a successful fetch or publish. Leaves LOCAL mode if active.
    pub fn record_remote_success(&mut self) {
        self.state.consecutive_ipfs_failures = 0;
        if self.state.local_mode_active {
            tracing::info!("remote reachable again, leaving local mode");
            self.state.local_mode_active = false;
            self.state.local_mode_activated_at = None;
            self.state.next_recovery_attempt = None;
            self.state.consecutive_conflicts = 0;
        }
    }

    /// Records the outcome of a merge.
    pub fn record_merge(&mut self, conflicts: usize, now: DateTime<Utc>) -> Option<Trip> {
        if conflicts == 0 {
            self.state.consecutive_conflicts = 0;
            return None;
        }
        self.state.consecutive_conflicts = self.state.consecutive_conflicts.saturating_add(1);
        if !self.state.local_mode_active && self.state.consecutive_conflicts >= self.config.conflict_threshold {
            self.activate(now, Trip::Conflicts);
            return Some(Trip::Conflicts);
        }
        None
    }

    fn activate(&mut self, now: DateTime<Utc>, trip: Trip) {
        self.state.local_mode_active = true;
        self.state.local_mode_activated_at = Some(now);
        self.state.next_recovery_attempt = Some(self.config.next_attempt(now));
        self.state.consecutive_conflicts = 0;
        tracing::warn!(
            ?trip,
            failures = self.state.consecutive_ipfs_failures,
            next = ?self.state.next_recovery_attempt,
            "entering local mode"
        );
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
