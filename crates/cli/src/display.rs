// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text rendering for command output.

use std::fmt::Write;

use purse_core::snapshot::InventoryStats;
use purse_core::{CircuitBreakerState, Hex, MintOutboxEntry, OutboxEntry, SplitPlan};
use purse_sync::SyncResult;

/// Number of hex digits shown for ids in text output.
const SHORT_ID_LEN: usize = 12;

/// Abbreviate a hex id for display.
pub fn short_id(id: &Hex) -> &str {
    let s = id.as_str();
    s.get(..SHORT_ID_LEN).unwrap_or(s)
}

pub fn format_sync_result(owner: &str, result: &SyncResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Synced {}: {} (v{}, {})", owner, result.status, result.new_version, result.mode);

    let ops = &result.operation_stats;
    let _ = writeln!(
        out,
        "  tokens: {} imported, {} added, {} updated, {} invalidated, {} spent",
        ops.tokens_imported, ops.tokens_added, ops.tokens_updated, ops.tokens_invalidated, ops.tokens_spent
    );
    let _ = writeln!(
        out,
        "  outbox: {} queued, {} promoted, {} delivered, {} cleaned",
        ops.entries_upserted, ops.entries_promoted, ops.entries_delivered, ops.entries_cleaned
    );
    if !result.conflicts.is_empty() {
        let _ = writeln!(out, "  conflicts resolved: {}", result.conflicts.len());
    }
    if let Some(cid) = &result.last_cid {
        let _ = writeln!(out, "  replica: {}", cid);
    }
    if result.publish_pending {
        let _ = writeln!(out, "  publish pending: local changes not yet replicated");
    }
    if result.recovery_attempt {
        let _ = writeln!(out, "  recovery attempt after local mode");
    }
    if result.circuit_breaker.local_mode_active {
        let _ = writeln!(out, "  {}", format_breaker(&result.circuit_breaker));
    }
    for issue in &result.issues {
        let _ = writeln!(out, "  warning: {}: {}", issue.code, issue.message);
    }
    out.trim_end().to_string()
}

pub fn format_inventory(stats: &InventoryStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Tokens: {} active, {} sent, {} invalid", stats.active, stats.sent, stats.invalid);
    let _ = writeln!(
        out,
        "Outbox: {} transfers, {} mints ({} awaiting replication, {} failed)",
        stats.outbox, stats.mint_outbox, stats.pending_replication, stats.failed
    );
    if stats.balances.is_empty() {
        let _ = writeln!(out, "Balances: none");
    } else {
        let _ = writeln!(out, "Balances:");
        for (coin, amount) in &stats.balances {
            let _ = writeln!(out, "  {}  {}", coin, amount);
        }
    }
    out.trim_end().to_string()
}

pub fn format_breaker(state: &CircuitBreakerState) -> String {
    if !state.local_mode_active {
        return format!(
            "Breaker: closed ({} remote failures, {} conflicts)",
            state.consecutive_ipfs_failures, state.consecutive_conflicts
        );
    }
    match state.next_recovery_attempt {
        Some(at) => format!("Breaker: local mode until {}", at.to_rfc3339()),
        None => "Breaker: local mode".to_string(),
    }
}

pub fn format_outbox_entry(entry: &OutboxEntry) -> String {
    let mut line = format!(
        "{}  {:<17}  {} of {} to {}",
        entry.id,
        entry.status.as_str(),
        entry.amount,
        short_id(&entry.coin_id),
        entry.recipient_address
    );
    if entry.retry_count > 0 {
        let _ = write!(line, "  (retries: {})", entry.retry_count);
    }
    if let Some(error) = &entry.last_error {
        let _ = write!(line, "  [{}]", error);
    }
    line
}

pub fn format_mint_entry(entry: &MintOutboxEntry) -> String {
    format!(
        "{}  {:<17}  mint {} of {} as {}",
        entry.id,
        entry.status.as_str(),
        entry.amount,
        short_id(&entry.coin_id),
        short_id(&entry.token_id)
    )
}

pub fn format_plan(plan: &SplitPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Target: {}", plan.target);
    for candidate in &plan.direct {
        let _ = writeln!(out, "  send   {}  {}", short_id(&candidate.token_id), candidate.amount);
    }
    match &plan.split {
        Some(split) => {
            let _ = writeln!(
                out,
                "  split  {}  {} -> {} sent + {} change",
                short_id(&split.token.token_id),
                split.token.amount,
                split.split_amount,
                split.remainder_amount
            );
        }
        None => {
            let _ = writeln!(out, "  no split needed");
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
#[path = "display_tests.rs"]
mod tests;
