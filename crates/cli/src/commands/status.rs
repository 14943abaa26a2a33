// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use purse_core::snapshot::{InventoryStats, Nametag};
use purse_core::CircuitBreakerState;
use serde::Serialize;

use super::{print_json, Context};
use crate::display::{format_breaker, format_inventory};
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusReport {
    pub owner: String,
    pub pointer: String,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nametag: Option<Nametag>,
    pub inventory: InventoryStats,
    pub circuit_breaker: CircuitBreakerState,
    /// Corrupt snapshots moved aside for this owner.
    pub quarantined: usize,
}

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let report = run_impl(ctx)?;
    if json {
        return print_json(&report);
    }

    println!("Wallet: {} (pointer {})", report.owner, report.pointer);
    println!("Version: {}", report.version);
    if let Some(cid) = &report.last_cid {
        println!("Replica: {}", cid);
    }
    if let Some(nametag) = &report.nametag {
        println!("Nametag: {}", nametag.name);
    }
    println!("{}", format_inventory(&report.inventory));
    println!("{}", format_breaker(&report.circuit_breaker));
    if report.quarantined > 0 {
        println!("Quarantined snapshots: {}", report.quarantined);
    }
    Ok(())
}

pub(crate) fn run_impl(ctx: &Context) -> Result<StatusReport> {
    let snapshot = ctx.snapshot()?;
    let circuit_breaker = ctx.db.load_breaker(ctx.owner())?.unwrap_or_default();
    let quarantined = ctx.db.quarantined(ctx.owner())?.len();
    Ok(StatusReport {
        owner: snapshot.meta.address.clone(),
        pointer: snapshot.meta.pointer_name.clone(),
        version: snapshot.version(),
        last_cid: snapshot.meta.last_cid.clone(),
        nametag: snapshot.nametag.clone(),
        inventory: snapshot.stats(),
        circuit_breaker,
        quarantined,
    })
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
