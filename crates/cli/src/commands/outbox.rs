// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use purse_core::{MintOutboxEntry, OutboxEntry};
use serde::Serialize;

use super::{print_json, Context};
use crate::display::{format_mint_entry, format_outbox_entry};
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OutboxListing {
    pub outbox: Vec<OutboxEntry>,
    pub mint_outbox: Vec<MintOutboxEntry>,
}

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let listing = run_impl(ctx)?;
    if json {
        return print_json(&listing);
    }

    if listing.outbox.is_empty() && listing.mint_outbox.is_empty() {
        println!("No outgoing transfers");
        return Ok(());
    }
    for entry in &listing.outbox {
        println!("{}", format_outbox_entry(entry));
    }
    for entry in &listing.mint_outbox {
        println!("{}", format_mint_entry(entry));
    }
    Ok(())
}

/// Entries ordered by creation time, oldest first.
pub(crate) fn run_impl(ctx: &Context) -> Result<OutboxListing> {
    let snapshot = ctx.snapshot()?;
    let mut outbox = snapshot.outbox;
    outbox.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let mut mint_outbox = snapshot.mint_outbox;
    mint_outbox.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(OutboxListing { outbox, mint_outbox })
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
