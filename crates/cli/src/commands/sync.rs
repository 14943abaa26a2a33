// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::{Path, PathBuf};

use purse_core::snapshot::Nametag;
use purse_core::OutboxEntry;
use purse_sync::{SyncRequest, SyncResult, SyncStatus};
use serde_json::Value;

use super::{print_json, runtime, Context};
use crate::display::format_sync_result;
use crate::error::{Error, Result};
use crate::lock;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub local: bool,
    pub nametag_only: bool,
    pub import: Vec<PathBuf>,
    pub outbox: Vec<PathBuf>,
    pub json: bool,
}

pub fn run(ctx: &Context, options: SyncOptions) -> Result<()> {
    let json = options.json;
    let result = run_impl(ctx, options)?;

    if json {
        print_json(&result)?;
    } else {
        println!("{}", format_sync_result(ctx.owner(), &result));
    }

    if result.status == SyncStatus::Error {
        return Err(Error::SyncFailed {
            code: result.error_code.map_or("ERROR", |c| c.as_str()).to_string(),
            message: result.error_message.unwrap_or_default(),
        });
    }
    Ok(())
}

/// Runs one sync under the owner's file lock. Nametag-only syncs write
/// nothing and run without it.
pub(crate) fn run_impl(ctx: &Context, options: SyncOptions) -> Result<SyncResult> {
    let request = build_request(ctx, &options)?;
    let _guard = if request.nametag_only {
        None
    } else {
        let guard = lock::acquire(&ctx.lock_dir(), ctx.owner())?;
        tracing::debug!(path = %guard.path().display(), "owner lock held");
        Some(guard)
    };
    runtime()?.block_on(execute(ctx, request))
}

/// Runs the engine with the persisted breaker state and saves it afterwards.
pub(crate) async fn execute(ctx: &Context, request: SyncRequest) -> Result<SyncResult> {
    let (progress, mut events) = tokio::sync::mpsc::unbounded_channel();
    let engine = ctx.engine().with_progress(progress);
    if let Some(state) = ctx.db.load_breaker(ctx.owner())? {
        engine.restore_breaker(state);
    }

    let read_only = request.nametag_only;
    let result = engine.sync(request).await;
    while let Ok(event) = events.try_recv() {
        tracing::debug!(?event, "sync progress");
    }

    if !read_only {
        ctx.db.save_breaker(ctx.owner(), &engine.breaker_state())?;
        tracing::debug!(owner = %ctx.owner(), status = %result.status, "breaker state saved");
    }
    Ok(result)
}

pub(crate) fn build_request(ctx: &Context, options: &SyncOptions) -> Result<SyncRequest> {
    let key = ctx.owner_key()?;
    let mut request = SyncRequest::new(ctx.owner(), key.clone(), ctx.config.pointer_name());
    request.local = options.local || !ctx.config.is_remote_mode();
    request.nametag_only = options.nametag_only;
    request.nametag = ctx
        .config
        .owner
        .nametag
        .as_ref()
        .map(|name| Nametag { name: name.clone(), public_key: key, token: None });

    for path in &options.import {
        request.incoming_tokens.extend(read_items(path)?);
    }
    for path in &options.outbox {
        for item in read_items(path)? {
            let entry: OutboxEntry = serde_json::from_value(item).map_err(|e| import_error(path, e))?;
            request.outbox_entries.push(entry);
        }
    }
    Ok(request)
}

/// Reads a JSON file holding one object or an array of objects.
fn read_items(path: &Path) -> Result<Vec<Value>> {
    let content = fs::read_to_string(path).map_err(|e| import_error(path, e))?;
    match serde_json::from_str::<Value>(&content).map_err(|e| import_error(path, e))? {
        Value::Array(items) => Ok(items),
        item @ Value::Object(_) => Ok(vec![item]),
        _ => Err(import_error(path, "expected an object or an array")),
    }
}

fn import_error(path: &Path, reason: impl ToString) -> Error {
    Error::Import { path: path.display().to_string(), reason: reason.to_string() }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
