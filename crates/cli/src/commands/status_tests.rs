// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::commands::sync::{run_impl as sync, SyncOptions};
use crate::commands::testing::TestContext;
use crate::error::Error;
use crate::test_support::{coin, token_json, OWNER};
use purse_core::token::Amount;
use serde_json::json;

#[test]
fn test_requires_a_snapshot() {
    let test = TestContext::new();
    assert!(matches!(run_impl(&test.ctx), Err(Error::NoSnapshot(owner)) if owner == OWNER));
}

#[test]
fn test_reports_inventory_after_sync() {
    let test = TestContext::new();
    let tokens = test.write_json("t.json", &json!([token_json(1, 40, 0), token_json(2, 60, 1)]));
    sync(&test.ctx, SyncOptions { import: vec![tokens], ..Default::default() }).unwrap();

    let report = run_impl(&test.ctx).unwrap();
    assert_eq!(report.owner, OWNER);
    assert_eq!(report.version, 1);
    assert!(report.last_cid.is_some());
    assert_eq!(report.inventory.active, 2);
    assert_eq!(report.inventory.balances.get(&coin()), Some(&Amount(100)));
    assert!(!report.circuit_breaker.local_mode_active);
    assert_eq!(report.quarantined, 0);
}

#[test]
fn test_report_serializes_camel_case() {
    let test = TestContext::local();
    sync(&test.ctx, SyncOptions::default()).unwrap();

    let value = serde_json::to_value(run_impl(&test.ctx).unwrap()).unwrap();
    assert_eq!(value["version"], json!(1));
    assert!(value.get("circuitBreaker").is_some());
    assert!(value.get("lastCid").is_none());
}
