// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::breaker::CircuitBreakerState;
use crate::test_support::{at, outbox_entry, state_hash, token, token_id};

fn snapshot(version: u64) -> Snapshot {
    let mut snapshot = Snapshot::new("owner-address", "owner-pointer");
    snapshot.meta.version = version;
    snapshot.active.insert(token_id(1), token(1, 700, 1));
    snapshot.outbox.push(outbox_entry("o1", 2, state_hash(2, 0)));
    snapshot
}

#[test]
fn load_missing_owner() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.load("nobody").unwrap(), Stored::Missing);
    assert_eq!(db.stored_version("nobody").unwrap(), None);
}

#[test]
fn save_and_load_roundtrip() {
    let db = Database::open_in_memory().unwrap();
    let original = snapshot(1);

    assert!(db.save_if_version(&original, None).unwrap());

    assert_eq!(db.load("owner-address").unwrap(), Stored::Found(original));
    assert_eq!(db.stored_version("owner-address").unwrap(), Some(1));
    assert_eq!(db.addresses().unwrap(), vec!["owner-address".to_string()]);
}

#[test]
fn save_rejects_stale_expected_version() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.save_if_version(&snapshot(1), None).unwrap());
    assert!(db.save_if_version(&snapshot(2), Some(1)).unwrap());

    assert!(!db.save_if_version(&snapshot(3), Some(1)).unwrap());
    assert!(!db.save_if_version(&snapshot(3), None).unwrap());
    assert_eq!(db.stored_version("owner-address").unwrap(), Some(2));
}

#[test]
fn corrupt_row_is_reported_and_quarantined() {
    let db = Database::open_in_memory().unwrap();
    put_raw(&db, "owner-address", 7, b"{not json").unwrap();

    match db.load("owner-address").unwrap() {
        Stored::Corrupt { version, .. } => assert_eq!(version, 7),
        other => unreachable!("expected corrupt row, got {other:?}"),
    }

    assert!(db.quarantine("owner-address", "decode failed").unwrap());
    assert_eq!(db.load("owner-address").unwrap(), Stored::Missing);

    let records = db.quarantined("owner-address").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].version, 7);
    assert_eq!(records[0].content, b"{not json".to_vec());
    assert_eq!(records[0].reason, "decode failed");

    assert!(db.save_if_version(&snapshot(1), None).unwrap());
}

#[test]
fn unsupported_format_is_corrupt() {
    let db = Database::open_in_memory().unwrap();
    let mut value = serde_json::to_value(snapshot(1)).unwrap();
    value["meta"]["formatVersion"] = serde_json::json!(3);
    put_raw(&db, "owner-address", 1, &serde_json::to_vec(&value).unwrap()).unwrap();

    assert!(matches!(db.load("owner-address").unwrap(), Stored::Corrupt { .. }));
}

#[test]
fn quarantine_without_row_is_noop() {
    let db = Database::open_in_memory().unwrap();
    assert!(!db.quarantine("nobody", "x").unwrap());
    assert!(db.quarantined("nobody").unwrap().is_empty());
}

#[test]
fn breaker_state_persists() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.load_breaker("owner-address").unwrap(), None);

    let state = CircuitBreakerState {
        consecutive_ipfs_failures: 3,
        local_mode_active: true,
        local_mode_activated_at: Some(at(1)),
        next_recovery_attempt: Some(at(2)),
        ..Default::default()
    };
    db.save_breaker("owner-address", &state).unwrap();
    db.save_breaker("owner-address", &state).unwrap();

    assert_eq!(db.load_breaker("owner-address").unwrap(), Some(state));
}

#[test]
fn on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("purse.db");
    {
        let db = Database::open(&path).unwrap();
        db.save_if_version(&snapshot(4), None).unwrap();
    }
    let db = Database::open(&path).unwrap();
    assert_eq!(db.stored_version("owner-address").unwrap(), Some(4));
}
