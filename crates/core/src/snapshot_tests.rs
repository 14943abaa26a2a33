// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::outbox::OutboxStatus;
use crate::test_support::{at, coin, outbox_entry, state_hash, token, token_id};
use serde_json::json;

fn snapshot_with(ids: &[u8]) -> Snapshot {
    let mut snapshot = Snapshot::new("owner-address", "owner-pointer");
    for &id in ids {
        snapshot.active.insert(token_id(id), token(id, 100, 1));
    }
    snapshot
}

#[test]
fn new_snapshot_is_empty_at_version_zero() {
    let snapshot = Snapshot::new("addr", "ptr");
    assert_eq!(snapshot.version(), 0);
    assert_eq!(snapshot.meta.format_version, FORMAT_VERSION);
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.stats(), InventoryStats::default());
}

#[test]
fn wire_layout_uses_camel_case_partitions() {
    let value = serde_json::to_value(snapshot_with(&[1])).unwrap();
    let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    for key in ["meta", "nametag", "active", "sent", "invalid", "outbox", "mintOutbox"] {
        assert!(keys.contains(&key), "missing {key}");
    }
    assert_eq!(value["meta"]["formatVersion"], json!(2));
    assert!(value["active"].get(token_id(1).as_str()).is_some());
}

#[test]
fn content_hash_ignores_replication_metadata() {
    let a = snapshot_with(&[1, 2]);
    let mut b = a.clone();
    b.meta.version = 42;
    b.meta.last_cid = Some("cid-1".to_string());
    b.meta.published_hash = Some(a.content_hash());
    assert_eq!(a.content_hash(), b.content_hash());

    b.active.remove(&token_id(2));
    assert_ne!(a.content_hash(), b.content_hash());
}

#[test]
fn content_hash_ignores_list_order() {
    let mut a = snapshot_with(&[]);
    a.outbox.push(outbox_entry("x", 1, state_hash(1, 1)));
    a.outbox.push(outbox_entry("y", 2, state_hash(2, 1)));
    let mut b = a.clone();
    b.outbox.reverse();
    assert_eq!(a.content_hash(), b.content_hash());
}

#[test]
fn move_to_sent_leaves_active() {
    let mut snapshot = snapshot_with(&[1, 2]);
    assert!(snapshot.move_to_sent(&token_id(1), state_hash(1, 1), at(2)));
    assert!(!snapshot.move_to_sent(&token_id(1), state_hash(1, 1), at(2)));

    assert!(!snapshot.active.contains_key(&token_id(1)));
    assert_eq!(snapshot.sent.len(), 1);
    assert_eq!(snapshot.sent[0].key(), (token_id(1), state_hash(1, 1)));
    assert!(snapshot.holds_token(&token_id(1)));
}

#[test]
fn move_to_invalid_keeps_raw_json() {
    let mut snapshot = snapshot_with(&[1]);
    assert!(snapshot.move_to_invalid(&token_id(1), InvalidReason::BrokenChain, "link 1", at(2)));

    let entry = &snapshot.invalid[0];
    assert_eq!(entry.reason, InvalidReason::BrokenChain);
    assert_eq!(entry.state_hash, Some(state_hash(1, 1)));
    assert_eq!(entry.token["genesis"]["data"]["tokenId"], json!(token_id(1).to_string()));
    assert!(snapshot.holds_token(&token_id(1)));
}

#[test]
fn duplicate_tombstones_are_dropped() {
    let mut snapshot = snapshot_with(&[]);
    let entry = SentEntry { token: token(1, 1, 1), state_hash: state_hash(1, 1), spent_at: at(1) };
    assert!(snapshot.add_sent(entry.clone()));
    assert!(!snapshot.add_sent(SentEntry { spent_at: at(5), ..entry }));
    assert_eq!(snapshot.sent.len(), 1);
}

#[test]
fn sent_takes_precedence_over_active() {
    let mut snapshot = snapshot_with(&[1, 2]);
    snapshot.add_sent(SentEntry { token: token(1, 100, 1), state_hash: state_hash(1, 1), spent_at: at(1) });

    let removed = snapshot.enforce_exclusive_placement();

    assert_eq!(removed, vec![token_id(1)]);
    assert!(!snapshot.active.contains_key(&token_id(1)));
    assert!(snapshot.active.contains_key(&token_id(2)));
}

#[test]
fn invalid_takes_precedence_over_active() {
    let mut snapshot = snapshot_with(&[1]);
    snapshot.add_invalid(InvalidEntry::from_token(&token(1, 100, 1), InvalidReason::ValidationFailed, String::new(), at(1)));
    assert_eq!(snapshot.enforce_exclusive_placement(), vec![token_id(1)]);
}

#[test]
fn tombstone_for_older_state_does_not_shadow_newer_state() {
    let mut snapshot = snapshot_with(&[]);
    snapshot.active.insert(token_id(1), token(1, 100, 3));
    snapshot.add_sent(SentEntry { token: token(1, 100, 1), state_hash: state_hash(1, 1), spent_at: at(1) });

    assert!(snapshot.enforce_exclusive_placement().is_empty());
    assert!(snapshot.active.contains_key(&token_id(1)));
}

#[test]
fn invalid_entry_from_raw_recovers_identifiers() {
    let raw = json!({
        "genesis": {"data": {"tokenId": [1, 2]}},
        "transactions": [{"newStateHash": "0xAB"}],
    });
    let entry = InvalidEntry::from_raw(raw, InvalidReason::Malformed, "x".into(), at(1));
    assert_eq!(entry.token_id.unwrap().as_str(), "0102");
    assert_eq!(entry.state_hash.unwrap().as_str(), "ab");
}

#[test]
fn invalid_entries_without_ids_are_keyed_by_content() {
    let a = InvalidEntry::from_raw(json!({"junk": 1}), InvalidReason::Malformed, String::new(), at(1));
    let b = InvalidEntry::from_raw(json!({"junk": 2}), InvalidReason::Malformed, String::new(), at(1));
    assert_ne!(a.key(), b.key());

    let mut snapshot = snapshot_with(&[]);
    assert!(snapshot.add_invalid(a.clone()));
    assert!(snapshot.add_invalid(b));
    assert!(!snapshot.add_invalid(a));
}

#[test]
fn stats_count_partitions_and_balances() {
    let mut snapshot = snapshot_with(&[1, 2, 3]);
    snapshot.move_to_sent(&token_id(3), state_hash(3, 1), at(1));
    let mut failed = outbox_entry("f", 1, state_hash(1, 1));
    failed.status = OutboxStatus::Failed;
    snapshot.outbox.push(failed);
    snapshot.outbox.push(outbox_entry("p", 2, state_hash(2, 1)));

    let stats = snapshot.stats();

    assert_eq!(stats.active, 2);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.outbox, 2);
    assert_eq!(stats.pending_replication, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.balances.get(&coin()), Some(&Amount(200)));
}
