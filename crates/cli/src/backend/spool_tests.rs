// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_support::{hash, owner_key};
use serde_json::json;
use tempfile::TempDir;

fn spool() -> (TempDir, SpoolMessaging) {
    let temp = TempDir::new().unwrap();
    let spool = SpoolMessaging::new(temp.path().join("spool"));
    (temp, spool)
}

#[tokio::test]
async fn test_deliver_writes_payload() {
    let (_temp, spool) = spool();
    let recipient = hash(0xbe, 0x01);
    let payload = json!({"token": {"id": 1}, "amount": "5"});

    let event_id = spool.deliver(&recipient, payload.clone()).await.unwrap();
    let written = std::fs::read(spool.delivery_path(&recipient, &event_id)).unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&written).unwrap(), payload);
}

#[tokio::test]
async fn test_redelivery_reuses_event_id() {
    let (_temp, spool) = spool();
    let recipient = hash(0xbe, 0x01);
    let first = spool.deliver(&recipient, json!({"n": 1})).await.unwrap();
    let second = spool.deliver(&recipient, json!({"n": 1})).await.unwrap();
    let other = spool.deliver(&recipient, json!({"n": 2})).await.unwrap();
    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[tokio::test]
async fn test_unknown_nametag_resolves_to_none() {
    let (_temp, spool) = spool();
    assert_eq!(spool.resolve_nametag("alice").await.unwrap(), None);
}

#[tokio::test]
async fn test_publish_then_resolve_nametag() {
    let (_temp, spool) = spool();
    spool.publish_nametag("alice", &owner_key()).await.unwrap();
    spool.publish_nametag("alice", &owner_key()).await.unwrap();
    assert_eq!(spool.resolve_nametag("alice").await.unwrap(), Some(owner_key()));
}

#[tokio::test]
async fn test_nametag_bound_elsewhere_rejected() {
    let (_temp, spool) = spool();
    spool.publish_nametag("alice", &owner_key()).await.unwrap();
    let err = spool.publish_nametag("alice", &hash(0x01, 0x02)).await.unwrap_err();
    assert!(matches!(err, MessagingError::Rejected(_)));
}

#[tokio::test]
async fn test_unwritable_spool_is_unavailable() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    std::fs::write(&blocker, b"not a dir").unwrap();
    let spool = SpoolMessaging::new(&blocker);

    let err = spool.deliver(&hash(0xbe, 0x01), json!({})).await.unwrap_err();
    assert!(matches!(err, MessagingError::Unavailable(_)));
}
