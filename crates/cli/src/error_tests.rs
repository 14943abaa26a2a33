// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use yare::parameterized;

#[test]
fn test_not_initialized_has_hint() {
    let msg = Error::NotInitialized.to_string();
    assert!(msg.contains("not initialized"));
    assert!(msg.contains("purse init"));
}

#[test]
fn test_owner_locked_names_owner() {
    let msg = Error::OwnerLocked { owner: "alice".to_string() }.to_string();
    assert!(msg.contains("alice"));
    assert!(msg.contains("hint:"));
}

#[parameterized(
    no_snapshot = { Error::NoSnapshot("alice".to_string()), "purse sync" },
    invalid_hex = { Error::InvalidHex { field: "coin", value: "xyz".to_string() }, "hex" },
    config = { Error::Config("bad key".to_string()), "config error: bad key" },
)]
fn test_display_mentions(err: Error, needle: &str) {
    assert!(err.to_string().contains(needle), "{err}");
}

#[test]
fn test_core_error_is_transparent() {
    let err: Error = purse_core::Error::InsufficientBalance { available: 3, required: 9 }.into();
    let msg = err.to_string();
    assert!(msg.contains('3') && msg.contains('9'), "{msg}");
}

#[test]
fn test_sync_failed_shows_code() {
    let err = Error::SyncFailed { code: "STALE_WRITE".to_string(), message: "lost race".to_string() };
    assert_eq!(err.to_string(), "sync failed (STALE_WRITE): lost race");
}
