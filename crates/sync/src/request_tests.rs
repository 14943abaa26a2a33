// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn request_accepts_minimal_json() {
    let request: SyncRequest = serde_json::from_value(json!({
        "ownerAddress": "owner",
        "ownerPublicKey": "0xAB",
        "pointerName": "owner-pointer",
        "local": true,
    }))
    .unwrap();

    assert_eq!(request.owner_address, "owner");
    assert_eq!(request.owner_public_key.as_str(), "ab");
    assert!(request.local);
    assert!(!request.nametag_only);
    assert!(request.incoming_tokens.is_empty());
    assert!(request.nametag.is_none());
}

#[parameterized(
    success = { SyncStatus::Success, "SUCCESS" },
    partial = { SyncStatus::PartialSuccess, "PARTIAL_SUCCESS" },
    local = { SyncStatus::LocalOnly, "LOCAL_ONLY" },
    nametag = { SyncStatus::NametagOnly, "NAMETAG_ONLY" },
    error = { SyncStatus::Error, "ERROR" },
)]
fn status_wire_names(status: SyncStatus, expected: &str) {
    assert_eq!(serde_json::to_value(status).unwrap(), json!(expected));
}

#[parameterized(
    remote = { ErrorCode::RemoteUnavailable, true, false },
    publish = { ErrorCode::PublishFailed, true, false },
    validator = { ErrorCode::ValidatorUnavailable, true, false },
    delivery = { ErrorCode::DeliveryFailed, true, false },
    corrupt = { ErrorCode::LocalStoreCorrupt, false, false },
    stale = { ErrorCode::StaleWrite, false, true },
    storage = { ErrorCode::StorageFailed, false, true },
)]
fn error_code_severity(code: ErrorCode, degrades: bool, fatal: bool) {
    assert_eq!(code.degrades(), degrades);
    assert_eq!(code.is_fatal(), fatal);
}

#[test]
fn result_serializes_camel_case_and_omits_empty() {
    let result = SyncResult {
        status: SyncStatus::LocalOnly,
        mode: SyncMode::Local,
        error_code: None,
        error_message: None,
        issues: Vec::new(),
        operation_stats: OperationStats { tokens_imported: 2, ..Default::default() },
        inventory_stats: None,
        new_version: 4,
        publish_pending: true,
        recovery_attempt: false,
        circuit_breaker: Default::default(),
        conflicts: Vec::new(),
        last_cid: None,
        nametag: None,
    };
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["status"], json!("LOCAL_ONLY"));
    assert_eq!(value["newVersion"], json!(4));
    assert_eq!(value["publishPending"], json!(true));
    assert_eq!(value["operationStats"]["tokensImported"], json!(2));
    assert_eq!(value["circuitBreaker"]["localModeActive"], json!(false));
    assert!(value.get("errorCode").is_none());
    assert!(value.get("issues").is_none());
}

#[parameterized(
    remote = { ErrorCode::RemoteUnavailable },
    publish = { ErrorCode::PublishFailed },
    validator = { ErrorCode::ValidatorUnavailable },
    delivery = { ErrorCode::DeliveryFailed },
    corrupt = { ErrorCode::LocalStoreCorrupt },
    stale = { ErrorCode::StaleWrite },
    storage = { ErrorCode::StorageFailed },
)]
fn error_code_display_matches_wire_name(code: ErrorCode) {
    assert_eq!(json!(code.to_string()), serde_json::to_value(code).unwrap());
}

#[parameterized(
    success = { SyncStatus::Success },
    partial = { SyncStatus::PartialSuccess },
    local = { SyncStatus::LocalOnly },
    nametag = { SyncStatus::NametagOnly },
    error = { SyncStatus::Error },
)]
fn status_display_matches_wire_name(status: SyncStatus) {
    assert_eq!(json!(status.as_str()), serde_json::to_value(status).unwrap());
}
