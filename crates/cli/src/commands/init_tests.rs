// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;

fn options() -> InitOptions {
    InitOptions {
        address: "alice".to_string(),
        public_key: "02AB".to_string(),
        state_dir: Some("state".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_writes_config_and_database() {
    let temp = TempDir::new().unwrap();
    let path = run_impl(temp.path(), options()).unwrap();

    assert_eq!(path, temp.path().join("purse.toml"));
    assert!(temp.path().join("state/purse.db").is_file());
    let config = Config::load(&path).unwrap();
    assert_eq!(config.owner.public_key, "02ab");
    assert!(!config.is_remote_mode());
}

#[test]
fn test_creates_remote_dir() {
    let temp = TempDir::new().unwrap();
    let options = InitOptions { remote: Some("replica".to_string()), ..options() };
    let path = run_impl(temp.path(), options).unwrap();

    assert!(temp.path().join("replica").is_dir());
    assert!(Config::load(&path).unwrap().is_remote_mode());
}

#[test]
fn test_blank_pointer_and_nametag_dropped() {
    let temp = TempDir::new().unwrap();
    let options = InitOptions { pointer: Some(" ".to_string()), nametag: Some(String::new()), ..options() };
    let config = Config::load(&run_impl(temp.path(), options).unwrap()).unwrap();

    assert_eq!(config.owner.pointer, None);
    assert_eq!(config.owner.nametag, None);
    assert_eq!(config.pointer_name(), "alice");
}

#[test]
fn test_fails_if_already_initialized() {
    let temp = TempDir::new().unwrap();
    run_impl(temp.path(), options()).unwrap();
    assert!(matches!(run_impl(temp.path(), options()), Err(Error::AlreadyInitialized(_))));
}

#[test]
fn test_bad_key_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let options = InitOptions { public_key: "xyz".to_string(), ..options() };
    assert!(matches!(run_impl(temp.path(), options), Err(Error::InvalidHex { .. })));
    assert!(!temp.path().join("purse.toml").exists());
}
