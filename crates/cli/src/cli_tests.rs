// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! CLI argument parsing tests.

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
    Cli::try_parse_from(args)
}

#[test]
fn test_init_required_flags() {
    let cli = parse(&["purse", "init", "--address", "alice", "--public-key", "02ab"]).unwrap();
    match cli.command {
        Command::Init { address, public_key, pointer, remote, .. } => {
            assert_eq!(address, "alice");
            assert_eq!(public_key, "02ab");
            assert_eq!(pointer, None);
            assert_eq!(remote, None);
        }
        _ => unreachable!("expected init"),
    }
}

#[parameterized(
    missing_key = { &["purse", "init", "--address", "alice"] },
    blank_address = { &["purse", "init", "--address", " ", "--public-key", "02"] },
)]
fn test_init_rejects(args: &[&str]) {
    assert!(parse(args).is_err());
}

#[test]
fn test_sync_defaults() {
    let cli = parse(&["purse", "sync"]).unwrap();
    match cli.command {
        Command::Sync { local, nametag_only, import, outbox, json } => {
            assert!(!local && !nametag_only && !json);
            assert!(import.is_empty() && outbox.is_empty());
        }
        _ => unreachable!("expected sync"),
    }
}

#[test]
fn test_sync_repeated_imports() {
    let cli = parse(&["purse", "sync", "--import", "a.json", "--import", "b.json", "--json"]).unwrap();
    match cli.command {
        Command::Sync { import, json, .. } => {
            assert_eq!(import, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
            assert!(json);
        }
        _ => unreachable!("expected sync"),
    }
}

#[parameterized(
    with_local = { "--local" },
    with_import = { "--import=a.json" },
)]
fn test_nametag_only_conflicts(flag: &str) {
    assert!(parse(&["purse", "sync", "--nametag-only", flag]).is_err());
}

#[test]
fn test_global_config_flag() {
    let cli = parse(&["purse", "status", "-C", "/w/purse.toml"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("/w/purse.toml")));
}

#[parameterized(
    plain = { "250", 250 },
    padded = { " 7 ", 7 },
    huge = { "340282366920938463463374607431768211455", u128::MAX },
)]
fn test_split_amounts(raw: &str, expected: u128) {
    let cli = parse(&["purse", "split", "--coin", "c001", "--amount", raw]).unwrap();
    match cli.command {
        Command::Split { amount, .. } => assert_eq!(amount, expected),
        _ => unreachable!("expected split"),
    }
}

#[parameterized(
    zero = { "0" },
    negative = { "-5" },
    fraction = { "1.5" },
)]
fn test_split_rejects_amount(raw: &str) {
    assert!(parse(&["purse", "split", "--coin", "c001", "--amount", raw]).is_err());
}
