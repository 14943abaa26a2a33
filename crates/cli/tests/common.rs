// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::{json, Value};

pub use predicates::prelude::*;
pub use tempfile::TempDir;

pub const OWNER: &str = "alice";
pub const OWNER_KEY: &str = "02aa01aa01aa01aa01aa01aa01aa01aa01";

/// The binary, isolated from the caller's environment.
pub fn purse() -> Command {
    let mut cmd = cargo_bin_cmd!("purse");
    cmd.env_remove("PURSE_CONFIG")
        .env_remove("PURSE_STATE_DIR")
        .env_remove("PURSE_LOG")
        .env_remove("RUST_LOG");
    cmd
}

/// Initializes a wallet whose state lives in the temp dir.
pub fn init_wallet(remote: bool) -> TempDir {
    let temp = TempDir::new().unwrap();
    let mut cmd = purse();
    cmd.args(["init", "--address", OWNER, "--public-key", OWNER_KEY, "--state-dir", "state"]);
    if remote {
        cmd.args(["--remote", "replica"]);
    }
    cmd.current_dir(temp.path()).assert().success();
    temp
}

pub fn hash(a: u8, b: u8) -> String {
    format!("{a:02x}{b:02x}").repeat(16)
}

pub fn coin() -> String {
    hash(0xc0, 0x01)
}

/// Wire JSON for a genesis-only token holding `amount` of [`coin`].
pub fn token_json(id: u8, amount: u128) -> Value {
    json!({
        "version": "2.0",
        "genesis": {
            "data": {
                "tokenId": hash(0x1d, id),
                "tokenType": hash(0x77, 0x01),
                "coinData": [[coin(), amount.to_string()]],
                "salt": hash(0x5a, id),
                "recipient": OWNER,
            },
            "inclusionProof": {
                "authenticator": {
                    "algorithm": "secp256k1",
                    "publicKey": OWNER_KEY,
                    "signature": hash(0xbb, id),
                    "stateHash": hash(id, 0),
                },
                "merkleTreePath": {"steps": []},
            },
        },
        "state": {"predicate": hash(0xee, 0)},
        "transactions": [],
    })
}

/// Writes `value` into the temp dir and returns the file name.
pub fn write_json(temp: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = temp.path().join(name);
    std::fs::write(&path, serde_json::to_vec(value).unwrap()).unwrap();
    path
}

/// Runs a command with `--json` and parses stdout.
pub fn json_output(temp: &TempDir, args: &[&str]) -> Value {
    let output = purse().args(args).arg("--json").current_dir(temp.path()).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}
