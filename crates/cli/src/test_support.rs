// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Token fixtures shared by the CLI unit tests.

#![allow(clippy::unwrap_used)]

use purse_core::{codec, Hex, Token};
use serde_json::{json, Value};

pub const OWNER: &str = "alice";

pub fn hash(a: u8, b: u8) -> Hex {
    Hex::parse(&format!("{a:02x}{b:02x}").repeat(16)).unwrap()
}

pub fn coin() -> Hex {
    hash(0xc0, 0x01)
}

pub fn owner_key() -> Hex {
    hash(0xaa, 0x01)
}

/// Wire JSON for a token holding `amount` of [`coin`] after `chain`
/// committed transfers.
pub fn token_json(id: u8, amount: u128, chain: u8) -> Value {
    let transactions: Vec<Value> = (0..chain)
        .map(|i| {
            json!({
                "data": {"recipient": format!("addr-{i}")},
                "previousStateHash": hash(id, i).to_string(),
                "newStateHash": hash(id, i + 1).to_string(),
                "inclusionProof": {"merkleTreePath": {"steps": []}, "transactionHash": hash(0x7a, i).to_string()},
            })
        })
        .collect();
    json!({
        "version": "2.0",
        "genesis": {
            "data": {
                "tokenId": hash(0x1d, id).to_string(),
                "tokenType": hash(0x77, 0x01).to_string(),
                "coinData": [[coin().to_string(), amount.to_string()]],
                "salt": hash(0x5a, id).to_string(),
                "recipient": OWNER,
            },
            "inclusionProof": {
                "authenticator": {
                    "algorithm": "secp256k1",
                    "publicKey": owner_key().to_string(),
                    "signature": hash(0xbb, id).to_string(),
                    "stateHash": hash(id, 0).to_string(),
                },
                "merkleTreePath": {"steps": []},
            },
        },
        "state": {"predicate": hash(0xee, chain).to_string()},
        "transactions": transactions,
    })
}

pub fn token(id: u8, amount: u128, chain: u8) -> Token {
    codec::decode_token(&token_json(id, amount, chain)).unwrap()
}
