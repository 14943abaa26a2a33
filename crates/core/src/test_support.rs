// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Fixtures shared by the unit tests of this crate.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::binary::Hex;
use crate::codec::StateHasher;
use crate::outbox::{Commitment, DeliveryPath, MintOutboxEntry, OutboxEntry, OutboxStatus, TransferKind};
use crate::token::{sha256_json, Amount, InclusionProof, Token, TokenState};

/// A 32-byte hex value built from two marker bytes.
pub fn hash(a: u8, b: u8) -> Hex {
    Hex::parse(&format!("{a:02x}{b:02x}").repeat(16)).unwrap()
}

pub fn token_id(id: u8) -> Hex {
    hash(0x1d, id)
}

pub fn coin() -> Hex {
    hash(0xc0, 0x01)
}

/// State hash of step `step` in the chain of token `id`; step 0 is genesis.
pub fn state_hash(id: u8, step: u8) -> Hex {
    hash(id, step)
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, hour, 0, 0).unwrap()
}

/// Wire JSON for a token carrying `amount` of [`coin`] with `chain` committed
/// transactions.
pub fn token_json(id: u8, amount: u128, chain: u8) -> Value {
    let transactions: Vec<Value> = (0..chain)
        .map(|i| {
            json!({
                "data": {"recipient": format!("addr-{i}")},
                "previousStateHash": state_hash(id, i).to_string(),
                "newStateHash": state_hash(id, i + 1).to_string(),
                "predicate": hash(0xee, i).to_string(),
                "inclusionProof": {"merkleTreePath": {"steps": []}, "transactionHash": hash(0x7a, i).to_string()},
            })
        })
        .collect();
    json!({
        "version": "2.0",
        "genesis": {
            "data": {
                "tokenId": token_id(id).to_string(),
                "tokenType": hash(0x77, 0x01).to_string(),
                "coinData": [[coin().to_string(), amount.to_string()]],
                "salt": hash(0x5a, id).to_string(),
                "recipient": "owner-address",
            },
            "inclusionProof": {
                "authenticator": {
                    "algorithm": "secp256k1",
                    "publicKey": hash(0xaa, 0x01).to_string(),
                    "signature": hash(0xbb, id).to_string(),
                    "stateHash": state_hash(id, 0).to_string(),
                },
                "merkleTreePath": {"steps": []},
            },
        },
        "state": {"predicate": hash(0xee, chain).to_string()},
        "transactions": transactions,
    })
}

pub fn token(id: u8, amount: u128, chain: u8) -> Token {
    serde_json::from_value(token_json(id, amount, chain)).unwrap()
}

/// Deterministic stand-in for the validator's state hashing.
pub struct TestHasher;

impl StateHasher for TestHasher {
    fn state_hash(&self, token_id: &Hex, state: &TokenState) -> Hex {
        sha256_json(&(token_id, state))
    }
}

pub fn outbox_entry(id: &str, source: u8, previous_state_hash: Hex) -> OutboxEntry {
    OutboxEntry {
        id: id.to_string(),
        kind: TransferKind::DirectTransfer,
        status: OutboxStatus::PendingIpfsSync,
        delivery: DeliveryPath::Standard,
        source_token_id: token_id(source),
        source_token: None,
        recipient_address: "recipient-address".to_string(),
        recipient_public_key: Some(hash(0xab, 0x01)),
        coin_id: coin(),
        amount: Amount(100),
        salt: hash(0x5a, 0xff),
        commitment: Commitment {
            request_id: hash(0x0e, source),
            previous_state_hash,
            transaction_data: json!({"recipient": "recipient-address"}),
            authenticator: None,
        },
        split_group_id: None,
        created_at: at(1),
        updated_at: at(1),
        replicated_at: None,
        retry_count: 0,
        last_error: None,
        inclusion_proof: None,
        delivery_event_id: None,
    }
}

pub fn mint_entry(id: &str, minted: u8) -> MintOutboxEntry {
    MintOutboxEntry {
        id: id.to_string(),
        status: OutboxStatus::PendingIpfsSync,
        token_id: token_id(minted),
        token_type: hash(0x77, 0x01),
        coin_id: coin(),
        amount: Amount(50),
        salt: hash(0x5b, minted),
        recipient_address: "owner-address".to_string(),
        request_id: hash(0x0f, minted),
        mint_data: json!({}),
        split_group_id: None,
        created_at: at(1),
        updated_at: at(1),
        replicated_at: None,
        retry_count: 0,
        last_error: None,
        inclusion_proof: None,
        minted_token: None,
    }
}

pub fn proof() -> InclusionProof {
    InclusionProof {
        authenticator: None,
        merkle_tree_path: json!({"steps": []}),
        transaction_hash: Some(hash(0x7b, 0x01)),
        unicity_certificate: None,
    }
}
