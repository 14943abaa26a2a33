// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory token representation.
//!
//! A token is identified by its 256-bit `tokenId` and consists of an
//! immutable genesis (mint payload plus inclusion proof), the current state,
//! an ordered list of transactions and integrity metadata. Only `state` and
//! `transactions` ever change, and only by appending a proved transaction.
//!
//! Chain invariant: `transactions[i].previousStateHash` equals
//! `transactions[i - 1].newStateHash`, and the first transaction starts from
//! the genesis state hash. A missing `previousStateHash` on the first
//! transaction is tolerated; the external validator performs the full
//! cryptographic check.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::binary::Hex;
use crate::error::ChainError;

/// Wire format version written into every encoded token.
pub const TOKEN_FORMAT_VERSION: &str = "2.0";

fn default_format_version() -> String {
    TOKEN_FORMAT_VERSION.to_string()
}

/// An indivisible coin amount.
///
/// Serialized as a decimal string; plain JSON numbers are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub u128);

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => s
                .trim()
                .parse::<u128>()
                .map(Amount)
                .map_err(|_| serde::de::Error::custom(format!("invalid amount '{s}'"))),
            Value::Number(n) => n
                .as_u64()
                .map(|v| Amount(u128::from(v)))
                .ok_or_else(|| serde::de::Error::custom(format!("invalid amount {n}"))),
            other => Err(serde::de::Error::custom(format!("invalid amount {other}"))),
        }
    }
}

/// One `[coinId, amount]` pair of a token's coin data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Hex, Amount)", into = "(Hex, Amount)")]
pub struct CoinBalance {
    pub coin_id: Hex,
    pub amount: Amount,
}

impl From<(Hex, Amount)> for CoinBalance {
    fn from((coin_id, amount): (Hex, Amount)) -> Self {
        CoinBalance { coin_id, amount }
    }
}

impl From<CoinBalance> for (Hex, Amount) {
    fn from(balance: CoinBalance) -> Self {
        (balance.coin_id, balance.amount)
    }
}

/// Signature material binding a state transition to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticator {
    pub algorithm: String,
    pub public_key: Hex,
    pub signature: Hex,
    pub state_hash: Hex,
}

/// Evidence that a state transition was accepted by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator: Option<Authenticator>,
    #[serde(default)]
    pub merkle_tree_path: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicity_certificate: Option<Hex>,
}

/// The mint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisData {
    pub token_id: Hex,
    pub token_type: Hex,
    #[serde(default)]
    pub coin_data: Vec<CoinBalance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_data: Option<String>,
    pub salt: Hex,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_data_hash: Option<Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Value>,
}

/// Immutable genesis of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    pub data: GenesisData,
    pub inclusion_proof: InclusionProof,
}

/// The current owner predicate plus opaque state data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    pub predicate: Hex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Hex>,
}

/// A state transition. `inclusion_proof` is `None` while uncommitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub previous_state_hash: Option<Hex>,
    #[serde(default)]
    pub new_state_hash: Option<Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Hex>,
    #[serde(default)]
    pub inclusion_proof: Option<InclusionProof>,
}

impl Transaction {
    /// Returns true once the ledger has accepted this transition.
    pub fn is_committed(&self) -> bool {
        self.inclusion_proof.is_some()
    }
}

/// Integrity metadata carried alongside the token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    #[serde(rename = "genesisDataJSONHash", default, skip_serializing_if = "Option::is_none")]
    pub genesis_data_hash: Option<Hex>,
    /// Cached current-state hash; only kept for genesis-only tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state_hash: Option<Hex>,
}

/// A bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(default = "default_format_version")]
    pub version: String,
    pub genesis: Genesis,
    pub state: TokenState,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nametags: Vec<Value>,
    #[serde(rename = "_integrity", default)]
    pub integrity: Integrity,
}

impl Token {
    /// Returns the immutable token identifier.
    pub fn token_id(&self) -> &Hex {
        &self.genesis.data.token_id
    }

    /// Number of transactions after genesis.
    pub fn chain_len(&self) -> usize {
        self.transactions.len()
    }

    /// Number of committed inclusion proofs, counting the genesis proof.
    pub fn committed_proofs(&self) -> usize {
        1 + self.transactions.iter().filter(|tx| tx.is_committed()).count()
    }

    /// Returns true if any transaction is still waiting for its proof.
    pub fn has_pending_transaction(&self) -> bool {
        self.transactions.iter().any(|tx| !tx.is_committed())
    }

    /// The state hash established by the genesis proof, if present.
    pub fn genesis_state_hash(&self) -> Option<&Hex> {
        self.genesis.inclusion_proof.authenticator.as_ref().map(|a| &a.state_hash)
    }

    /// The current state hash without consulting a hasher.
    ///
    /// For tokens with transactions this is the last `newStateHash`; for
    /// genesis-only tokens it is the cached value, if any.
    pub fn current_state_hash(&self) -> Option<&Hex> {
        match self.transactions.last() {
            Some(last) => last.new_state_hash.as_ref(),
            None => self.integrity.current_state_hash.as_ref(),
        }
    }

    /// Balance of the given coin, or `None` if the token does not carry it.
    pub fn balance(&self, coin_id: &Hex) -> Option<u128> {
        let mut found = false;
        let mut total: u128 = 0;
        for entry in self.genesis.data.coin_data.iter().filter(|c| &c.coin_id == coin_id) {
            found = true;
            total = total.saturating_add(entry.amount.0);
        }
        found.then_some(total)
    }

    /// SHA-256 over the canonical JSON of the genesis payload.
    pub fn compute_genesis_data_hash(&self) -> Hex {
        sha256_json(&self.genesis.data)
    }

    /// The cached genesis payload hash, computed when absent.
    pub fn genesis_data_hash(&self) -> Hex {
        self.integrity
            .genesis_data_hash
            .clone()
            .unwrap_or_else(|| self.compute_genesis_data_hash())
    }

    /// SHA-256 over the canonical JSON of the whole token.
    pub fn digest(&self) -> Hex {
        sha256_json(self)
    }

    /// Checks the state-hash link invariant.
    pub fn validate_chain(&self) -> Result<(), ChainError> {
        for (index, tx) in self.transactions.iter().enumerate() {
            if tx.new_state_hash.is_none() {
                return Err(ChainError::MissingNewHash { index });
            }

            if index == 0 {
                match (&tx.previous_state_hash, self.genesis_state_hash()) {
                    (Some(found), Some(expected)) if found != expected => {
                        return Err(ChainError::GenesisMismatch {
                            expected: expected.to_string(),
                            found: found.to_string(),
                        });
                    }
                    (None, _) => {
                        tracing::debug!(
                            token_id = %self.token_id(),
                            "first transaction has no previousStateHash, deferring to validator"
                        );
                    }
                    _ => {}
                }
                continue;
            }

            let expected = match &self.transactions[index - 1].new_state_hash {
                Some(hash) => hash,
                None => return Err(ChainError::MissingNewHash { index: index - 1 }),
            };
            match &tx.previous_state_hash {
                None => return Err(ChainError::MissingPreviousHash { index }),
                Some(found) if found != expected => {
                    return Err(ChainError::LinkMismatch {
                        index,
                        expected: expected.to_string(),
                        found: found.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// SHA-256 over the canonical JSON encoding of a value.
///
/// `serde_json` emits struct fields in declaration order and object keys in
/// sorted order, so the encoding is stable for equal values.
pub fn sha256_json<T: Serialize + ?Sized>(value: &T) -> Hex {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    Hex::from_bytes(&Sha256::digest(&bytes))
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
