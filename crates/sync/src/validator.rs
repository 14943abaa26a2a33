// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Token validation collaborator.
//!
//! Cryptographic verification lives outside this workspace. The engine only
//! needs a verdict per token, the set of tokens already spent on the ledger,
//! and state hashes for genesis-only tokens.

use purse_core::codec::StateHasher;
use purse_core::{Hex, Token};
use serde::{Deserialize, Serialize};

use crate::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidatorError {
    #[error("validator unavailable: {0}")]
    Unavailable(String),

    #[error("validator failed: {0}")]
    Failed(String),
}

/// A token the validator rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenIssue {
    pub token_id: Hex,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid_tokens: Vec<Hex>,
    pub issues: Vec<TokenIssue>,
}

/// A token state the ledger reports as spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpentToken {
    pub token_id: Hex,
    pub state_hash: Hex,
    /// Key of the token in the local active partition.
    pub local_id: Hex,
}

pub trait Validator: StateHasher {
    fn validate_all<'a>(&'a self, tokens: &'a [Token]) -> BoxFuture<'a, Result<ValidationReport, ValidatorError>>;

    fn check_spent<'a>(
        &'a self,
        tokens: &'a [Token],
        owner_key: &'a Hex,
    ) -> BoxFuture<'a, Result<Vec<SpentToken>, ValidatorError>>;
}
