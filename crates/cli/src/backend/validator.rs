// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline token validator.
//!
//! Checks what can be checked without the aggregator: the state-hash chain
//! and the ordering of committed transactions. Spent-state queries need the
//! ledger, so nothing is ever reported spent.

use purse_core::codec::{validate_chain, StateHasher};
use purse_core::token::{sha256_json, TokenState};
use purse_core::{Hex, Token};
use purse_sync::{BoxFuture, SpentToken, TokenIssue, ValidationReport, Validator, ValidatorError};

#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl StructuralValidator {
    fn check(token: &Token) -> Result<(), String> {
        validate_chain(token).map_err(|e| e.to_string())?;
        let mut pending = false;
        for (index, tx) in token.transactions.iter().enumerate() {
            if tx.is_committed() && pending {
                return Err(format!("transaction {index} is committed after an uncommitted one"));
            }
            pending |= !tx.is_committed();
        }
        Ok(())
    }
}

impl StateHasher for StructuralValidator {
    fn state_hash(&self, token_id: &Hex, state: &TokenState) -> Hex {
        sha256_json(&(token_id, state))
    }
}

impl Validator for StructuralValidator {
    fn validate_all<'a>(&'a self, tokens: &'a [Token]) -> BoxFuture<'a, Result<ValidationReport, ValidatorError>> {
        Box::pin(async move {
            let mut report = ValidationReport::default();
            for token in tokens {
                match Self::check(token) {
                    Ok(()) => report.valid_tokens.push(token.token_id().clone()),
                    Err(reason) => {
                        report.issues.push(TokenIssue { token_id: token.token_id().clone(), reason })
                    }
                }
            }
            Ok(report)
        })
    }

    fn check_spent<'a>(
        &'a self,
        _tokens: &'a [Token],
        _owner_key: &'a Hex,
    ) -> BoxFuture<'a, Result<Vec<SpentToken>, ValidatorError>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
