// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Assembling an exact payment from indivisible token balances.
//!
//! Preference order:
//! 1. a single token whose balance equals the target
//! 2. the first exact-sum combination of at most [`MAX_COMBINATION_SIZE`]
//!    tokens, searched smallest-first among the [`MAX_SEARCH_CANDIDATES`]
//!    largest balances below the target
//! 3. greedy smallest-first accumulation, splitting the token that would
//!    overshoot into the missing payment and change

use serde::Serialize;

use crate::binary::Hex;
use crate::error::{Error, Result};
use crate::token::Token;

pub const MAX_COMBINATION_SIZE: usize = 5;

/// Candidates the exact-combination search looks at.
pub const MAX_SEARCH_CANDIDATES: usize = 64;

/// A token that can contribute to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub token_id: Hex,
    pub amount: u128,
}

impl Candidate {
    pub fn new(token_id: Hex, amount: u128) -> Self {
        Candidate { token_id, amount }
    }
}

/// The one token that must be split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPortion {
    pub token: Candidate,
    /// Part sent to the recipient.
    pub split_amount: u128,
    /// Part returned to the owner as change.
    pub remainder_amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPlan {
    pub target: u128,
    /// Tokens sent whole.
    pub direct: Vec<Candidate>,
    pub split: Option<SplitPortion>,
}

impl SplitPlan {
    pub fn requires_split(&self) -> bool {
        self.split.is_some()
    }

    /// Sum of the whole tokens.
    pub fn direct_total(&self) -> u128 {
        self.direct.iter().map(|c| c.amount).sum()
    }
}

/// Plans a payment of `target` from `candidates`.
pub fn plan(candidates: &[Candidate], target: u128) -> Result<SplitPlan> {
    if target == 0 {
        return Err(Error::InvalidAmount("payment amount must be greater than zero".to_string()));
    }

    let mut sorted: Vec<Candidate> = candidates.iter().filter(|c| c.amount > 0).cloned().collect();
    sorted.sort_by(|a, b| a.amount.cmp(&b.amount).then_with(|| a.token_id.cmp(&b.token_id)));

    let available = sorted.iter().fold(0u128, |sum, c| sum.saturating_add(c.amount));
    if available < target {
        return Err(Error::InsufficientBalance { available, required: target });
    }

    if let Some(exact) = sorted.iter().find(|c| c.amount == target) {
        return Ok(SplitPlan { target, direct: vec![exact.clone()], split: None });
    }

    if let Some(direct) = find_exact(&sorted, target) {
        return Ok(SplitPlan { target, direct, split: None });
    }

    let mut direct = Vec::new();
    let mut running: u128 = 0;
    for candidate in &sorted {
        let missing = target - running;
        if candidate.amount <= missing {
            running += candidate.amount;
            direct.push(candidate.clone());
            if running == target {
                return Ok(SplitPlan { target, direct, split: None });
            }
            continue;
        }
        return Ok(SplitPlan {
            target,
            direct,
            split: Some(SplitPortion {
                token: candidate.clone(),
                split_amount: missing,
                remainder_amount: candidate.amount - missing,
            }),
        });
    }

    Err(Error::InsufficientBalance { available, required: target })
}

/// Smallest exact-sum combination of 2 to [`MAX_COMBINATION_SIZE`] tokens,
/// searched over the largest [`MAX_SEARCH_CANDIDATES`] amounts below the
/// target.
fn find_exact(sorted: &[Candidate], target: u128) -> Option<Vec<Candidate>> {
    let below = sorted.partition_point(|c| c.amount < target);
    let pool = &sorted[below.saturating_sub(MAX_SEARCH_CANDIDATES)..below];
    let search = Search::new(pool);
    for size in 2..=MAX_COMBINATION_SIZE.min(pool.len()) {
        let mut chosen = Vec::with_capacity(size);
        if search.find(0, size, target, &mut chosen) {
            return Some(chosen.into_iter().map(|i| pool[i].clone()).collect());
        }
    }
    None
}

struct Search<'a> {
    pool: &'a [Candidate],
    /// `largest[k]` is the sum of the `k` largest amounts.
    largest: Vec<u128>,
}

impl<'a> Search<'a> {
    fn new(pool: &'a [Candidate]) -> Self {
        let mut largest = vec![0u128];
        for candidate in pool.iter().rev().take(MAX_COMBINATION_SIZE) {
            let last = largest.last().copied().unwrap_or(0);
            largest.push(last.saturating_add(candidate.amount));
        }
        Search { pool, largest }
    }

    /// Depth-first search over ascending candidates from `start` for `size`
    /// items summing to `remaining`. Indices are pushed onto `chosen`.
    fn find(&self, start: usize, size: usize, remaining: u128, chosen: &mut Vec<usize>) -> bool {
        if size == 0 {
            return remaining == 0;
        }
        if self.pool.len() < start + size || self.largest.get(size).is_none_or(|max| *max < remaining) {
            return false;
        }
        if size == 1 {
            let at = start + self.pool[start..].partition_point(|c| c.amount < remaining);
            if self.pool.get(at).is_some_and(|c| c.amount == remaining) {
                chosen.push(at);
                return true;
            }
            return false;
        }
        for i in start..=self.pool.len() - size {
            let lowest = self.pool[i..i + size].iter().fold(0u128, |sum, c| sum.saturating_add(c.amount));
            if lowest > remaining {
                break;
            }
            chosen.push(i);
            if self.find(i + 1, size - 1, remaining - self.pool[i].amount, chosen) {
                return true;
            }
            chosen.pop();
        }
        false
    }
}

/// Plans a payment from active tokens carrying `coin_id`. Tokens with an
/// unproved transaction are not spendable and are skipped.
pub fn plan_for_tokens<'a>(tokens: impl IntoIterator<Item = &'a Token>, coin_id: &Hex, target: u128) -> Result<SplitPlan> {
    let candidates: Vec<Candidate> = tokens
        .into_iter()
        .filter(|t| !t.has_pending_transaction())
        .filter_map(|t| Some(Candidate::new(t.token_id().clone(), t.balance(coin_id)?)))
        .collect();
    plan(&candidates, target)
}

#[cfg(test)]
#[path = "split_tests.rs"]
mod tests;
