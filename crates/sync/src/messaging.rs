// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Messaging collaborator used to hand tokens to recipients and to publish
//! the owner's nametag binding.

use purse_core::Hex;
use serde_json::Value;

use crate::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessagingError {
    #[error("messaging unavailable: {0}")]
    Unavailable(String),

    #[error("message rejected: {0}")]
    Rejected(String),
}

pub trait Messaging: Send + Sync {
    /// Sends `payload` to the holder of `recipient` and returns the event id.
    fn deliver<'a>(&'a self, recipient: &'a Hex, payload: Value) -> BoxFuture<'a, Result<String, MessagingError>>;

    /// Looks up the key bound to a nametag.
    fn resolve_nametag<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<Hex>, MessagingError>>;

    fn publish_nametag<'a>(&'a self, name: &'a str, key: &'a Hex) -> BoxFuture<'a, Result<(), MessagingError>>;
}
