// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed remote store abstraction.
//!
//! The remote keeps immutable blobs addressed by content id plus mutable
//! named pointers to them. Sequence numbers on pointers only detect
//! concurrent publishers; replica ordering uses the snapshot version.

use crate::BoxFuture;

/// Error type for remote store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The pointer or blob does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The store answered but refused the request.
    #[error("remote rejected request: {0}")]
    Rejected(String),

    #[error("remote timed out")]
    Timeout,
}

/// Result type for remote store operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Where a pointer currently points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub cid: String,
    pub sequence: u64,
    /// Inline content, when the store returns it with the pointer.
    pub content: Option<Vec<u8>>,
}

/// Outcome of moving a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    pub sequence: u64,
    /// The store read the pointer back and saw the new content id.
    pub verified: bool,
}

/// Remote replica primitives.
pub trait RemoteStore: Send + Sync {
    /// Resolves a pointer. Returns [`RemoteError::NotFound`] if it was never
    /// published.
    fn resolve<'a>(&'a self, pointer: &'a str) -> BoxFuture<'a, RemoteResult<Resolved>>;

    fn fetch<'a>(&'a self, cid: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>>;

    /// Stores a blob and returns its content id.
    fn upload(&self, bytes: Vec<u8>) -> BoxFuture<'_, RemoteResult<String>>;

    /// Points `pointer` at `cid`.
    fn publish<'a>(&'a self, pointer: &'a str, cid: &'a str) -> BoxFuture<'a, RemoteResult<Published>>;
}
