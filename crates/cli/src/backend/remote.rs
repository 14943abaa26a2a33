// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-backed remote store.
//!
//! Layout under the root:
//!
//! ```text
//! blobs/<sha256>            immutable snapshot bytes
//! pointers/<hex(name)>.json {"cid": "...", "sequence": N}
//! ```
//!
//! The root must already exist; a missing root reads as an unreachable
//! remote so the breaker sees it like a network outage.

use std::io;
use std::path::{Path, PathBuf};

use purse_sync::remote::RemoteResult;
use purse_sync::{BoxFuture, Published, RemoteError, RemoteStore, Resolved};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::write_atomic;

/// Content id of a blob: lowercase hex SHA-256.
pub fn content_id(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PointerRecord {
    cid: String,
    sequence: u64,
}

pub struct DirRemote {
    root: PathBuf,
}

impl DirRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirRemote { root: root.into() }
    }

    fn ensure_root(&self) -> RemoteResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable(format!("{} is not reachable", self.root.display())))
        }
    }

    fn blob_path(&self, cid: &str) -> RemoteResult<PathBuf> {
        let well_formed = cid.len() == 64 && cid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        if !well_formed {
            return Err(RemoteError::Rejected(format!("malformed content id '{cid}'")));
        }
        Ok(self.root.join("blobs").join(cid))
    }

    fn pointer_path(&self, pointer: &str) -> PathBuf {
        self.root.join("pointers").join(format!("{}.json", hex::encode(pointer.as_bytes())))
    }

    fn read_pointer(&self, pointer: &str) -> RemoteResult<Option<PointerRecord>> {
        let path = self.pointer_path(pointer);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RemoteError::Rejected(format!("corrupt pointer {pointer}: {e}")))
    }

    fn resolve_now(&self, pointer: &str) -> RemoteResult<Resolved> {
        self.ensure_root()?;
        match self.read_pointer(pointer)? {
            Some(record) => Ok(Resolved { cid: record.cid, sequence: record.sequence, content: None }),
            None => Err(RemoteError::NotFound(pointer.to_string())),
        }
    }

    fn fetch_now(&self, cid: &str) -> RemoteResult<Vec<u8>> {
        self.ensure_root()?;
        let path = self.blob_path(cid)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(RemoteError::NotFound(cid.to_string())),
            Err(e) => return Err(unavailable(&path, e)),
        };
        if content_id(&bytes) != cid {
            return Err(RemoteError::Rejected(format!("blob {cid} does not match its content id")));
        }
        Ok(bytes)
    }

    fn upload_now(&self, bytes: &[u8]) -> RemoteResult<String> {
        self.ensure_root()?;
        let cid = content_id(bytes);
        let path = self.blob_path(&cid)?;
        if !path.is_file() {
            write_atomic(&path, bytes).map_err(|e| unavailable(&path, e))?;
        }
        Ok(cid)
    }

    fn publish_now(&self, pointer: &str, cid: &str) -> RemoteResult<Published> {
        self.ensure_root()?;
        if !self.blob_path(cid)?.is_file() {
            return Err(RemoteError::Rejected(format!("cannot publish unknown blob {cid}")));
        }
        let sequence = self.read_pointer(pointer)?.map_or(0, |r| r.sequence) + 1;
        let record = PointerRecord { cid: cid.to_string(), sequence };
        let bytes = serde_json::to_vec(&record).map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let path = self.pointer_path(pointer);
        write_atomic(&path, &bytes).map_err(|e| unavailable(&path, e))?;

        let verified = self.read_pointer(pointer)?.is_some_and(|r| r.cid == cid);
        tracing::debug!(%pointer, %cid, sequence, verified, "pointer published");
        Ok(Published { sequence, verified })
    }
}

fn unavailable(path: &Path, e: io::Error) -> RemoteError {
    RemoteError::Unavailable(format!("{}: {}", path.display(), e))
}

impl RemoteStore for DirRemote {
    fn resolve<'a>(&'a self, pointer: &'a str) -> BoxFuture<'a, RemoteResult<Resolved>> {
        Box::pin(async move { self.resolve_now(pointer) })
    }

    fn fetch<'a>(&'a self, cid: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>> {
        Box::pin(async move { self.fetch_now(cid) })
    }

    fn upload(&self, bytes: Vec<u8>) -> BoxFuture<'_, RemoteResult<String>> {
        Box::pin(async move { self.upload_now(&bytes) })
    }

    fn publish<'a>(&'a self, pointer: &'a str, cid: &'a str) -> BoxFuture<'a, RemoteResult<Published>> {
        Box::pin(async move { self.publish_now(pointer, cid) })
    }
}

/// Stand-in used when no remote is configured. Every call fails as
/// unreachable; the CLI runs such wallets in local mode.
pub struct Offline;

impl Offline {
    fn error() -> RemoteError {
        RemoteError::Unavailable("no remote configured".to_string())
    }
}

impl RemoteStore for Offline {
    fn resolve<'a>(&'a self, _pointer: &'a str) -> BoxFuture<'a, RemoteResult<Resolved>> {
        Box::pin(async { Err(Offline::error()) })
    }

    fn fetch<'a>(&'a self, _cid: &'a str) -> BoxFuture<'a, RemoteResult<Vec<u8>>> {
        Box::pin(async { Err(Offline::error()) })
    }

    fn upload(&self, _bytes: Vec<u8>) -> BoxFuture<'_, RemoteResult<String>> {
        Box::pin(async { Err(Offline::error()) })
    }

    fn publish<'a>(&'a self, _pointer: &'a str, _cid: &'a str) -> BoxFuture<'a, RemoteResult<Published>> {
        Box::pin(async { Err(Offline::error()) })
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
