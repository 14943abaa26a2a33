// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process owner lock.
//!
//! The engine serializes syncs for one owner inside a process; this file
//! lock extends that to concurrent `purse` invocations sharing a state
//! directory. The lock is released when the guard is dropped or the
//! process exits.

use std::fs;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Held exclusive lock on one owner's lock file.
#[derive(Debug)]
pub struct OwnerLock {
    file: fs::File,
    path: PathBuf,
}

impl OwnerLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OwnerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Lock file for `owner` under `dir`. Addresses are hex-encoded so any
/// character is safe in the file name.
pub fn lock_path(dir: &Path, owner: &str) -> PathBuf {
    dir.join(format!("{}.lock", hex::encode(owner.as_bytes())))
}

/// Takes the lock without waiting.
pub fn acquire(dir: &Path, owner: &str) -> Result<OwnerLock> {
    fs::create_dir_all(dir)?;
    let path = lock_path(dir, owner);
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;
    file.try_lock_exclusive()
        .map_err(|_| Error::OwnerLocked { owner: owner.to_string() })?;
    Ok(OwnerLock { file, path })
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
