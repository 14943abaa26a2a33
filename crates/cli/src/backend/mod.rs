// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed collaborators for the sync engine.
//!
//! - [`DirRemote`]: content-addressed replica in a shared directory
//! - [`StructuralValidator`]: offline token checks with SHA-256 state hashes
//! - [`SpoolMessaging`]: outgoing token deliveries written to a spool directory

mod remote;
mod spool;
mod validator;

pub use remote::{content_id, DirRemote, Offline};
pub use spool::SpoolMessaging;
pub use validator::StructuralValidator;

use std::io;
use std::path::Path;

/// Writes `bytes` next to `path` and renames it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
