// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Spool-directory messaging.
//!
//! Deliveries are written as `outgoing/<recipient>/<event-id>.json`, where the
//! event id is the SHA-256 of the payload, so resending the same payload is a
//! no-op. Nametag bindings live in `nametags.json`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use purse_core::Hex;
use purse_sync::{BoxFuture, Messaging, MessagingError};
use serde_json::Value;

use super::{content_id, write_atomic};

const NAMETAGS_FILE: &str = "nametags.json";

pub struct SpoolMessaging {
    dir: PathBuf,
}

impl SpoolMessaging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SpoolMessaging { dir: dir.into() }
    }

    /// Path a delivery to `recipient` with `event_id` is written to.
    pub fn delivery_path(&self, recipient: &Hex, event_id: &str) -> PathBuf {
        self.dir.join("outgoing").join(recipient.as_str()).join(format!("{event_id}.json"))
    }

    fn deliver_now(&self, recipient: &Hex, payload: &Value) -> Result<String, MessagingError> {
        let bytes = serde_json::to_vec_pretty(payload).map_err(|e| MessagingError::Rejected(e.to_string()))?;
        let event_id = content_id(&bytes);
        let path = self.delivery_path(recipient, &event_id);
        if !path.is_file() {
            write_atomic(&path, &bytes).map_err(|e| unavailable(&path, e))?;
        }
        tracing::debug!(recipient = %recipient, %event_id, "delivery spooled");
        Ok(event_id)
    }

    fn nametags(&self) -> Result<BTreeMap<String, Hex>, MessagingError> {
        let path = self.dir.join(NAMETAGS_FILE);
        match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| MessagingError::Unavailable(format!("corrupt {}: {}", path.display(), e))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(unavailable(&path, e)),
        }
    }

    fn publish_nametag_now(&self, name: &str, key: &Hex) -> Result<(), MessagingError> {
        let mut tags = self.nametags()?;
        match tags.get(name) {
            Some(bound) if bound == key => return Ok(()),
            Some(_) => return Err(MessagingError::Rejected(format!("nametag '{name}' is bound to another key"))),
            None => {}
        }
        tags.insert(name.to_string(), key.clone());
        let bytes = serde_json::to_vec_pretty(&tags).map_err(|e| MessagingError::Rejected(e.to_string()))?;
        let path = self.dir.join(NAMETAGS_FILE);
        write_atomic(&path, &bytes).map_err(|e| unavailable(&path, e))
    }
}

fn unavailable(path: &Path, e: io::Error) -> MessagingError {
    MessagingError::Unavailable(format!("{}: {}", path.display(), e))
}

impl Messaging for SpoolMessaging {
    fn deliver<'a>(&'a self, recipient: &'a Hex, payload: Value) -> BoxFuture<'a, Result<String, MessagingError>> {
        Box::pin(async move { self.deliver_now(recipient, &payload) })
    }

    fn resolve_nametag<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<Hex>, MessagingError>> {
        Box::pin(async move { Ok(self.nametags()?.get(name).cloned()) })
    }

    fn publish_nametag<'a>(&'a self, name: &'a str, key: &'a Hex) -> BoxFuture<'a, Result<(), MessagingError>> {
        Box::pin(async move { self.publish_nametag_now(name, key) })
    }
}

#[cfg(test)]
#[path = "spool_tests.rs"]
mod tests;
