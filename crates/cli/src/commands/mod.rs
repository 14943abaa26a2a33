// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod init;
pub mod outbox;
pub mod split;
pub mod status;
pub mod sync;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use purse_core::{Database, Hex, Snapshot, SnapshotStore, Stored, SystemClock};
use purse_sync::{Messaging, RemoteStore, SyncEngine};

use crate::backend::{DirRemote, Offline, SpoolMessaging, StructuralValidator};
use crate::config::{locate_config, Config};
use crate::error::{Error, Result};

/// Everything a command needs: the loaded config and the opened store.
pub struct Context {
    pub config: Config,
    /// Directory holding `purse.toml`; relative config paths resolve here.
    pub base: PathBuf,
    pub db: Arc<Database>,
}

impl Context {
    /// Locates and loads `purse.toml`, then opens the snapshot database.
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let path = locate_config(config_path)?;
        let config = Config::load(&path)?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let db = Database::open(&config.db_path(&base))?;
        Ok(Context { config, base, db: Arc::new(db) })
    }

    pub fn owner(&self) -> &str {
        &self.config.owner.address
    }

    pub fn owner_key(&self) -> Result<Hex> {
        self.config.owner_key()
    }

    pub fn log_path(&self) -> PathBuf {
        self.config.log_path(&self.base)
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.config.lock_dir(&self.base)
    }

    /// Builds an engine over the configured collaborators.
    pub fn engine(&self) -> SyncEngine {
        let remote: Arc<dyn RemoteStore> = match self.config.remote_dir(&self.base) {
            Some(dir) => Arc::new(DirRemote::new(dir)),
            None => Arc::new(Offline),
        };
        let messaging: Arc<dyn Messaging> = Arc::new(SpoolMessaging::new(self.config.spool_dir(&self.base)));
        let store: Arc<dyn SnapshotStore> = self.db.clone();
        SyncEngine::new(
            store,
            remote,
            Arc::new(StructuralValidator),
            messaging,
            Arc::new(SystemClock),
            self.config.sync_config(),
        )
    }

    /// The owner's stored snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        match self.db.load(self.owner())? {
            Stored::Found(snapshot) => Ok(snapshot),
            Stored::Missing => Err(Error::NoSnapshot(self.owner().to_string())),
            Stored::Corrupt { version, reason } => Err(Error::Core(purse_core::Error::CorruptedData(format!(
                "snapshot v{version} for {}: {reason}\n  hint: run 'purse sync' to quarantine and rebuild it",
                self.owner()
            )))),
        }
    }
}

/// Single-threaded runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}

/// Prints `value` as one line of JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
