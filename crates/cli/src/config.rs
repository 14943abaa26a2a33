// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wallet configuration management.
//!
//! Configuration is stored in `purse.toml` and includes:
//! - `owner`: address, public key, pointer name and optional nametag
//! - `store`: where the snapshot database and logs live
//! - `remote`: directory of the content-addressed replica (absent ⇒ local only)
//! - `messaging`: spool directory used to hand tokens to recipients
//! - `sync` / `breaker`: engine switches and circuit breaker thresholds
//!
//! Relative paths are resolved against the directory holding `purse.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use purse_core::{BreakerConfig, Hex};
use purse_sync::SyncConfig;

use crate::env;
use crate::error::{Error, Result};

pub const CONFIG_FILE_NAME: &str = "purse.toml";
const DB_FILE_NAME: &str = "purse.db";
const LOG_FILE_NAME: &str = "purse.log";
const LOCK_DIR_NAME: &str = "locks";
const SPOOL_DIR_NAME: &str = "spool";

/// Wallet configuration stored in `purse.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub owner: OwnerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Remote replica (optional - if absent, every sync runs in local mode).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub sync: SyncOptions,
    #[serde(default)]
    pub breaker: BreakerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerConfig {
    pub address: String,
    /// Hex-encoded public key.
    pub public_key: String,
    /// Name of the remote pointer. Defaults to the address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nametag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// State directory. Defaults to `$PURSE_STATE_DIR` or `~/.local/state/purse`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Spool directory. Defaults to `spool/` under the state directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    #[serde(default = "default_true")]
    pub deliver_transfers: bool,
    #[serde(default = "default_true")]
    pub publish_nametag: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions { deliver_transfers: true, publish_nametag: true }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Creates a configuration for a new wallet.
    pub fn new(address: String, public_key: &str) -> Result<Self> {
        if address.trim().is_empty() {
            return Err(Error::Config("owner address cannot be empty".to_string()));
        }
        let key = parse_hex("public key", public_key)?;
        Ok(Config {
            owner: OwnerConfig { address, public_key: key.to_string(), pointer: None, nametag: None },
            store: StoreConfig::default(),
            remote: None,
            messaging: MessagingConfig::default(),
            sync: SyncOptions::default(),
            breaker: BreakerConfig::default(),
        })
    }

    /// Loads configuration from a `purse.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.owner_key()?;
        Ok(config)
    }

    /// Saves configuration to a `purse.toml` file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn owner_key(&self) -> Result<Hex> {
        parse_hex("public key", &self.owner.public_key)
    }

    pub fn pointer_name(&self) -> &str {
        self.owner.pointer.as_deref().unwrap_or(&self.owner.address)
    }

    /// Returns true if a remote replica is configured.
    pub fn is_remote_mode(&self) -> bool {
        self.remote.is_some()
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            breaker: self.breaker,
            deliver_transfers: self.sync.deliver_transfers,
            publish_nametag: self.sync.publish_nametag,
        }
    }

    pub fn state_dir(&self, base: &Path) -> PathBuf {
        match &self.store.dir {
            Some(dir) => resolve(base, dir),
            None => default_state_dir(),
        }
    }

    pub fn db_path(&self, base: &Path) -> PathBuf {
        self.state_dir(base).join(DB_FILE_NAME)
    }

    pub fn log_path(&self, base: &Path) -> PathBuf {
        self.state_dir(base).join(LOG_FILE_NAME)
    }

    pub fn lock_dir(&self, base: &Path) -> PathBuf {
        self.state_dir(base).join(LOCK_DIR_NAME)
    }

    pub fn spool_dir(&self, base: &Path) -> PathBuf {
        match &self.messaging.dir {
            Some(dir) => resolve(base, dir),
            None => self.state_dir(base).join(SPOOL_DIR_NAME),
        }
    }

    pub fn remote_dir(&self, base: &Path) -> Option<PathBuf> {
        self.remote.as_ref().map(|r| resolve(base, &r.dir))
    }
}

/// Parses a hex field, naming it in the error.
pub fn parse_hex(field: &'static str, value: &str) -> Result<Hex> {
    match Hex::parse(value.trim()) {
        Ok(hex) if !hex.is_empty() => Ok(hex),
        _ => Err(Error::InvalidHex { field, value: value.to_string() }),
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Default state directory when `purse.toml` does not name one.
pub fn default_state_dir() -> PathBuf {
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join("purse");
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state/purse"))
        .unwrap_or_else(|| PathBuf::from(".local/state/purse"))
}

/// Finds `purse.toml` by walking up from `start`.
pub fn find_config(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(Error::NotInitialized);
        }
    }
}

/// Picks the config file: an explicit path, then `$PURSE_CONFIG`, then a
/// search upwards from the current directory.
pub fn locate_config(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit.map(Path::to_path_buf).or_else(env::config_path) {
        if path.is_file() {
            return Ok(path);
        }
        return Err(Error::Config(format!("config file not found: {}", path.display())));
    }
    find_config(&std::env::current_dir()?)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
