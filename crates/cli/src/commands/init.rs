// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::{Path, PathBuf};

use purse_core::Database;

use crate::config::{Config, RemoteConfig, CONFIG_FILE_NAME};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub address: String,
    pub public_key: String,
    pub pointer: Option<String>,
    pub nametag: Option<String>,
    pub remote: Option<String>,
    pub state_dir: Option<String>,
}

pub fn run(options: InitOptions, path: Option<PathBuf>) -> Result<()> {
    let target = match path {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    let config_path = run_impl(&target, options)?;
    let config = Config::load(&config_path)?;

    println!("Initialized wallet for {} at {}", config.owner.address, config_path.display());
    match config.remote_dir(&target) {
        Some(dir) => println!("Remote: {}", dir.display()),
        None => println!("Remote: none (syncs stay local)"),
    }
    Ok(())
}

/// Writes `purse.toml` into `dir` and creates the state it points at.
pub(crate) fn run_impl(dir: &Path, options: InitOptions) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        return Err(Error::AlreadyInitialized(config_path.display().to_string()));
    }

    let mut config = Config::new(options.address, &options.public_key)?;
    config.owner.pointer = options.pointer.filter(|p| !p.trim().is_empty());
    config.owner.nametag = options.nametag.filter(|n| !n.trim().is_empty());
    config.remote = options.remote.map(|dir| RemoteConfig { dir });
    config.store.dir = options.state_dir;

    if let Some(remote_dir) = config.remote_dir(dir) {
        fs::create_dir_all(remote_dir)?;
    }
    Database::open(&config.db_path(dir))?;
    config.save(&config_path)?;
    tracing::info!(owner = %config.owner.address, path = %config_path.display(), "wallet initialized");
    Ok(config_path)
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
