// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! purse_cli - command-line front-end for the purse token wallet.
//!
//! Wires the sync engine from `purse-sync` to filesystem collaborators and
//! a SQLite snapshot store, driven by a `purse.toml` file.
//!
//! # Main Components
//!
//! - [`Config`] - Wallet configuration (owner, store, replica, messaging)
//! - [`backend`] - Directory replica, offline validator, spool messaging
//! - [`Error`] - Error types for all CLI operations
//!
//! # Example
//!
//! ```rust,ignore
//! use purse_cli::{run, Cli};
//! use clap::Parser;
//!
//! run(Cli::parse())?;
//! ```

mod cli;
mod commands;
mod display;
mod lock;
mod logging;

pub mod backend;
pub mod config;
pub mod env;
pub mod error;

#[cfg(test)]
mod test_support;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{Error, Result};

use std::path::Path;

use commands::init::InitOptions;
use commands::sync::SyncOptions;
use commands::Context;

/// Runs one parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Command::Init { address, public_key, pointer, nametag, remote, state_dir, path } => {
            logging::setup_logging(None);
            let options = InitOptions { address, public_key, pointer, nametag, remote, state_dir };
            commands::init::run(options, path)
        }
        Command::Sync { local, nametag_only, import, outbox, json } => {
            let ctx = open(config)?;
            commands::sync::run(&ctx, SyncOptions { local, nametag_only, import, outbox, json })
        }
        Command::Status { json } => commands::status::run(&open(config)?, json),
        Command::Outbox { json } => commands::outbox::run(&open(config)?, json),
        Command::Split { coin, amount, json } => commands::split::run(&open(config)?, &coin, amount, json),
    }
}

/// Opens the wallet and routes logs to its state directory.
fn open(config: Option<&Path>) -> Result<Context> {
    let ctx = Context::open(config)?;
    logging::setup_logging(Some(&ctx.log_path()));
    Ok(ctx)
}
