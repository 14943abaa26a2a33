// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Parse a positive amount of the smallest coin unit.
fn positive_amount(s: &str) -> Result<u128, String> {
    match s.trim().parse::<u128>() {
        Ok(0) => Err("amount must be greater than zero".to_string()),
        Ok(amount) => Ok(amount),
        Err(_) => Err(format!("'{s}' is not a whole number")),
    }
}

#[derive(Parser)]
#[command(name = "purse")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline-first bearer-token wallet with replicated inventory")]
#[command(
    long_about = "Offline-first bearer-token wallet.\n\n\
    Keeps the token inventory in a local snapshot store and reconciles it with a\n\
    content-addressed replica so the wallet can be restored on another device."
)]
pub struct Cli {
    /// Path to purse.toml (default: search upwards from the current directory)
    #[arg(short = 'C', long = "config", global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create purse.toml for a wallet
    #[command(after_help = "\
Examples:
  purse init --address alice --public-key 02ab..      Local-only wallet
  purse init --address alice --public-key 02ab.. --remote /mnt/replica
  purse init --address alice --public-key 02ab.. --nametag alice --state-dir ./state")]
    Init {
        /// Owner address
        #[arg(long, value_parser = non_empty_string)]
        address: String,

        /// Owner public key (hex)
        #[arg(long, value_parser = non_empty_string)]
        public_key: String,

        /// Remote pointer name (default: the address)
        #[arg(long)]
        pointer: Option<String>,

        /// Nametag to bind to the public key
        #[arg(long)]
        nametag: Option<String>,

        /// Directory of the content-addressed replica
        #[arg(long, value_name = "dir")]
        remote: Option<String>,

        /// State directory for the snapshot database, logs and locks
        #[arg(long, value_name = "dir")]
        state_dir: Option<String>,

        /// Directory to write purse.toml into (default: current directory)
        #[arg(long, value_name = "dir")]
        path: Option<PathBuf>,
    },

    /// Reconcile the local inventory with the replica
    #[command(after_help = "\
Examples:
  purse sync                          Full sync with the replica
  purse sync --local                  Sync without touching the replica
  purse sync --import received.json   Add tokens from a file, then sync
  purse sync --nametag-only --json    Report the nametag binding only")]
    Sync {
        /// Skip the replica for this run
        #[arg(long)]
        local: bool,

        /// Only report the nametag binding
        #[arg(long, conflicts_with_all = ["local", "import", "outbox"])]
        nametag_only: bool,

        /// Import wire tokens from a JSON file (a token or an array of tokens)
        #[arg(long, value_name = "file")]
        import: Vec<PathBuf>,

        /// Queue outgoing transfers from a JSON file (an entry or an array of entries)
        #[arg(long, value_name = "file")]
        outbox: Vec<PathBuf>,

        /// Print the sync result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored inventory
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List outgoing transfers and pending mints
    Outbox {
        #[arg(long)]
        json: bool,
    },

    /// Plan which tokens would fund a payment
    #[command(after_help = "\
Examples:
  purse split --coin c001.. --amount 250")]
    Split {
        /// Coin id (hex)
        #[arg(long, value_parser = non_empty_string)]
        coin: String,

        /// Amount in the smallest coin unit
        #[arg(long, value_parser = positive_amount)]
        amount: u128,

        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
#[path = "../cli_tests.rs"]
mod tests;
