// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup.
//!
//! Filter directives come from `PURSE_LOG`, then `RUST_LOG`. Output goes to
//! the log file in the state directory at `info`; when no file can be opened
//! it goes to stderr at `warn`.

use std::fs;
use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::env;

fn filter(default: &str) -> EnvFilter {
    env::log_filter()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

pub fn setup_logging(log_path: Option<&Path>) {
    let file = log_path.and_then(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        fs::OpenOptions::new().create(true).append(true).open(path).ok()
    });

    // A subscriber may already be installed when running inside tests.
    let _ = match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter("info"))
            .with_writer(file)
            .with_ansi(false)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter("warn"))
            .with_writer(std::io::stderr)
            .try_init(),
    };
}
