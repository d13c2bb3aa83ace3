// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.

use std::path::PathBuf;

/// Configuration file location: `VEXT_CONF` > `/etc/vext/vext.toml`.
pub fn conf_path() -> PathBuf {
    match std::env::var("VEXT_CONF") {
        Ok(path) => PathBuf::from(path),
        Err(_) => PathBuf::from("/etc/vext/vext.toml"),
    }
}

/// Log filter: `VEXT_LOG` > `RUST_LOG` > "info".
pub fn log_filter() -> String {
    std::env::var("VEXT_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
