// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and configuration.
//!
//! Configuration is loaded once by the daemon and handed to components
//! through the adapter context; nothing reads it from globals.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Agent name used in telemetry and the status snapshot, and as the prefix
/// identifying the agent's own entries under the library directory.
pub const AGENT_NAME: &str = "vext";

/// Running agent version.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConf {
    /// Library root holding handler directories, packages, and the agent
    /// status snapshot.
    pub lib_dir: PathBuf,
    /// Root for per-handler extension log directories.
    pub ext_log_dir: PathBuf,
    /// Master switch for extension processing.
    pub extensions_enabled: bool,
    /// When set, the artifacts profile's on-hold flag defers processing.
    pub enable_overprovisioning: bool,
    /// Goal-state document location for the file-backed protocol; defaults
    /// to `goalstate.json` under the library root.
    pub goal_state_path: Option<PathBuf>,
    /// Seconds between reconciliation passes in the daemon loop.
    pub pass_interval_secs: u64,
}

impl Default for AgentConf {
    fn default() -> Self {
        Self {
            lib_dir: PathBuf::from("/var/lib/vext"),
            ext_log_dir: PathBuf::from("/var/log/vext"),
            extensions_enabled: true,
            enable_overprovisioning: false,
            goal_state_path: None,
            pass_interval_secs: 30,
        }
    }
}

impl AgentConf {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolved goal-state document path.
    pub fn goal_state_path(&self) -> PathBuf {
        self.goal_state_path
            .clone()
            .unwrap_or_else(|| self.lib_dir.join("goalstate.json"))
    }
}

#[cfg(test)]
#[path = "conf_tests.rs"]
mod tests;
