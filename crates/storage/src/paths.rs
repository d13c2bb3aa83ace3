// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk locations for one handler version.
//!
//! Layout under the library root, for handler `Name-Version`:
//!
//! ```text
//! <lib>/Name-Version/                     base
//! <lib>/Name-Version/config/             settings, HandlerState, HandlerStatus
//! <lib>/Name-Version/status/            <seq>.status written by the extension
//! <lib>/Name-Version/heartbeat.log
//! <lib>/Name-Version/HandlerManifest.json
//! <lib>/Name-Version/HandlerEnvironment.json
//! <lib>/Name-Version/mrseq
//! <lib>/Name-Version.zip                  transient package
//! <extlog>/Name/                          log dir, shared across versions
//! ```

use std::path::{Path, PathBuf};

use vext_core::{format_full_name, PKG_EXT};

/// Resolved filesystem locations for one `(Name, Version)` handler.
#[derive(Debug, Clone)]
pub struct HandlerPaths {
    lib_dir: PathBuf,
    log_root: PathBuf,
    name: String,
    version: String,
}

impl HandlerPaths {
    pub fn new(
        lib_dir: impl Into<PathBuf>,
        log_root: impl Into<PathBuf>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            lib_dir: lib_dir.into(),
            log_root: log_root.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// `Name-Version`
    pub fn full_name(&self) -> String {
        format_full_name(&self.name, &self.version)
    }

    pub fn base_dir(&self) -> PathBuf {
        self.lib_dir.join(self.full_name())
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.base_dir().join("config")
    }

    pub fn status_dir(&self) -> PathBuf {
        self.base_dir().join("status")
    }

    pub fn heartbeat_file(&self) -> PathBuf {
        self.base_dir().join("heartbeat.log")
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.base_dir().join("HandlerManifest.json")
    }

    pub fn env_file(&self) -> PathBuf {
        self.base_dir().join("HandlerEnvironment.json")
    }

    pub fn mrseq_file(&self) -> PathBuf {
        self.base_dir().join("mrseq")
    }

    /// Log dir shared by every version of the handler name.
    pub fn log_dir(&self) -> PathBuf {
        self.log_root.join(&self.name)
    }

    pub fn state_file(&self) -> PathBuf {
        self.conf_dir().join("HandlerState")
    }

    pub fn status_record_file(&self) -> PathBuf {
        self.conf_dir().join("HandlerStatus")
    }

    pub fn settings_file(&self, sequence_number: i64) -> PathBuf {
        self.conf_dir().join(format!("{sequence_number}.settings"))
    }

    pub fn status_file(&self, sequence_number: i64) -> PathBuf {
        self.status_dir().join(format!("{sequence_number}.status"))
    }

    /// The handler package location under the library root.
    pub fn pkg_file(&self) -> PathBuf {
        self.lib_dir.join(format!("{}{}", self.full_name(), PKG_EXT))
    }

    /// Paths for a sibling version of the same handler name.
    pub fn sibling(&self, version: impl Into<String>) -> Self {
        Self {
            lib_dir: self.lib_dir.clone(),
            log_root: self.log_root.clone(),
            name: self.name.clone(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
