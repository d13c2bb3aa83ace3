// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler manifest and handler environment files.
//!
//! `HandlerManifest.json` is publisher-supplied: a one-element JSON array
//! whose entry carries the lifecycle command strings and behavior flags.
//! `HandlerEnvironment.json` is agent-written and tells the extension where
//! its folders live.

use std::fs;

use serde::{Deserialize, Serialize};

use vext_core::{codes, ExtError};

use crate::paths::HandlerPaths;

/// Lifecycle commands and behavior flags from `HandlerManifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerManifest {
    pub install_command: String,
    pub uninstall_command: String,
    pub update_command: String,
    pub enable_command: String,
    pub disable_command: String,
    #[serde(default)]
    pub report_heartbeat: bool,
    #[serde(default)]
    pub update_mode: Option<String>,
    #[serde(default)]
    pub continue_on_update_failure: bool,
}

impl HandlerManifest {
    /// Whether the orchestrator must run `install` on the new version after
    /// an update. An absent `updateMode` means yes.
    pub fn is_update_with_install(&self) -> bool {
        match &self.update_mode {
            None => true,
            Some(mode) => mode.eq_ignore_ascii_case("updatewithinstall"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(rename = "handlerManifest")]
    handler_manifest: HandlerManifest,
}

/// Load the saved manifest for a handler.
pub fn load_manifest(paths: &HandlerPaths) -> Result<HandlerManifest, ExtError> {
    let man_file = paths.manifest_file();
    let text = fs::read_to_string(&man_file).map_err(|e| {
        ExtError::extension_with_code(
            codes::PLUGIN_HANDLER_MANIFEST_NOT_FOUND,
            format!("Failed to load manifest file ({}): {e}", man_file.display()),
        )
    })?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&text).map_err(|_| {
        ExtError::extension_with_code(
            codes::PLUGIN_HANDLER_MANIFEST_DESERIALIZATION_ERROR,
            format!("Malformed manifest file ({}).", man_file.display()),
        )
    })?;
    entries.into_iter().next().map(|e| e.handler_manifest).ok_or_else(|| {
        ExtError::extension_with_code(
            codes::PLUGIN_HANDLER_MANIFEST_DESERIALIZATION_ERROR,
            format!("Empty manifest file ({}).", man_file.display()),
        )
    })
}

/// `HandlerEnvironment.json` schema version.
const HANDLER_ENVIRONMENT_VERSION: f64 = 1.0;

#[derive(Debug, Serialize)]
struct HandlerEnvironmentEntry {
    name: String,
    version: f64,
    #[serde(rename = "handlerEnvironment")]
    handler_environment: HandlerEnvironmentFolders,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HandlerEnvironmentFolders {
    log_folder: String,
    config_folder: String,
    status_folder: String,
    heartbeat_file: String,
}

/// Write `HandlerEnvironment.json`: a one-element array naming the
/// handler's folders, schema version 1.0.
pub fn write_handler_env(paths: &HandlerPaths) -> Result<(), ExtError> {
    let env = [HandlerEnvironmentEntry {
        name: paths.name().to_string(),
        version: HANDLER_ENVIRONMENT_VERSION,
        handler_environment: HandlerEnvironmentFolders {
            log_folder: paths.log_dir().display().to_string(),
            config_folder: paths.conf_dir().display().to_string(),
            status_folder: paths.status_dir().display().to_string(),
            heartbeat_file: paths.heartbeat_file().display().to_string(),
        },
    }];
    let json = serde_json::to_string(&env)
        .map_err(|e| ExtError::download(format!("Failed to serialize handler environment: {e}")))?;
    fs::write(paths.env_file(), json)
        .map_err(|e| ExtError::download(format!("Failed to save handler environment: {e}")))
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
