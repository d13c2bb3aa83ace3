// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-extension settings files and sequence-number bookkeeping.

use std::fs;

use serde::Serialize;
use tracing::{info, warn};

use vext_core::{ExtError, Extension};

use crate::paths::HandlerPaths;
use crate::state::create_private_dir;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDocument {
    runtime_settings: Vec<RuntimeSettings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeSettings {
    handler_settings: HandlerSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HandlerSettings {
    public_settings: Option<serde_json::Value>,
    protected_settings: Option<String>,
    #[serde(rename = "protectedSettingsCertThumbprint")]
    protected_settings_cert_thumbprint: Option<String>,
}

/// Write the goal-state settings into the handler's config dir, one
/// `<seq>.settings` file per extension.
///
/// A handler with no extensions gets an empty `0.settings`; extensions
/// predating per-extension settings expect the file to exist.
pub fn update_settings(paths: &HandlerPaths, extensions: &[Extension]) -> Result<(), ExtError> {
    create_private_dir(&paths.conf_dir())
        .map_err(|e| ExtError::extension(format!("Failed to create config dir: {e}")))?;

    if extensions.is_empty() {
        info!(handler = %paths.full_name(), "extension has no settings, writing empty 0.settings");
        return write_settings_file(paths, 0, "");
    }

    for ext in extensions {
        let seq = ext.sequence_number.unwrap_or(0);
        let doc = SettingsDocument {
            runtime_settings: vec![RuntimeSettings {
                handler_settings: HandlerSettings {
                    public_settings: ext.public_settings.clone(),
                    protected_settings: ext.protected_settings.clone(),
                    protected_settings_cert_thumbprint: ext.certificate_thumbprint.clone(),
                },
            }],
        };
        let json = serde_json::to_string(&doc)
            .map_err(|e| ExtError::extension(format!("Failed to serialize settings: {e}")))?;
        write_settings_file(paths, seq, &json)?;
    }
    Ok(())
}

fn write_settings_file(paths: &HandlerPaths, seq: i64, contents: &str) -> Result<(), ExtError> {
    let settings_file = paths.settings_file(seq);
    fs::write(&settings_file, contents)
        .map_err(|e| ExtError::extension(format!("Failed to update settings file: {e}")))
}

/// Largest integer prefix among `<n>.settings` files in the config dir;
/// `-1` when there are none.
pub fn largest_seq_no(paths: &HandlerPaths) -> i64 {
    let mut seq_no = -1;
    let entries = match fs::read_dir(paths.conf_dir()) {
        Ok(entries) => entries,
        Err(_) => return seq_no,
    };
    for entry in entries.flatten() {
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.strip_suffix(".settings").is_none() {
            continue;
        }
        // The sequence number is the leading integer of the file name.
        let Some(prefix) = name.split('.').next() else {
            continue;
        };
        match prefix.parse::<i64>() {
            Ok(n) if n > seq_no => seq_no = n,
            _ => {}
        }
    }
    seq_no
}

/// Copy the `mrseq` marker and every status file from the old handler
/// version into the new one's directories during an upgrade.
pub fn copy_status_files(old: &HandlerPaths, new: &HandlerPaths) -> Result<(), ExtError> {
    let old_mrseq = old.mrseq_file();
    if old_mrseq.is_file() {
        fs::copy(&old_mrseq, new.mrseq_file())
            .map_err(|e| ExtError::extension(format!("Failed to copy mrseq: {e}")))?;
    }

    let old_status_dir = old.status_dir();
    if !old_status_dir.is_dir() {
        return Ok(());
    }
    let new_status_dir = new.status_dir();
    let entries = fs::read_dir(&old_status_dir)
        .map_err(|e| ExtError::extension(format!("Failed to scan status dir: {e}")))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let dest = new_status_dir.join(entry.file_name());
        if let Err(e) = fs::copy(&path, &dest) {
            warn!(
                from = %path.display(),
                to = %dest.display(),
                error = %e,
                "failed to copy status file"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
