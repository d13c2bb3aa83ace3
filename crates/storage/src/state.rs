// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted handler state and status.
//!
//! `config/HandlerState` is plain text, `config/HandlerStatus` is JSON.
//! Writes are best-effort: a handler whose state file cannot be written is
//! in trouble, but failing the whole pass over it would lose the status of
//! every other handler, so failures are logged and swallowed.

use std::fs;
use std::path::Path;

use tracing::{error, warn};

use vext_core::{HandlerState, HandlerStatus};

use crate::paths::HandlerPaths;

/// Read the persisted handler state. A missing file means the handler was
/// never installed.
pub fn get_handler_state(paths: &HandlerPaths) -> HandlerState {
    let state_file = paths.state_file();
    if !state_file.is_file() {
        return HandlerState::NotInstalled;
    }
    match fs::read_to_string(&state_file) {
        Ok(text) => HandlerState::parse(&text),
        Err(e) => {
            error!(handler = %paths.full_name(), error = %e, "failed to read handler state");
            HandlerState::NotInstalled
        }
    }
}

/// Persist the handler state, creating the config dir if needed.
pub fn set_handler_state(paths: &HandlerPaths, state: HandlerState) {
    let conf_dir = paths.conf_dir();
    if let Err(e) = create_private_dir(&conf_dir) {
        error!(handler = %paths.full_name(), error = %e, "failed to create config dir");
        return;
    }
    if let Err(e) = fs::write(paths.state_file(), state.as_str()) {
        error!(handler = %paths.full_name(), error = %e, "failed to set handler state");
    }
}

/// Read the persisted handler status record, if any.
pub fn get_handler_status(paths: &HandlerPaths) -> Option<HandlerStatus> {
    let status_file = paths.status_record_file();
    if !status_file.is_file() {
        return None;
    }
    let text = match fs::read_to_string(&status_file) {
        Ok(text) => text,
        Err(e) => {
            error!(handler = %paths.full_name(), error = %e, "failed to read handler status");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(status) => Some(status),
        Err(e) => {
            error!(handler = %paths.full_name(), error = %e, "malformed handler status record");
            None
        }
    }
}

/// Persist the handler status record.
pub fn set_handler_status(paths: &HandlerPaths, status: &HandlerStatus) {
    let conf_dir = paths.conf_dir();
    if let Err(e) = create_private_dir(&conf_dir) {
        error!(handler = %paths.full_name(), error = %e, "failed to create config dir");
        return;
    }
    let json = match serde_json::to_string(status) {
        Ok(json) => json,
        Err(e) => {
            error!(handler = %paths.full_name(), error = %e, "failed to serialize handler status");
            return;
        }
    };
    if let Err(e) = fs::write(paths.status_record_file(), json) {
        error!(handler = %paths.full_name(), error = %e, "failed to save handler status");
    }
}

/// Create a directory (and parents) with mode 0700.
pub(crate) fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

/// Migrate handler state from the legacy agent-owned `handler_state/`
/// directory into each handler's own config directory.
///
/// Earlier layouts kept `handler_state/<FullName>/{state,status}` under the
/// library root; the files move to `<FullName>/config/Handler{State,Status}`
/// when the destination does not already exist. The legacy directory is
/// removed afterwards. Never fatal.
pub fn migrate_handler_state(lib_dir: &Path) {
    let legacy_root = lib_dir.join("handler_state");
    if !legacy_root.is_dir() {
        return;
    }

    let entries = match fs::read_dir(&legacy_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "failed to scan legacy handler state dir");
            return;
        }
    };

    for entry in entries.flatten() {
        let handler = entry.file_name();
        let handler_conf = lib_dir.join(&handler).join("config");
        if !handler_conf.is_dir() {
            continue;
        }
        for (legacy_name, new_name) in [("state", "HandlerState"), ("status", "HandlerStatus")] {
            let from = entry.path().join(legacy_name);
            let to = handler_conf.join(new_name);
            if !from.is_file() || to.is_file() {
                continue;
            }
            if let Err(e) = fs::rename(&from, &to) {
                warn!(
                    handler = %handler.to_string_lossy(),
                    file = legacy_name,
                    error = %e,
                    "failed to migrate legacy handler state file"
                );
            }
        }
    }

    if let Err(e) = fs::remove_dir_all(&legacy_root) {
        warn!(path = %legacy_root.display(), error = %e, "failed to remove legacy handler state dir");
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
