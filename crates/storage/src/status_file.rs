// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsing and validation of extension-written status and heartbeat files.
//!
//! Extensions report through `status/<seq>.status` (a one-element JSON
//! array) and optionally a `heartbeat.log` in their base dir. Both are
//! third-party input: every shape violation maps to a single settings-
//! invalid error rather than leaking key-access failures.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use serde::Deserialize;

use vext_core::{
    codes, ExtError, ExtStatusKind, ExtensionStatus, ExtensionSubStatus, HandlerStatusKind,
    Heartbeat,
};

use crate::manifest::HandlerManifest;
use crate::paths::HandlerPaths;

/// A heartbeat file older than this is unresponsive.
pub const HEARTBEAT_STALE_SECS: u64 = 600;

#[derive(Debug, Deserialize)]
struct StatusFileEntry {
    #[serde(default)]
    status: Option<StatusSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusSection {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    configuration_applied_time: Option<String>,
    #[serde(default)]
    formatted_message: Option<FormattedMessage>,
    #[serde(default)]
    substatus: Option<Vec<Option<SubStatusEntry>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubStatusEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    formatted_message: Option<FormattedMessage>,
}

#[derive(Debug, Deserialize)]
struct FormattedMessage {
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn invalid(message: impl Into<String>) -> ExtError {
    ExtError::extension_with_code(codes::PLUGIN_SETTINGS_STATUS_INVALID, message)
}

fn parse_formatted_message(fm: Option<FormattedMessage>) -> Result<Option<String>, ExtError> {
    let Some(fm) = fm else { return Ok(None) };
    if fm.lang.is_none() {
        return Err(invalid("Missing: formattedMessage/lang"));
    }
    match fm.message {
        Some(message) => Ok(Some(message)),
        None => Err(invalid("Missing: formattedMessage/message")),
    }
}

fn parse_substatus(entry: SubStatusEntry) -> Result<ExtensionSubStatus, ExtError> {
    let raw = entry.status.ok_or_else(|| invalid("Missing: substatus/status"))?;
    let status = ExtStatusKind::parse(&raw)
        .ok_or_else(|| invalid(format!("Invalid substatus/status: {raw}")))?;
    Ok(ExtensionSubStatus {
        name: entry.name,
        status,
        code: entry.code.unwrap_or(0),
        message: parse_formatted_message(entry.formatted_message)?,
    })
}

/// Parse and validate one `<seq>.status` document.
///
/// The outer shape is a one-element array; only the first element is
/// reported. An unknown top-level status string normalizes to `error`; a
/// missing required key is a settings-invalid error. Null substatus lists
/// and null entries inside them are tolerated.
pub fn parse_status_document(
    sequence_number: i64,
    text: &str,
) -> Result<ExtensionStatus, ExtError> {
    let entries: Vec<StatusFileEntry> =
        serde_json::from_str(text).map_err(|e| invalid(format!("{e}")))?;
    let entry = entries.into_iter().next().ok_or_else(|| invalid("Missing: status"))?;
    let section = entry.status.ok_or_else(|| invalid("Missing: status"))?;
    let raw_status = section.status.ok_or_else(|| invalid("Missing: status/status"))?;
    let status = ExtStatusKind::parse(&raw_status).unwrap_or(ExtStatusKind::Error);

    let mut result = ExtensionStatus::new(sequence_number);
    result.name = section.name;
    result.status = status;
    result.code = section.code.unwrap_or(0);
    result.operation = section.operation;
    result.configuration_applied_time = section.configuration_applied_time;
    result.message = parse_formatted_message(section.formatted_message)?;

    // Some extensions report an empty substatus as null; null entries
    // inside the list are skipped, not errored.
    for sub in section.substatus.unwrap_or_default().into_iter().flatten() {
        result.substatus.push(parse_substatus(sub)?);
    }
    Ok(result)
}

/// Load the status file for a sequence number, folding every failure mode
/// into an `error` status rather than propagating.
pub fn load_ext_status(path: &Path, sequence_number: i64) -> ExtensionStatus {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            return ExtensionStatus::error(
                sequence_number,
                codes::DEFAULT,
                format!("Failed to get status file: {e}"),
            );
        }
    };
    match parse_status_document(sequence_number, &text) {
        Ok(status) => status,
        Err(e) => ExtensionStatus::error(
            sequence_number,
            e.code(),
            format!("Malformed status file: {}", e.message()),
        ),
    }
}

/// Was the heartbeat file updated within the staleness window?
pub fn is_responsive(heartbeat_file: &Path) -> bool {
    let age = fs::metadata(heartbeat_file)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok());
    match age {
        Some(age) => age.as_secs() <= HEARTBEAT_STALE_SECS,
        None => false,
    }
}

#[derive(Debug, Deserialize)]
struct HeartbeatEntry {
    heartbeat: Heartbeat,
}

/// Collect the handler's heartbeat.
///
/// Returns `None` when the manifest does not opt into heartbeat reporting.
/// A stale file yields the synthetic unresponsive heartbeat without being
/// read; a missing or malformed file is an extension error.
pub fn collect_heartbeat(
    paths: &HandlerPaths,
    manifest: &HandlerManifest,
) -> Result<Option<Heartbeat>, ExtError> {
    if !manifest.report_heartbeat {
        return Ok(None);
    }
    let heartbeat_file = paths.heartbeat_file();
    if !heartbeat_file.is_file() {
        return Err(ExtError::extension("Failed to get heart beat file"));
    }
    if !is_responsive(&heartbeat_file) {
        return Ok(Some(Heartbeat {
            status: HandlerStatusKind::Unresponsive,
            code: -1,
            message: "Extension heartbeat is not responsive".to_string(),
        }));
    }
    let text = fs::read_to_string(&heartbeat_file)
        .map_err(|e| ExtError::extension(format!("Failed to get heartbeat file: {e}")))?;
    let entries: Vec<HeartbeatEntry> = serde_json::from_str(&text)
        .map_err(|e| ExtError::extension(format!("Malformed heartbeat file: {e}")))?;
    entries
        .into_iter()
        .next()
        .map(|e| Some(e.heartbeat))
        .ok_or_else(|| ExtError::extension("Malformed heartbeat file: empty document"))
}

/// Write the `transitioning` placeholder status at layout initialization
/// so the control plane sees work in progress before the extension's own
/// status appears.
pub fn write_placeholder_status(
    paths: &HandlerPaths,
    sequence_number: i64,
) -> std::io::Result<()> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let status = serde_json::json!({
        "version": 1.0,
        "timestampUTC": now,
        "status": {
            "name": paths.name(),
            "operation": "Enabling Handler",
            "status": "transitioning",
            "code": 0,
        }
    });
    fs::write(paths.status_file(sequence_number), status.to_string())
}

#[cfg(test)]
#[path = "status_file_tests.rs"]
mod tests;
