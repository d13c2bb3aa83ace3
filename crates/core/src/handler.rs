// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Goal-state handler model and the persisted handler state machine.

use serde::{Deserialize, Serialize};

use crate::error::ExtError;
use crate::version::HandlerVersion;

/// Sort key value meaning "no dependency participation".
pub const NO_SORT_KEY: i32 = -1;

/// File extension for handler packages.
pub const PKG_EXT: &str = ".zip";

/// One goal state fetched from the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalState {
    #[serde(default)]
    pub handlers: Vec<Handler>,
}

/// A goal-state extension handler: the unit the control plane asks the
/// agent to install, enable, disable, or uninstall.
///
/// `version` starts out as the requested version spec (possibly a family
/// like `1.2.*`) and is replaced with the decided concrete version once a
/// package has been selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    pub name: String,
    pub version: String,
    /// Raw target state string; parsed at dispatch time so an unknown
    /// target surfaces as a handler error, not a goal-state parse failure.
    #[serde(default = "default_target")]
    pub state: String,
    /// Dependency level for cross-handler sequencing; [`NO_SORT_KEY`] when
    /// the handler does not participate in sequencing.
    #[serde(default = "default_sort_key")]
    pub sort_key: i32,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

fn default_target() -> String {
    "enabled".to_string()
}

fn default_sort_key() -> i32 {
    NO_SORT_KEY
}

impl Handler {
    /// The `Name-Version` string identifying the on-disk directory.
    pub fn full_name(&self) -> String {
        format_full_name(&self.name, &self.version)
    }
}

crate::builder! {
    pub struct HandlerBuilder => Handler {
        into {
            name: String = "OSTCExtensions.ExampleHandlerLinux",
            version: String = "1.0.0",
            state: String = "enabled",
        }
        set {
            sort_key: i32 = NO_SORT_KEY,
            extensions: Vec<Extension> = Vec::new(),
        }
    }
}

/// A sub-extension within a handler, keyed by sequence number.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sequence_number: Option<i64>,
    #[serde(default)]
    pub public_settings: Option<serde_json::Value>,
    #[serde(default)]
    pub protected_settings: Option<String>,
    #[serde(default, rename = "protectedSettingsCertThumbprint")]
    pub certificate_thumbprint: Option<String>,
}

/// Target state the goal state assigns to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Enabled,
    Disabled,
    Uninstall,
}

impl TargetState {
    /// Parse the goal-state target string. Anything outside the known set
    /// is a handler error.
    pub fn parse(s: &str) -> Result<Self, ExtError> {
        match s {
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            "uninstall" => Ok(Self::Uninstall),
            other => Err(ExtError::extension(format!("Unknown ext handler state: {other}"))),
        }
    }
}

crate::simple_display! {
    TargetState {
        Enabled => "enabled",
        Disabled => "disabled",
        Uninstall => "uninstall",
    }
}

/// Persisted per-handler lifecycle state (`config/HandlerState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    NotInstalled,
    Installed,
    Enabled,
    Failed,
}

impl HandlerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInstalled => "NotInstalled",
            Self::Installed => "Installed",
            Self::Enabled => "Enabled",
            Self::Failed => "Failed",
        }
    }

    /// Parse persisted state text. Unrecognized content reads as `Failed`:
    /// the handler is present on disk (it must not be swept or re-counted
    /// as absent) but cannot be assumed enabled.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "NotInstalled" => Self::NotInstalled,
            "Installed" => Self::Installed,
            "Enabled" => Self::Enabled,
            _ => Self::Failed,
        }
    }
}

crate::simple_display! {
    HandlerState {
        NotInstalled => "NotInstalled",
        Installed => "Installed",
        Enabled => "Enabled",
        Failed => "Failed",
    }
}

/// Format the `Name-Version` directory name for a handler.
pub fn format_full_name(name: &str, version: &str) -> String {
    format!("{name}-{version}")
}

/// Parse a `Name-Version` directory name.
///
/// Handler names contain no `-`, so the split happens at the first dash;
/// the remainder must be a valid dotted numeric version.
pub fn parse_full_name(s: &str) -> Option<(String, HandlerVersion)> {
    let (name, version) = s.split_once('-')?;
    if name.is_empty() {
        return None;
    }
    let version = HandlerVersion::parse(version).ok()?;
    Some((name.to_string(), version))
}

/// Parse a `Name-Version.zip` package file name.
pub fn parse_pkg_name(s: &str) -> Option<(String, HandlerVersion)> {
    let stem = s.strip_suffix(PKG_EXT)?;
    parse_full_name(stem)
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
