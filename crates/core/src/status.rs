// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status records surfaced to the control plane: per-extension status,
//! per-handler status, heartbeat, and the aggregate VM report.

use serde::{Deserialize, Serialize};

/// Status reported by an extension in its `<seq>.status` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtStatusKind {
    Transitioning,
    Error,
    Success,
    Warning,
}

impl ExtStatusKind {
    /// Terminal statuses end the sequencing wait for an extension.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Error | Self::Success)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transitioning" => Some(Self::Transitioning),
            "error" => Some(Self::Error),
            "success" => Some(Self::Success),
            "warning" => Some(Self::Warning),
            _ => None,
        }
    }
}

crate::simple_display! {
    ExtStatusKind {
        Transitioning => "transitioning",
        Error => "error",
        Success => "success",
        Warning => "warning",
    }
}

/// One entry of an extension's substatus list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSubStatus {
    #[serde(default)]
    pub name: Option<String>,
    pub status: ExtStatusKind,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// Normalized per-extension status, keyed by sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionStatus {
    #[serde(default)]
    pub name: Option<String>,
    pub sequence_number: i64,
    pub status: ExtStatusKind,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub configuration_applied_time: Option<String>,
    #[serde(default)]
    pub substatus: Vec<ExtensionSubStatus>,
}

impl ExtensionStatus {
    /// A fresh status for the given sequence number, not yet terminal.
    pub fn new(sequence_number: i64) -> Self {
        Self {
            name: None,
            sequence_number,
            status: ExtStatusKind::Transitioning,
            code: 0,
            message: None,
            operation: None,
            configuration_applied_time: None,
            substatus: Vec::new(),
        }
    }

    /// An `error` status carrying a code and message, used when the status
    /// file cannot be read or fails validation.
    pub fn error(sequence_number: i64, code: i64, message: impl Into<String>) -> Self {
        Self {
            status: ExtStatusKind::Error,
            code,
            message: Some(message.into()),
            ..Self::new(sequence_number)
        }
    }
}

/// Handler status value reported to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerStatusKind {
    Ready,
    NotReady,
    Installing,
    Unresponsive,
}

crate::simple_display! {
    HandlerStatusKind {
        Ready => "Ready",
        NotReady => "NotReady",
        Installing => "Installing",
        Unresponsive => "Unresponsive",
    }
}

/// Per-handler status persisted in `config/HandlerStatus` and surfaced in
/// the VM report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerStatus {
    pub name: String,
    pub version: String,
    pub status: HandlerStatusKind,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub extensions: Vec<ExtensionStatus>,
}

impl HandlerStatus {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            status: HandlerStatusKind::NotReady,
            code: 0,
            message: String::new(),
            extensions: Vec::new(),
        }
    }
}

/// Heartbeat document written by an extension into its base directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: HandlerStatusKind,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Agent-level portion of the VM report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmAgentStatus {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub extension_handlers: Vec<HandlerStatus>,
}

/// The aggregate VM status posted to the control plane each pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmStatus {
    pub vm_agent: VmAgentStatus,
}

impl VmStatus {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            vm_agent: VmAgentStatus {
                status: status.into(),
                message: message.into(),
                extension_handlers: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
