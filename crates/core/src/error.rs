// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extension error taxonomy.
//!
//! Every error carries a numeric code from the fixed table in [`codes`];
//! the variant determines how the per-handler dispatcher reacts (download
//! errors feed the download gate, update errors skip telemetry because the
//! old handler version already reported them).

use thiserror::Error;

/// Numeric error codes surfaced in handler status.
pub mod codes {
    /// Default code for unclassified failures.
    pub const DEFAULT: i64 = -1;
    pub const PLUGIN_PROCESSING_ERROR: i64 = 1000;
    pub const PLUGIN_MANIFEST_DOWNLOAD_ERROR: i64 = 1001;
    pub const PLUGIN_SETTINGS_STATUS_INVALID: i64 = 1002;
    pub const PLUGIN_ENABLE_PROCESSING_FAILED: i64 = 1003;
    pub const PLUGIN_DISABLE_PROCESSING_FAILED: i64 = 1004;
    pub const PLUGIN_INSTALL_PROCESSING_FAILED: i64 = 1005;
    pub const PLUGIN_UPDATE_PROCESSING_FAILED: i64 = 1006;
    pub const PLUGIN_HANDLER_MANIFEST_NOT_FOUND: i64 = 1007;
    pub const PLUGIN_HANDLER_MANIFEST_DESERIALIZATION_ERROR: i64 = 1008;
}

/// Error from handling one extension handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtError {
    /// Generic extension failure (bad goal state, invalid manifest or
    /// settings, filesystem trouble).
    #[error("{message}")]
    Extension { message: String, code: i64 },

    /// Package resolution or download/unzip failure.
    #[error("{message}")]
    Download { message: String, code: i64 },

    /// A lifecycle command failed to launch or exited unsuccessfully.
    #[error("{message}")]
    Operation { message: String, code: i64 },

    /// An old-version command failed during an update; the old version has
    /// already reported the failure.
    #[error("{message}")]
    Update { message: String, code: i64 },
}

impl ExtError {
    pub fn extension(message: impl Into<String>) -> Self {
        Self::Extension { message: message.into(), code: codes::DEFAULT }
    }

    pub fn extension_with_code(code: i64, message: impl Into<String>) -> Self {
        Self::Extension { message: message.into(), code }
    }

    pub fn download(message: impl Into<String>) -> Self {
        Self::Download { message: message.into(), code: codes::DEFAULT }
    }

    pub fn download_with_code(code: i64, message: impl Into<String>) -> Self {
        Self::Download { message: message.into(), code }
    }

    pub fn operation(code: i64, message: impl Into<String>) -> Self {
        Self::Operation { message: message.into(), code }
    }

    pub fn update(code: i64, message: impl Into<String>) -> Self {
        Self::Update { message: message.into(), code }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Extension { code, .. }
            | Self::Download { code, .. }
            | Self::Operation { code, .. }
            | Self::Update { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Extension { message, .. }
            | Self::Download { message, .. }
            | Self::Operation { message, .. }
            | Self::Update { message, .. } => message,
        }
    }
}
