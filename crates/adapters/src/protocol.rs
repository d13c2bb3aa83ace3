// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Goal-state protocol seam.
//!
//! The wire client that talks to the control plane lives outside this
//! workspace; the orchestrator consumes it through this trait.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use vext_core::{ExtensionStatus, GoalState, Handler, VmStatus};

/// Errors from protocol operations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The endpoint is not there (yet). Status reporting treats this as
    /// log-only rather than event-worthy.
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Protocol(String),
}

/// One downloadable package version with its mirror URIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub version: String,
    #[serde(default)]
    pub uris: Vec<String>,
}

/// Package manifest for one handler name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageList {
    #[serde(default)]
    pub versions: Vec<Package>,
}

/// Per-VM artifacts profile carrying the overprovisioning hold flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsProfile {
    #[serde(default)]
    pub on_hold: bool,
}

impl ArtifactsProfile {
    pub fn is_on_hold(&self) -> bool {
        self.on_hold
    }
}

/// Control-plane operations the orchestrator consumes.
#[async_trait]
pub trait GoalStateProtocol: Send + Sync {
    /// Fetch the current goal state and its etag.
    async fn get_ext_handlers(&self) -> Result<(GoalState, String), ProtocolError>;

    /// Whether the protocol can report an artifacts profile at all.
    async fn supports_overprovisioning(&self) -> bool;

    /// The artifacts profile, when one exists for this VM.
    async fn get_artifacts_profile(&self) -> Result<Option<ArtifactsProfile>, ProtocolError>;

    /// Package versions available for a handler.
    async fn get_ext_handler_pkgs(&self, handler: &Handler) -> Result<PackageList, ProtocolError>;

    /// Download one package URI to the destination file.
    async fn download_ext_handler_pkg(&self, uri: &str, dest: &Path)
        -> Result<(), ProtocolError>;

    /// Upload the aggregate VM status.
    async fn report_vm_status(&self, status: &VmStatus) -> Result<(), ProtocolError>;

    /// Upload one extension's status.
    async fn report_ext_status(
        &self,
        handler_name: &str,
        ext_name: &str,
        status: &ExtensionStatus,
    ) -> Result<(), ProtocolError>;
}
