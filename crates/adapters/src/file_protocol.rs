// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed goal-state protocol.
//!
//! Serves a goal state from a local JSON document, which makes the agent
//! operable without a control-plane endpoint (provisioning drops the file,
//! tests point it at a fixture). Package URIs may be `http(s)` mirrors or
//! local paths; reported VM status lands next to the goal state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use vext_core::{ExtensionStatus, GoalState, Handler, VmStatus};

use crate::protocol::{ArtifactsProfile, GoalStateProtocol, PackageList, ProtocolError};

/// Goal-state document layout:
///
/// ```json
/// {
///   "etag": "42",
///   "handlers": [ { "name": "...", "version": "1.*", "state": "enabled" } ],
///   "packages": { "Name": { "versions": [ { "version": "...", "uris": [...] } ] } },
///   "artifactsProfile": { "onHold": false }
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalStateDocument {
    #[serde(default)]
    etag: String,
    #[serde(flatten)]
    goal: GoalState,
    #[serde(default)]
    packages: HashMap<String, PackageList>,
    #[serde(default)]
    artifacts_profile: Option<ArtifactsProfile>,
}

/// Goal-state protocol reading from a local document.
pub struct FileProtocol {
    goal_state_path: PathBuf,
    client: reqwest::Client,
}

impl FileProtocol {
    pub fn new(goal_state_path: impl Into<PathBuf>) -> Self {
        Self {
            goal_state_path: goal_state_path.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn load(&self) -> Result<GoalStateDocument, ProtocolError> {
        let text = tokio::fs::read_to_string(&self.goal_state_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProtocolError::NotFound(format!(
                    "goal state document {} not found",
                    self.goal_state_path.display()
                ))
            } else {
                ProtocolError::Protocol(format!(
                    "failed to read goal state {}: {e}",
                    self.goal_state_path.display()
                ))
            }
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ProtocolError::Protocol(format!(
                "malformed goal state {}: {e}",
                self.goal_state_path.display()
            ))
        })
    }

    fn vm_status_path(&self) -> PathBuf {
        self.goal_state_path.with_file_name("vm_status.json")
    }
}

#[async_trait]
impl GoalStateProtocol for FileProtocol {
    async fn get_ext_handlers(&self) -> Result<(GoalState, String), ProtocolError> {
        let doc = self.load().await?;
        Ok((doc.goal, doc.etag))
    }

    async fn supports_overprovisioning(&self) -> bool {
        true
    }

    async fn get_artifacts_profile(&self) -> Result<Option<ArtifactsProfile>, ProtocolError> {
        Ok(self.load().await?.artifacts_profile)
    }

    async fn get_ext_handler_pkgs(&self, handler: &Handler) -> Result<PackageList, ProtocolError> {
        let doc = self.load().await?;
        Ok(doc.packages.get(&handler.name).cloned().unwrap_or_default())
    }

    async fn download_ext_handler_pkg(
        &self,
        uri: &str,
        dest: &Path,
    ) -> Result<(), ProtocolError> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let response = self
                .client
                .get(uri)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| ProtocolError::Protocol(format!("download of {uri} failed: {e}")))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProtocolError::Protocol(format!("download of {uri} failed: {e}")))?;
            tokio::fs::write(dest, &bytes)
                .await
                .map_err(|e| ProtocolError::Protocol(format!("failed to write {}: {e}", dest.display())))
        } else {
            tokio::fs::copy(uri, dest).await.map(|_| ()).map_err(|e| {
                ProtocolError::Protocol(format!("failed to copy package {uri}: {e}"))
            })
        }
    }

    async fn report_vm_status(&self, status: &VmStatus) -> Result<(), ProtocolError> {
        let json = serde_json::to_string_pretty(status)
            .map_err(|e| ProtocolError::Protocol(format!("failed to serialize vm status: {e}")))?;
        tokio::fs::write(self.vm_status_path(), json).await.map_err(|e| {
            ProtocolError::Protocol(format!(
                "failed to write vm status {}: {e}",
                self.vm_status_path().display()
            ))
        })
    }

    async fn report_ext_status(
        &self,
        handler_name: &str,
        ext_name: &str,
        status: &ExtensionStatus,
    ) -> Result<(), ProtocolError> {
        debug!(
            handler = handler_name,
            extension = ext_name,
            status = %status.status,
            "extension status reported"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_protocol_tests.rs"]
mod tests;
