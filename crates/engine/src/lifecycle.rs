// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle command phases: install, enable, disable, uninstall, update.
//!
//! Each phase resolves its command from the saved manifest, runs it
//! through the command-execution seam with a per-phase timeout and failure
//! code, and records the resulting state transition.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use vext_adapters::{ExtensionCommand, TelemetryOp};
use vext_core::{codes, ExtError, HandlerState, HandlerStatusKind};

use crate::instance::HandlerInstance;

pub const ENABLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DISABLE_TIMEOUT: Duration = Duration::from_secs(900);
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(900);
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(900);
pub const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Environment variables every lifecycle command receives.
pub const EXTENSION_PATH_VAR: &str = "AZURE_GUEST_AGENT_EXTENSION_PATH";
pub const EXTENSION_VERSION_VAR: &str = "AZURE_GUEST_AGENT_EXTENSION_VERSION";

/// Phase-conditional environment variables.
pub const DISABLE_FAILED_VAR: &str = "AZURE_GUEST_AGENT_DISABLE_FAILED";
pub const UNINSTALL_FAILED_VAR: &str = "AZURE_GUEST_AGENT_UNINSTALL_FAILED";
pub const VERSION_VAR: &str = "VERSION";

impl HandlerInstance {
    /// Run one manifest command inside the handler's base dir.
    ///
    /// The command joins onto the base dir with leading path separators
    /// stripped: some packagers begin commands with `/`, which must not be
    /// read as root-absolute. Output is captured to tempfiles in the base
    /// dir, appended to the per-handler command log, and reported as a
    /// duration telemetry event.
    pub(crate) async fn launch_command(
        &self,
        cmd: &str,
        timeout: Duration,
        error_code: i64,
        mut env: Vec<(String, String)>,
    ) -> Result<String, ExtError> {
        let started = Instant::now();
        debug!(handler = %self.full_name(), command = cmd, "launch command");

        let base_dir = self.paths.base_dir();
        let capture = || {
            tempfile::tempfile_in(&base_dir).map_err(|e| {
                ExtError::operation(error_code, format!("Failed to create capture file: {e}"))
            })
        };
        let stdout = capture()?;
        let stderr = capture()?;

        env.push((EXTENSION_PATH_VAR.to_string(), base_dir.display().to_string()));
        env.push((EXTENSION_VERSION_VAR.to_string(), self.version().to_string()));

        let full_command = base_dir.join(cmd.trim_start_matches('/')).display().to_string();
        let request = ExtensionCommand {
            extension_name: self.full_name(),
            command: full_command.clone(),
            timeout,
            cwd: base_dir,
            env,
            stdout,
            stderr,
            error_code,
        };

        match self.ctx.exec.start_extension_command(request).await {
            Ok(output) => {
                let duration = started.elapsed().as_millis() as u64;
                let log_msg = format!("{cmd}\n{output}");
                self.logger.append(&self.full_name(), &log_msg);
                self.report_event(&log_msg, true, Some(duration), false);
                Ok(output)
            }
            Err(e) => {
                let message = e.to_string();
                self.logger.append(&self.full_name(), &format!("{cmd}\n{message}"));
                Err(ExtError::operation(error_code, message))
            }
        }
    }

    pub async fn install(&mut self, uninstall_failed: bool) -> Result<(), ExtError> {
        let mut env = Vec::new();
        if uninstall_failed {
            env.push((UNINSTALL_FAILED_VAR.to_string(), "1".to_string()));
        }

        self.set_operation(TelemetryOp::Install);
        let man = self.load_manifest()?;
        info!(handler = %self.full_name(), command = %man.install_command, "install extension");
        self.launch_command(
            &man.install_command,
            INSTALL_TIMEOUT,
            codes::PLUGIN_INSTALL_PROCESSING_FAILED,
            env,
        )
        .await?;
        self.set_handler_state(HandlerState::Installed);
        Ok(())
    }

    pub async fn enable(&mut self, uninstall_failed: bool) -> Result<(), ExtError> {
        let mut env = Vec::new();
        if uninstall_failed {
            env.push((UNINSTALL_FAILED_VAR.to_string(), "1".to_string()));
        }

        self.set_operation(TelemetryOp::Enable);
        let man = self.load_manifest()?;
        info!(handler = %self.full_name(), command = %man.enable_command, "enable extension");
        self.launch_command(
            &man.enable_command,
            ENABLE_TIMEOUT,
            codes::PLUGIN_ENABLE_PROCESSING_FAILED,
            env,
        )
        .await?;
        self.set_handler_state(HandlerState::Enabled);
        self.set_handler_status(HandlerStatusKind::Ready, "Plugin enabled", 0);
        Ok(())
    }

    pub async fn disable(&mut self) -> Result<(), ExtError> {
        self.set_operation(TelemetryOp::Disable);
        let man = self.load_manifest()?;
        info!(handler = %self.full_name(), command = %man.disable_command, "disable extension");
        self.launch_command(
            &man.disable_command,
            DISABLE_TIMEOUT,
            codes::PLUGIN_DISABLE_PROCESSING_FAILED,
            Vec::new(),
        )
        .await?;
        self.set_handler_state(HandlerState::Installed);
        self.set_handler_status(HandlerStatusKind::NotReady, "Plugin disabled", 0);
        Ok(())
    }

    pub async fn uninstall(&mut self) -> Result<(), ExtError> {
        self.set_operation(TelemetryOp::UnInstall);
        let man = self.load_manifest()?;
        info!(handler = %self.full_name(), command = %man.uninstall_command, "uninstall extension");
        self.launch_command(
            &man.uninstall_command,
            UNINSTALL_TIMEOUT,
            codes::PLUGIN_PROCESSING_ERROR,
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Run the update command. `version` is the version being updated to,
    /// which on the downgrade path differs from this instance's own.
    /// A failure pins `HandlerState::Failed` so the update is not retried
    /// every pass.
    pub async fn update(&mut self, version: &str, disable_failed: bool) -> Result<(), ExtError> {
        let mut env = vec![(VERSION_VAR.to_string(), version.to_string())];
        if disable_failed {
            env.push((DISABLE_FAILED_VAR.to_string(), "1".to_string()));
        }

        self.set_operation(TelemetryOp::Update);
        let result = async {
            let man = self.load_manifest()?;
            info!(handler = %self.full_name(), command = %man.update_command, "update extension");
            self.launch_command(
                &man.update_command,
                UPDATE_TIMEOUT,
                codes::PLUGIN_UPDATE_PROCESSING_FAILED,
                env,
            )
            .await
        }
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.set_handler_state(HandlerState::Failed);
                Err(e)
            }
        }
    }

    /// Post-update install step: when the new manifest's `updateMode` is
    /// `UpdateWithInstall` (or absent), run `install`; either way the
    /// handler lands in `Installed`.
    pub async fn update_with_install(&mut self, uninstall_failed: bool) -> Result<(), ExtError> {
        let man = self.load_manifest()?;
        if man.is_update_with_install() {
            self.install(uninstall_failed).await?;
        } else {
            info!(
                handler = %self.full_name(),
                "UpdateWithInstall not set, skipping install during upgrade"
            );
        }
        self.set_handler_state(HandlerState::Installed);
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
