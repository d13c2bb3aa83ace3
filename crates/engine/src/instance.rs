// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One goal-state handler bound to its on-disk identity.
//!
//! A `HandlerInstance` exclusively owns its `Name-Version` tree for the
//! duration of a reconciliation pass: version decision, state and status
//! persistence, sequence-number resolution, extension status collection,
//! and removal all go through it.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use vext_adapters::{Context, Package, TelemetryEvent, TelemetryOp};
use vext_core::{
    parse_full_name, ExtError, ExtStatusKind, Extension, ExtensionStatus, Handler, HandlerState,
    HandlerStatus, HandlerStatusKind, HandlerVersion, Heartbeat, VersionSpec, AGENT_NAME,
    AGENT_VERSION,
};
use vext_storage::{HandlerManifest, HandlerPaths};

use crate::command_log::{self, CommandLog};

/// A goal-state handler spec bound to its on-disk directory tree.
pub struct HandlerInstance {
    pub(crate) ctx: Context,
    pub(crate) handler: Handler,
    pub(crate) paths: HandlerPaths,
    pub(crate) pkg: Option<Package>,
    pub(crate) pkg_file: Option<PathBuf>,
    pub(crate) is_upgrade: bool,
    pub(crate) operation: TelemetryOp,
    pub(crate) logger: CommandLog,
}

impl HandlerInstance {
    pub fn new(ctx: &Context, handler: Handler) -> Self {
        let paths = HandlerPaths::new(
            &ctx.conf.lib_dir,
            &ctx.conf.ext_log_dir,
            &handler.name,
            &handler.version,
        );
        let logger = command_log::for_handler(&ctx.conf.ext_log_dir, &handler.name);
        Self {
            ctx: ctx.clone(),
            handler,
            paths,
            pkg: None,
            pkg_file: None,
            is_upgrade: false,
            operation: TelemetryOp::ExtensionProcessing,
            logger,
        }
    }

    /// Bind an instance to a directory discovered on disk (sweeps and
    /// status reporting for handlers that left the goal state).
    pub fn from_disk(ctx: &Context, name: impl Into<String>, version: impl Into<String>) -> Self {
        let handler = Handler {
            name: name.into(),
            version: version.into(),
            state: String::new(),
            sort_key: vext_core::NO_SORT_KEY,
            extensions: Vec::new(),
        };
        Self::new(ctx, handler)
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn name(&self) -> &str {
        &self.handler.name
    }

    pub fn version(&self) -> &str {
        &self.handler.version
    }

    pub fn full_name(&self) -> String {
        self.handler.full_name()
    }

    pub fn paths(&self) -> &HandlerPaths {
        &self.paths
    }

    pub fn pkg(&self) -> Option<&Package> {
        self.pkg.as_ref()
    }

    pub fn is_upgrade(&self) -> bool {
        self.is_upgrade
    }

    pub fn set_operation(&mut self, op: TelemetryOp) {
        self.operation = op;
    }

    /// Re-key the instance to a concrete version once one is decided.
    fn set_version(&mut self, version: &str) {
        self.handler.version = version.to_string();
        self.paths = self.paths.sibling(version);
    }

    /// Resolve which package to use for the target state.
    ///
    /// Packages are sorted ascending by version; the selected package is
    /// the greatest one matching the requested version spec, the installed
    /// package the one equal to the installed version. `uninstall` and
    /// `disabled` targets pin the working version to the installed one.
    /// Returns `None` when no usable package exists.
    pub async fn decide_version(&mut self, target_state: &str) -> Result<Option<Package>, ExtError> {
        debug!(handler = %self.full_name(), "deciding which version to use");
        let pkg_list =
            self.ctx.protocol.get_ext_handler_pkgs(&self.handler).await.map_err(|e| {
                ExtError::extension(format!("Failed to get ext handler pkgs: {e}"))
            })?;

        let requested = VersionSpec::parse(&self.handler.version).map_err(|e| {
            ExtError::extension(format!(
                "Invalid requested version {}: {e}",
                self.handler.version
            ))
        })?;
        let installed_version = self.installed_version();

        let mut versions: Vec<(HandlerVersion, Package)> = pkg_list
            .versions
            .into_iter()
            .filter_map(|p| HandlerVersion::parse(&p.version).ok().map(|v| (v, p)))
            .collect();
        versions.sort_by(|a, b| a.0.cmp(&b.0));

        let mut selected_pkg: Option<Package> = None;
        let mut installed_pkg: Option<Package> = None;
        for (version, pkg) in &versions {
            if installed_version.as_ref() == Some(version) {
                installed_pkg = Some(pkg.clone());
            }
            if requested.matches(version) {
                selected_pkg = Some(pkg.clone());
            }
        }

        if target_state == "uninstall" || target_state == "disabled" {
            if installed_pkg.is_none() {
                warn!(
                    handler = %self.name(),
                    "failed to find installed version to uninstall"
                );
            }
            self.pkg = installed_pkg.clone();
            if let Some(installed) = &installed_version {
                let installed = installed.to_string();
                self.set_version(&installed);
            }
        } else {
            self.pkg = selected_pkg;
            if let Some(pkg) = &self.pkg {
                let version = pkg.version.clone();
                self.set_version(&version);
            }
        }

        self.is_upgrade = match (&installed_pkg, &self.pkg) {
            (None, _) => true,
            (Some(installed), Some(pkg)) => pkg.version != installed.version,
            (Some(_), None) => false,
        };

        if let Some(pkg) = &self.pkg {
            debug!(handler = %self.full_name(), version = %pkg.version, "using version");
        }
        Ok(self.pkg.clone())
    }

    /// Greatest installed version of this handler name, determined from
    /// the on-disk directories whose state is not `NotInstalled`.
    pub fn installed_version(&self) -> Option<HandlerVersion> {
        let mut latest: Option<HandlerVersion> = None;
        let entries = fs::read_dir(self.paths.lib_dir()).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let dir_name = entry.file_name();
            let Some((name, version)) = parse_full_name(&dir_name.to_string_lossy()) else {
                continue;
            };
            if name != self.handler.name {
                continue;
            }
            let candidate = self.paths.sibling(version.to_string());
            if vext_storage::get_handler_state(&candidate) == HandlerState::NotInstalled {
                debug!(path = %path.display(), "ignoring version of uninstalled extension");
                continue;
            }
            if latest.as_ref().map_or(true, |l| *l < version) {
                latest = Some(version);
            }
        }
        latest
    }

    /// An instance bound to the currently installed version, if any.
    pub fn installed_instance(&self) -> Option<HandlerInstance> {
        let installed = self.installed_version()?;
        let mut handler = self.handler.clone();
        handler.version = installed.to_string();
        Some(Self::new(&self.ctx, handler))
    }

    pub fn handler_state(&self) -> HandlerState {
        vext_storage::get_handler_state(&self.paths)
    }

    pub fn set_handler_state(&self, state: HandlerState) {
        vext_storage::set_handler_state(&self.paths, state);
    }

    pub fn handler_status(&self) -> Option<HandlerStatus> {
        vext_storage::get_handler_status(&self.paths)
    }

    /// Persist a fresh handler status record for this version.
    pub fn set_handler_status(&self, status: HandlerStatusKind, message: &str, code: i64) {
        let mut record = HandlerStatus::new(self.name(), self.version());
        record.status = status;
        record.message = message.to_string();
        record.code = code;
        vext_storage::set_handler_status(&self.paths, &record);
    }

    pub fn load_manifest(&self) -> Result<HandlerManifest, ExtError> {
        vext_storage::load_manifest(&self.paths)
    }

    pub fn update_settings(&self) -> Result<(), ExtError> {
        vext_storage::update_settings(&self.paths, &self.handler.extensions)
    }

    /// Emit a telemetry event attributed to this handler under the current
    /// operation.
    pub fn report_event(
        &self,
        message: &str,
        is_success: bool,
        duration_ms: Option<u64>,
        log_event: bool,
    ) {
        let mut event = TelemetryEvent::new(
            self.name(),
            self.version(),
            self.operation,
            is_success,
            message,
        )
        .with_log_event(log_event);
        if let Some(duration_ms) = duration_ms {
            event = event.with_duration(duration_ms);
        }
        self.ctx.telemetry.add_event(event);
    }

    /// Resolve the sequence number and status file for an extension.
    ///
    /// The goal-state sequence number wins when present (a mismatch with
    /// the largest on-disk settings file is reported); otherwise the disk
    /// decides; `-1` means no status exists.
    pub fn status_file_path(&self, extension: Option<&Extension>) -> (i64, Option<PathBuf>) {
        let mut seq_no = vext_storage::largest_seq_no(&self.paths);

        if let Some(goal_seq) = extension.and_then(|e| e.sequence_number) {
            if goal_seq != seq_no {
                self.ctx.telemetry.add_event(
                    TelemetryEvent::new(
                        AGENT_NAME,
                        AGENT_VERSION,
                        TelemetryOp::SequenceNumberMismatch,
                        false,
                        format!("Goal state: {goal_seq}, disk: {seq_no}"),
                    )
                    .with_log_event(false),
                );
            }
            seq_no = goal_seq;
        }

        if seq_no > -1 {
            (seq_no, Some(self.paths.status_file(seq_no)))
        } else {
            (seq_no, None)
        }
    }

    /// Load the normalized status for one extension; `None` when no
    /// sequence number exists at all.
    pub fn collect_ext_status(&self, extension: &Extension) -> Option<ExtensionStatus> {
        let (seq_no, status_file) = self.status_file_path(Some(extension));
        let status_file = status_file?;
        let mut status = vext_storage::load_ext_status(&status_file, seq_no);
        if status.name.is_none() {
            status.name = Some(extension.name.clone());
        }
        Some(status)
    }

    /// The handling status used by cross-handler sequencing.
    ///
    /// `None` when there is nothing to wait for; a missing status file is
    /// `warning` (non-terminal) so sequencing keeps waiting for it.
    pub fn get_ext_handling_status(&self, extension: &Extension) -> Option<ExtStatusKind> {
        let (_seq_no, status_file) = self.status_file_path(Some(extension));
        let status_file = status_file?;
        if !status_file.exists() {
            return Some(ExtStatusKind::Warning);
        }
        self.collect_ext_status(extension).map(|s| s.status)
    }

    /// Whether handling of the extension has finished, and with what
    /// status. A `None` status completes immediately (nothing to wait on).
    pub fn is_ext_handling_complete(&self, extension: &Extension) -> (bool, Option<ExtStatusKind>) {
        match self.get_ext_handling_status(extension) {
            None => (true, None),
            Some(status) if status.is_terminal() => (true, Some(status)),
            Some(status) => (false, Some(status)),
        }
    }

    /// Collect every extension's status, upload each through the protocol,
    /// and return them for attachment to the handler status.
    pub async fn collect_and_report_ext_statuses(&self) -> Vec<ExtensionStatus> {
        let mut collected = Vec::new();
        for ext in &self.handler.extensions {
            let Some(status) = self.collect_ext_status(ext) else { continue };
            if let Err(e) = self
                .ctx
                .protocol
                .report_ext_status(&self.handler.name, &ext.name, &status)
                .await
            {
                error!(
                    handler = %self.full_name(),
                    extension = %ext.name,
                    error = %e,
                    "failed to report extension status"
                );
            }
            collected.push(status);
        }
        collected
    }

    /// The handler's heartbeat, when its manifest opts in.
    pub fn collect_heartbeat(&self) -> Result<Option<Heartbeat>, ExtError> {
        let manifest = self.load_manifest()?;
        vext_storage::collect_heartbeat(&self.paths, &manifest)
    }

    /// Remove the handler's package and directory tree, then its resource
    /// accounting. Tolerates files vanishing underneath the removal
    /// (extensions may uninstall asynchronously).
    pub async fn remove(&self) {
        let pkg_file = self.paths.pkg_file();
        if pkg_file.is_file() {
            match fs::remove_file(&pkg_file) {
                Ok(()) => debug!(pkg = %pkg_file.display(), "removed extension package"),
                Err(e) => {
                    warn!(pkg = %pkg_file.display(), error = %e, "failed to remove extension package");
                }
            }
        }

        let base_dir = self.paths.base_dir();
        if base_dir.is_dir() {
            info!(dir = %base_dir.display(), "removing extension handler directory");
            match fs::remove_dir_all(&base_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    let message = format!("Failed to remove extension handler directory: {e}");
                    self.report_event(&message, false, None, true);
                    warn!(handler = %self.full_name(), "{message}");
                }
            }
        }

        self.ctx.exec.remove_extension_cgroups(&self.full_name()).await;
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
