// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters for tests: a scriptable protocol, a recording command
//! executor, a telemetry recorder, and a zip fixture builder.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use vext_core::{ExtensionStatus, GoalState, Handler, VmStatus};

use crate::command::{CommandError, CommandExecutor, ExtensionCommand};
use crate::protocol::{ArtifactsProfile, GoalStateProtocol, PackageList, ProtocolError};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Which error the fake protocol should return from an operation.
#[derive(Debug, Clone)]
pub enum FakeProtocolError {
    NotFound(String),
    Protocol(String),
}

impl FakeProtocolError {
    fn to_error(&self) -> ProtocolError {
        match self {
            Self::NotFound(msg) => ProtocolError::NotFound(msg.clone()),
            Self::Protocol(msg) => ProtocolError::Protocol(msg.clone()),
        }
    }
}

#[derive(Default)]
struct FakeProtocolState {
    goal: GoalState,
    etag: String,
    fetch_error: Option<String>,
    pkgs: HashMap<String, PackageList>,
    downloads: HashMap<String, Vec<u8>>,
    download_attempts: Vec<String>,
    vm_reports: Vec<VmStatus>,
    report_error: Option<FakeProtocolError>,
    ext_reports: Vec<(String, String, ExtensionStatus)>,
    supports_overprovisioning: bool,
    artifacts_profile: Option<ArtifactsProfile>,
}

/// Scriptable goal-state protocol for tests.
#[derive(Clone, Default)]
pub struct FakeProtocol {
    inner: Arc<Mutex<FakeProtocolState>>,
}

impl FakeProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_goal_state(&self, goal: GoalState, etag: impl Into<String>) {
        let mut state = self.inner.lock();
        state.goal = goal;
        state.etag = etag.into();
        state.fetch_error = None;
    }

    /// Make `get_ext_handlers` fail with the given message.
    pub fn set_fetch_error(&self, message: impl Into<String>) {
        self.inner.lock().fetch_error = Some(message.into());
    }

    pub fn set_pkgs(&self, handler_name: impl Into<String>, pkgs: PackageList) {
        self.inner.lock().pkgs.insert(handler_name.into(), pkgs);
    }

    /// Append one package version to a handler's package list.
    pub fn add_pkg_version(&self, handler_name: impl Into<String>, pkg: crate::protocol::Package) {
        self.inner.lock().pkgs.entry(handler_name.into()).or_default().versions.push(pkg);
    }

    /// Serve the given bytes for a package URI. URIs without bytes fail.
    pub fn add_download(&self, uri: impl Into<String>, bytes: Vec<u8>) {
        self.inner.lock().downloads.insert(uri.into(), bytes);
    }

    pub fn set_report_error(&self, error: Option<FakeProtocolError>) {
        self.inner.lock().report_error = error;
    }

    pub fn set_supports_overprovisioning(&self, supported: bool) {
        self.inner.lock().supports_overprovisioning = supported;
    }

    pub fn set_artifacts_profile(&self, profile: Option<ArtifactsProfile>) {
        self.inner.lock().artifacts_profile = profile;
    }

    /// Every URI handed to `download_ext_handler_pkg`, in order.
    pub fn download_attempts(&self) -> Vec<String> {
        self.inner.lock().download_attempts.clone()
    }

    pub fn vm_reports(&self) -> Vec<VmStatus> {
        self.inner.lock().vm_reports.clone()
    }

    pub fn ext_reports(&self) -> Vec<(String, String, ExtensionStatus)> {
        self.inner.lock().ext_reports.clone()
    }
}

#[async_trait]
impl GoalStateProtocol for FakeProtocol {
    async fn get_ext_handlers(&self) -> Result<(GoalState, String), ProtocolError> {
        let state = self.inner.lock();
        match &state.fetch_error {
            Some(msg) => Err(ProtocolError::Protocol(msg.clone())),
            None => Ok((state.goal.clone(), state.etag.clone())),
        }
    }

    async fn supports_overprovisioning(&self) -> bool {
        self.inner.lock().supports_overprovisioning
    }

    async fn get_artifacts_profile(&self) -> Result<Option<ArtifactsProfile>, ProtocolError> {
        Ok(self.inner.lock().artifacts_profile.clone())
    }

    async fn get_ext_handler_pkgs(&self, handler: &Handler) -> Result<PackageList, ProtocolError> {
        Ok(self.inner.lock().pkgs.get(&handler.name).cloned().unwrap_or_default())
    }

    async fn download_ext_handler_pkg(
        &self,
        uri: &str,
        dest: &Path,
    ) -> Result<(), ProtocolError> {
        let bytes = {
            let mut state = self.inner.lock();
            state.download_attempts.push(uri.to_string());
            state.downloads.get(uri).cloned()
        };
        match bytes {
            Some(bytes) => std::fs::write(dest, bytes)
                .map_err(|e| ProtocolError::Protocol(format!("write failed: {e}"))),
            None => Err(ProtocolError::Protocol(format!("no mirror serves {uri}"))),
        }
    }

    async fn report_vm_status(&self, status: &VmStatus) -> Result<(), ProtocolError> {
        let mut state = self.inner.lock();
        if let Some(err) = &state.report_error {
            return Err(err.to_error());
        }
        state.vm_reports.push(status.clone());
        Ok(())
    }

    async fn report_ext_status(
        &self,
        handler_name: &str,
        ext_name: &str,
        status: &ExtensionStatus,
    ) -> Result<(), ProtocolError> {
        self.inner.lock().ext_reports.push((
            handler_name.to_string(),
            ext_name.to_string(),
            status.clone(),
        ));
        Ok(())
    }
}

/// One recorded lifecycle command invocation.
#[derive(Debug, Clone)]
pub struct CommandCall {
    pub extension_name: String,
    pub command: String,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    pub error_code: i64,
}

impl CommandCall {
    /// Value of one environment addition, if present.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct FakeExecState {
    calls: Vec<CommandCall>,
    failures: Vec<(String, i32)>,
    created_cgroups: Vec<String>,
    removed_cgroups: Vec<String>,
}

/// Recording command executor with scripted failures.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeExecState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose resolved line contains `fragment` fail with the
    /// given exit code.
    pub fn fail_matching(&self, fragment: impl Into<String>, exit_code: i32) {
        self.inner.lock().failures.push((fragment.into(), exit_code));
    }

    pub fn calls(&self) -> Vec<CommandCall> {
        self.inner.lock().calls.clone()
    }

    /// The resolved command lines, in invocation order.
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().calls.iter().map(|c| c.command.clone()).collect()
    }

    pub fn created_cgroups(&self) -> Vec<String> {
        self.inner.lock().created_cgroups.clone()
    }

    pub fn removed_cgroups(&self) -> Vec<String> {
        self.inner.lock().removed_cgroups.clone()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn start_extension_command(
        &self,
        request: ExtensionCommand,
    ) -> Result<String, CommandError> {
        let mut state = self.inner.lock();
        state.calls.push(CommandCall {
            extension_name: request.extension_name.clone(),
            command: request.command.clone(),
            env: request.env.clone(),
            timeout: request.timeout,
            error_code: request.error_code,
        });
        let failure = state
            .failures
            .iter()
            .find(|(fragment, _)| request.command.contains(fragment))
            .map(|(_, exit_code)| *exit_code);
        match failure {
            Some(exit_code) => Err(CommandError::Failed {
                command: request.command,
                exit_code,
                output: String::new(),
            }),
            None => Ok(String::new()),
        }
    }

    async fn create_extension_cgroups(&self, full_name: &str) {
        self.inner.lock().created_cgroups.push(full_name.to_string());
    }

    async fn remove_extension_cgroups(&self, full_name: &str) {
        self.inner.lock().removed_cgroups.push(full_name.to_string());
    }
}

/// Telemetry recorder.
#[derive(Clone, Default)]
pub struct FakeTelemetry {
    inner: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl FakeTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.inner.lock().clone()
    }

    /// Events with the given symbolic operation name.
    pub fn events_for_op(&self, op: crate::telemetry::TelemetryOp) -> Vec<TelemetryEvent> {
        self.inner.lock().iter().filter(|e| e.op == op).cloned().collect()
    }
}

impl TelemetrySink for FakeTelemetry {
    fn add_event(&self, event: TelemetryEvent) {
        self.inner.lock().push(event);
    }
}

/// Build an in-memory zip archive from `(path, contents)` pairs, for use
/// as a package fixture.
#[allow(clippy::unwrap_used)]
pub fn make_package_zip(files: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// A minimal valid `HandlerManifest.json` body for package fixtures.
pub fn manifest_json(continue_on_update_failure: bool) -> String {
    format!(
        r#"[{{
    "name": "fixture",
    "version": 1.0,
    "handlerManifest": {{
        "installCommand": "bin/install.sh",
        "uninstallCommand": "bin/uninstall.sh",
        "updateCommand": "bin/update.sh",
        "enableCommand": "bin/enable.sh",
        "disableCommand": "bin/disable.sh",
        "reportHeartbeat": false,
        "continueOnUpdateFailure": {continue_on_update_failure}
    }}
}}]"#
    )
}
