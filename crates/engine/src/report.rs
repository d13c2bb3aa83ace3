// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate VM status reporting and the local agent status snapshot.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use vext_adapters::{ProtocolError, TelemetryOp};
use vext_core::{
    Clock, ExtError, GoalState, Handler, HandlerState, VmStatus, AGENT_NAME, AGENT_VERSION,
};

use crate::instance::HandlerInstance;
use crate::orchestrator::Orchestrator;

/// Flattened status snapshot written next to the handler trees.
pub const AGENT_STATUS_FILE: &str = "waagent_status.json";

impl<C: Clock> Orchestrator<C> {
    /// Assemble and post the aggregate VM status, then write the local
    /// snapshot. Per-handler failures are folded into that handler's
    /// entry; only protocol trouble can keep the report from going out.
    pub(crate) async fn report_ext_handlers_status(&mut self, goal: &GoalState) {
        let mut vm_status = VmStatus::new("Ready", "Guest Agent is running");

        for handler in &goal.handlers {
            if let Err(e) = self.report_ext_handler_status(&mut vm_status, handler).await {
                self.agent_event(TelemetryOp::ExtensionProcessing, false, e.to_string());
            }
        }

        debug!("report vm agent status");
        match self.ctx.protocol.report_vm_status(&vm_status).await {
            Ok(()) => {
                if self.log_report {
                    debug!("completed vm agent status report");
                }
                self.report_gate.reset();
            }
            Err(ProtocolError::NotFound(e)) => {
                self.report_gate.incr();
                debug!("failed to report vm agent status: {e}");
            }
            Err(e) => {
                self.report_gate.incr();
                self.agent_event(
                    TelemetryOp::ExtensionProcessing,
                    false,
                    format!("Failed to report vm agent status: {e}"),
                );
            }
        }

        if self.report_gate.is_triggered() {
            self.agent_event(
                TelemetryOp::ReportStatusExtended,
                false,
                format!(
                    "Failed to report vm agent status for more than {:?}",
                    self.report_gate.delta()
                ),
            );
            self.report_gate.reset();
        }

        if let Err(e) = write_agent_status_file(&self.ctx.conf.lib_dir, &vm_status) {
            warn!(error = %e, "failed to write agent status snapshot");
        }
    }

    /// Attach one handler's persisted status (plus live extension status
    /// and heartbeat) to the VM report. Handlers with no persisted status
    /// are skipped.
    async fn report_ext_handler_status(
        &self,
        vm_status: &mut VmStatus,
        handler: &Handler,
    ) -> Result<(), ExtError> {
        let inst = HandlerInstance::new(&self.ctx, handler.clone());

        let Some(mut handler_status) = inst.handler_status() else {
            return Ok(());
        };

        if inst.handler_state() != HandlerState::NotInstalled {
            let statuses = inst.collect_and_report_ext_statuses().await;
            handler_status.extensions.extend(statuses);

            match inst.collect_heartbeat() {
                Ok(Some(heartbeat)) => handler_status.status = heartbeat.status,
                Ok(None) => {}
                Err(e) => {
                    handler_status.message = e.message().to_string();
                    handler_status.code = e.code();
                    vext_storage::set_handler_status(inst.paths(), &handler_status);
                }
            }
        }

        vm_status.vm_agent.extension_handlers.push(handler_status);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AgentStatusSnapshot {
    agent_name: String,
    current_version: String,
    goal_state_version: String,
    distro_details: String,
    runtime_version: String,
    last_successful_status_upload_time: String,
    extensions_status: Vec<SnapshotHandlerStatus>,
}

/// Per-handler snapshot entry with `code`, `message`, and `extensions`
/// stripped.
#[derive(Debug, Serialize)]
struct SnapshotHandlerStatus {
    name: String,
    version: String,
    status: String,
}

/// Write the flattened `waagent_status.json` snapshot under the library
/// root.
pub(crate) fn write_agent_status_file(
    lib_dir: &Path,
    vm_status: &VmStatus,
) -> std::io::Result<()> {
    let snapshot = AgentStatusSnapshot {
        agent_name: AGENT_NAME.to_string(),
        current_version: AGENT_VERSION.to_string(),
        goal_state_version: AGENT_VERSION.to_string(),
        distro_details: distro_details(),
        runtime_version: format!("rust {}", env!("CARGO_PKG_RUST_VERSION")),
        last_successful_status_upload_time: chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string(),
        extensions_status: vm_status
            .vm_agent
            .extension_handlers
            .iter()
            .map(|h| SnapshotHandlerStatus {
                name: h.name.clone(),
                version: h.version.clone(),
                status: h.status.to_string(),
            })
            .collect(),
    };
    let json = serde_json::to_string(&snapshot).map_err(std::io::Error::other)?;
    fs::write(lib_dir.join(AGENT_STATUS_FILE), json)
}

/// `ID:VERSION_ID` from `/etc/os-release`, falling back to the platform
/// name.
fn distro_details() -> String {
    let Ok(text) = fs::read_to_string("/etc/os-release") else {
        return std::env::consts::OS.to_string();
    };
    let field = |key: &str| {
        text.lines()
            .find_map(|l| l.strip_prefix(key))
            .map(|v| v.trim_matches('"').to_string())
    };
    match (field("ID="), field("VERSION_ID=")) {
        (Some(id), Some(version)) => format!("{id}:{version}"),
        (Some(id), None) => id,
        _ => std::env::consts::OS.to_string(),
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
