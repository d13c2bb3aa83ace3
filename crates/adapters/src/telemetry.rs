// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry seam.
//!
//! Events are keyed by a symbolic operation name; the real sink lives in
//! the agent's event pipeline, the default here forwards to `tracing`.

use tracing::{info, warn};

/// Symbolic operation names attached to telemetry events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryOp {
    Download,
    Install,
    Enable,
    Disable,
    UnInstall,
    Update,
    ExtensionProcessing,
    GetArtifactExtended,
    ReportStatusExtended,
    SequenceNumberMismatch,
}

vext_core::simple_display! {
    TelemetryOp {
        Download => "Download",
        Install => "Install",
        Enable => "Enable",
        Disable => "Disable",
        UnInstall => "UnInstall",
        Update => "Update",
        ExtensionProcessing => "ExtensionProcessing",
        GetArtifactExtended => "GetArtifactExtended",
        ReportStatusExtended => "ReportStatusExtended",
        SequenceNumberMismatch => "SequenceNumberMismatch",
    }
}

/// One telemetry event.
#[derive(Debug, Clone)]
pub struct TelemetryEvent {
    /// Handler name, or the agent name for agent-level events.
    pub name: String,
    pub version: String,
    pub op: TelemetryOp,
    pub is_success: bool,
    pub message: String,
    pub duration_ms: Option<u64>,
    /// Whether the sink should also surface the event in the local log.
    pub log_event: bool,
}

impl TelemetryEvent {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        op: TelemetryOp,
        is_success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            op,
            is_success,
            message: message.into(),
            duration_ms: None,
            log_event: true,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_log_event(mut self, log_event: bool) -> Self {
        self.log_event = log_event;
        self
    }
}

/// Sink for telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn add_event(&self, event: TelemetryEvent);
}

/// Default sink that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn add_event(&self, event: TelemetryEvent) {
        if !event.log_event {
            return;
        }
        if event.is_success {
            info!(
                name = %event.name,
                version = %event.version,
                op = %event.op,
                duration_ms = event.duration_ms,
                "{}",
                event.message
            );
        } else {
            warn!(
                name = %event.name,
                version = %event.version,
                op = %event.op,
                "{}",
                event.message
            );
        }
    }
}
