// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared context handed to every handler instance.

use std::sync::Arc;

use vext_core::AgentConf;

use crate::command::CommandExecutor;
use crate::protocol::GoalStateProtocol;
use crate::telemetry::TelemetrySink;

/// The orchestrator's collaborators and configuration, injected into each
/// handler instance instead of living in module globals.
#[derive(Clone)]
pub struct Context {
    pub protocol: Arc<dyn GoalStateProtocol>,
    pub exec: Arc<dyn CommandExecutor>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub conf: AgentConf,
}

impl Context {
    pub fn new(
        protocol: Arc<dyn GoalStateProtocol>,
        exec: Arc<dyn CommandExecutor>,
        telemetry: Arc<dyn TelemetrySink>,
        conf: AgentConf,
    ) -> Self {
        Self { protocol, exec, telemetry, conf }
    }
}
