// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vext-adapters: seams to the agent's external collaborators — the
//! goal-state protocol, the command-execution subsystem, and telemetry.

pub mod command;
pub mod context;
pub mod file_protocol;
pub mod protocol;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use command::{CommandError, CommandExecutor, ExtensionCommand, ShellCommandExecutor};
pub use context::Context;
pub use file_protocol::FileProtocol;
pub use protocol::{ArtifactsProfile, GoalStateProtocol, Package, PackageList, ProtocolError};
pub use telemetry::{TelemetryEvent, TelemetryOp, TelemetrySink, TracingTelemetry};

#[cfg(any(test, feature = "test-support"))]
pub use test_support::{
    make_package_zip, manifest_json, CommandCall, FakeExecutor, FakeProtocol, FakeProtocolError,
    FakeTelemetry,
};
