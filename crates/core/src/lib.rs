// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vext-core: core model for the vext extension handler orchestrator

pub mod macros;

pub mod clock;
pub mod conf;
pub mod error;
pub mod gate;
pub mod handler;
pub mod status;
pub mod version;

pub use clock::{Clock, FakeClock, SystemClock};
pub use conf::{AgentConf, ConfError, AGENT_NAME, AGENT_VERSION};
pub use error::{codes, ExtError};
pub use gate::ErrorGate;
#[cfg(any(test, feature = "test-support"))]
pub use handler::HandlerBuilder;
pub use handler::{
    format_full_name, parse_full_name, parse_pkg_name, Extension, GoalState, Handler, HandlerState,
    TargetState, NO_SORT_KEY, PKG_EXT,
};
pub use status::{
    ExtStatusKind, ExtensionStatus, ExtensionSubStatus, HandlerStatus, HandlerStatusKind,
    Heartbeat, VmAgentStatus, VmStatus,
};
pub use version::{HandlerVersion, VersionError, VersionSpec};
