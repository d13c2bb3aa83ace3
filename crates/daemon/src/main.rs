// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! vextd: the extension handler daemon.
//!
//! Loads configuration, wires the orchestrator to its collaborators, and
//! runs one reconciliation pass per interval until asked to stop. Passes
//! never overlap: the loop awaits each pass before sleeping.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vext_adapters::{Context, FileProtocol, ShellCommandExecutor, TracingTelemetry};
use vext_core::{AgentConf, AGENT_VERSION};
use vext_engine::Orchestrator;

mod env;

fn load_conf() -> AgentConf {
    let path = env::conf_path();
    if !path.is_file() {
        info!(path = %path.display(), "no config file, using defaults");
        return AgentConf::default();
    }
    match AgentConf::load(&path) {
        Ok(conf) => conf,
        Err(e) => {
            warn!(error = %e, "failed to load config, using defaults");
            AgentConf::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env::log_filter()))
        .init();

    let conf = load_conf();
    info!(
        version = AGENT_VERSION,
        lib_dir = %conf.lib_dir.display(),
        "starting extension handler daemon"
    );

    if let Err(e) = std::fs::create_dir_all(&conf.lib_dir) {
        error!(dir = %conf.lib_dir.display(), error = %e, "cannot create library dir");
        std::process::exit(1);
    }
    if let Err(e) = std::fs::create_dir_all(&conf.ext_log_dir) {
        error!(dir = %conf.ext_log_dir.display(), error = %e, "cannot create log dir");
        std::process::exit(1);
    }

    let interval = Duration::from_secs(conf.pass_interval_secs.max(1));
    let protocol = FileProtocol::new(conf.goal_state_path());
    let ctx = Context::new(
        Arc::new(protocol),
        Arc::new(ShellCommandExecutor::new()),
        Arc::new(TracingTelemetry),
        conf,
    );
    let mut orchestrator = Orchestrator::new(ctx);

    loop {
        orchestrator.run().await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "failed to listen for shutdown signal");
                }
                info!("shutting down");
                break;
            }
        }
    }
}
