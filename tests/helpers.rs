// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture for scenario tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vext_adapters::{
    make_package_zip, manifest_json, Context, FakeExecutor, FakeProtocol, FakeTelemetry, Package,
};
use vext_core::{AgentConf, Extension, GoalState, Handler, HandlerState, SystemClock};
use vext_engine::{DownloadPolicy, Orchestrator, OrchestratorOptions};
use vext_storage::HandlerPaths;

pub struct World {
    /// Held so the tempdir outlives the world.
    _dir: tempfile::TempDir,
    pub protocol: FakeProtocol,
    pub exec: FakeExecutor,
    pub telemetry: FakeTelemetry,
    pub ctx: Context,
}

impl World {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let conf = AgentConf {
            lib_dir: dir.path().join("lib"),
            ext_log_dir: dir.path().join("log"),
            ..AgentConf::default()
        };
        fs::create_dir_all(&conf.lib_dir).unwrap();
        fs::create_dir_all(&conf.ext_log_dir).unwrap();

        let protocol = FakeProtocol::new();
        let exec = FakeExecutor::new();
        let telemetry = FakeTelemetry::new();
        let ctx = Context::new(
            Arc::new(protocol.clone()),
            Arc::new(exec.clone()),
            Arc::new(telemetry.clone()),
            conf,
        );
        Self { _dir: dir, protocol, exec, telemetry, ctx }
    }

    pub fn lib_dir(&self) -> &Path {
        &self.ctx.conf.lib_dir
    }

    pub fn paths(&self, name: &str, version: &str) -> HandlerPaths {
        HandlerPaths::new(&self.ctx.conf.lib_dir, &self.ctx.conf.ext_log_dir, name, version)
    }

    pub fn orchestrator(&self) -> Orchestrator<SystemClock> {
        let opts = OrchestratorOptions::default()
            .poll_interval(Duration::from_millis(5))
            .download(DownloadPolicy { rounds: 5, retry_delay: Duration::from_millis(1) });
        Orchestrator::with_clock(self.ctx.clone(), SystemClock, opts)
    }

    pub fn set_goal(&self, handlers: Vec<Handler>, etag: &str) {
        self.protocol.set_goal_state(GoalState { handlers }, etag);
    }

    /// Publish a downloadable package version with a valid zip behind it.
    pub fn seed_package(&self, name: &str, version: &str, uri: &str) {
        self.seed_package_with_manifest(name, version, uri, &manifest_json(false));
    }

    pub fn seed_package_with_manifest(
        &self,
        name: &str,
        version: &str,
        uri: &str,
        manifest: &str,
    ) {
        let zip = make_package_zip(&[
            ("HandlerManifest.json", manifest),
            ("bin/install.sh", "#!/bin/sh\nexit 0\n"),
            ("bin/enable.sh", "#!/bin/sh\nexit 0\n"),
        ]);
        self.protocol.add_pkg_version(
            name,
            Package { version: version.to_string(), uris: vec![uri.to_string()] },
        );
        self.protocol.add_download(uri, zip);
    }

    /// Register a package version without bytes behind its URIs.
    pub fn dead_package(&self, name: &str, version: &str, uris: &[&str]) {
        self.protocol.add_pkg_version(
            name,
            Package {
                version: version.to_string(),
                uris: uris.iter().map(|u| (*u).to_string()).collect(),
            },
        );
    }

    /// Lay a handler version down on disk as if previously installed.
    pub fn install_on_disk(&self, name: &str, version: &str, state: HandlerState) -> HandlerPaths {
        self.install_on_disk_with_manifest(name, version, state, &manifest_json(false))
    }

    pub fn install_on_disk_with_manifest(
        &self,
        name: &str,
        version: &str,
        state: HandlerState,
        manifest: &str,
    ) -> HandlerPaths {
        let paths = self.paths(name, version);
        fs::create_dir_all(paths.status_dir()).unwrap();
        fs::create_dir_all(paths.conf_dir()).unwrap();
        fs::write(paths.manifest_file(), manifest).unwrap();
        vext_storage::set_handler_state(&paths, state);
        paths
    }
}

pub fn handler(name: &str, version: &str, state: &str) -> Handler {
    Handler::builder().name(name).version(version).state(state).build()
}

pub fn handler_with_ext(name: &str, version: &str, state: &str, seq: i64) -> Handler {
    let ext =
        Extension { name: "ext".to_string(), sequence_number: Some(seq), ..Extension::default() };
    Handler::builder().name(name).version(version).state(state).extensions(vec![ext]).build()
}

/// Commands recorded for one handler directory, in order.
pub fn commands_for(exec: &FakeExecutor, full_name: &str) -> Vec<String> {
    exec.commands().into_iter().filter(|c| c.contains(full_name)).collect()
}
