// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: a tempdir-backed context wired to
//! fake adapters, plus handler and package builders.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vext_adapters::{
    make_package_zip, manifest_json, Context, FakeExecutor, FakeProtocol, FakeTelemetry, Package,
};
use vext_core::{AgentConf, Extension, GoalState, Handler, HandlerState, SystemClock};
use vext_storage::HandlerPaths;

use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::DownloadPolicy;

pub(crate) struct Fixture {
    /// Held so the tempdir outlives the fixture.
    _dir: tempfile::TempDir,
    pub protocol: FakeProtocol,
    pub exec: FakeExecutor,
    pub telemetry: FakeTelemetry,
    pub ctx: Context,
}

impl Fixture {
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

    pub fn disable_extensions(&mut self) {
        self.ctx.conf.extensions_enabled = false;
    }

    pub fn enable_overprovisioning(&mut self) {
        self.ctx.conf.enable_overprovisioning = true;
    }

    pub fn paths(&self, name: &str, version: &str) -> HandlerPaths {
        HandlerPaths::new(&self.ctx.conf.lib_dir, &self.ctx.conf.ext_log_dir, name, version)
    }

    /// Orchestrator with test-speed polling and retry delays; production
    /// semantics otherwise.
    pub fn orchestrator(&self) -> Orchestrator<SystemClock> {
        let opts = OrchestratorOptions::default()
            .poll_interval(Duration::from_millis(5))
            .download(DownloadPolicy { rounds: 5, retry_delay: Duration::from_millis(1) });
        Orchestrator::with_clock(self.ctx.clone(), SystemClock, opts)
    }

    pub fn set_goal(&self, handlers: Vec<Handler>, etag: &str) {
        self.protocol.set_goal_state(GoalState { handlers }, etag);
    }

    /// Publish one downloadable package version with a working zip fixture
    /// behind the given URI.
    pub fn seed_package(&self, name: &str, version: &str, uri: &str) {
        self.seed_package_with_manifest(name, version, uri, &manifest_json(false));
    }

    pub fn seed_package_with_manifest(&self, name: &str, version: &str, uri: &str, manifest: &str) {
        let zip = make_package_zip(&[
            ("HandlerManifest.json", manifest),
            ("bin/install.sh", "#!/bin/sh\nexit 0\n"),
        ]);
        self.add_package_version(name, version, uri);
        self.protocol.add_download(uri, zip);
    }

    /// Register a package version without serving bytes for its URI.
    pub fn add_package_version(&self, name: &str, version: &str, uri: &str) {
        self.protocol.add_pkg_version(
            name,
            Package { version: version.to_string(), uris: vec![uri.to_string()] },
        );
    }

    /// Lay a handler version down on disk as if previously installed.
    pub fn install_on_disk(&self, name: &str, version: &str, state: HandlerState) -> HandlerPaths {
        let paths = self.paths(name, version);
        fs::create_dir_all(paths.status_dir()).unwrap();
        fs::create_dir_all(paths.conf_dir()).unwrap();
        fs::write(paths.manifest_file(), manifest_json(false)).unwrap();
        vext_storage::set_handler_state(&paths, state);
        paths
    }
}

pub(crate) fn handler(name: &str, version: &str, state: &str) -> Handler {
    Handler::builder().name(name).version(version).state(state).build()
}

pub(crate) fn handler_with_ext(name: &str, version: &str, state: &str, seq: i64) -> Handler {
    let ext = Extension { name: "ext".to_string(), sequence_number: Some(seq), ..Extension::default() };
    Handler::builder().name(name).version(version).state(state).extensions(vec![ext]).build()
}
