// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The top-level reconciliation pass.
//!
//! One `run()` fetches the goal state, drives each handler toward its
//! target in dependency order, reports aggregate VM status, and sweeps
//! orphaned artifacts. The pass is single-threaded cooperative: handlers
//! are strictly serialized and external effects block the pass.

use std::fs;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use vext_adapters::{Context, TelemetryEvent, TelemetryOp};
use vext_core::{
    gate::INSTALL_GATE_DELTA, parse_full_name, parse_pkg_name, Clock, ErrorGate, ExtError,
    ExtStatusKind, GoalState, Handler, HandlerState, HandlerStatusKind, HandlerVersion,
    SystemClock, TargetState, AGENT_NAME, AGENT_VERSION, PKG_EXT,
};

use crate::download::DownloadPolicy;
use crate::instance::HandlerInstance;

/// Pass-level tunables. Production defaults; tests shrink the durations.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Deadline for cross-handler waits, measured from pass start.
    pub pass_deadline: Duration,
    /// Poll interval while waiting for an extension to reach a terminal
    /// status.
    pub poll_interval: Duration,
    pub download: DownloadPolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            pass_deadline: Duration::from_secs(90 * 60),
            poll_interval: Duration::from_secs(5),
            download: DownloadPolicy::default(),
        }
    }
}

impl OrchestratorOptions {
    vext_core::setters! {
        set {
            pass_deadline: Duration,
            poll_interval: Duration,
            download: DownloadPolicy,
        }
    }
}

/// Reconciles the goal state with the handlers installed on the host.
pub struct Orchestrator<C: Clock = SystemClock> {
    pub(crate) ctx: Context,
    clock: C,
    opts: OrchestratorOptions,
    /// The only cross-pass state that matters for correctness: handlers
    /// already processed under this etag are skipped.
    last_etag: Option<String>,
    pub(crate) log_report: bool,
    log_etag: bool,
    log_process: bool,
    pub(crate) report_gate: ErrorGate<C>,
    download_gate: ErrorGate<C>,
}

impl Orchestrator<SystemClock> {
    pub fn new(ctx: Context) -> Self {
        Self::with_clock(ctx, SystemClock, OrchestratorOptions::default())
    }
}

impl<C: Clock> Orchestrator<C> {
    pub fn with_clock(ctx: Context, clock: C, opts: OrchestratorOptions) -> Self {
        Self {
            ctx,
            clock: clock.clone(),
            opts,
            last_etag: None,
            log_report: false,
            log_etag: true,
            log_process: false,
            report_gate: ErrorGate::with_clock(clock.clone()),
            download_gate: ErrorGate::with_clock(clock).with_delta(INSTALL_GATE_DELTA),
        }
    }

    pub fn last_etag(&self) -> Option<&str> {
        self.last_etag.as_deref()
    }

    pub(crate) fn agent_event(&self, op: TelemetryOp, is_success: bool, message: String) {
        self.ctx
            .telemetry
            .add_event(TelemetryEvent::new(AGENT_NAME, AGENT_VERSION, op, is_success, message));
    }

    /// One reconciliation pass.
    pub async fn run(&mut self) {
        vext_storage::migrate_handler_state(&self.ctx.conf.lib_dir);

        let (goal, etag) = match self.ctx.protocol.get_ext_handlers().await {
            Ok(fetched) => {
                self.download_gate.reset();
                fetched
            }
            Err(e) => {
                let msg = format!("Exception retrieving extension handlers: {e}");
                self.download_gate.incr();
                if self.download_gate.is_triggered() {
                    self.agent_event(
                        TelemetryOp::GetArtifactExtended,
                        false,
                        format!(
                            "Failed to get extension artifact for over {:?}: {msg}",
                            self.download_gate.delta()
                        ),
                    );
                    self.download_gate.reset();
                } else {
                    warn!("{msg}");
                }
                self.agent_event(TelemetryOp::ExtensionProcessing, false, msg);
                return;
            }
        };

        debug!(etag, "handle extension updates for incarnation");
        self.log_report = true;

        if let Err(e) = self.process(&goal, &etag).await {
            let msg = format!("Exception processing extension handlers: {e}");
            warn!("{msg}");
            self.agent_event(TelemetryOp::ExtensionProcessing, false, msg);
        }
    }

    async fn process(&mut self, goal: &GoalState, etag: &str) -> Result<(), ExtError> {
        if self.extension_processing_allowed().await? {
            self.handle_ext_handlers(goal, etag).await;
            self.last_etag = Some(etag.to_string());
            if self.log_process {
                info!(etag, "finished processing extension handlers");
                self.log_process = false;
            }
        }

        self.report_ext_handlers_status(goal).await;
        self.cleanup_outdated_handlers().await?;
        Ok(())
    }

    /// Whether extension work may run this pass: configuration can disable
    /// it outright, and an on-hold artifacts profile defers it while the
    /// VM is overprovisioned.
    async fn extension_processing_allowed(&self) -> Result<bool, ExtError> {
        if !self.ctx.conf.extensions_enabled {
            debug!("extension handling is disabled");
            return Ok(false);
        }

        if self.ctx.conf.enable_overprovisioning {
            if !self.ctx.protocol.supports_overprovisioning().await {
                debug!("overprovisioning is enabled but protocol does not support it");
            } else {
                let profile = self
                    .ctx
                    .protocol
                    .get_artifacts_profile()
                    .await
                    .map_err(|e| ExtError::extension(format!("Failed to get artifacts profile: {e}")))?;
                if profile.is_some_and(|p| p.is_on_hold()) {
                    info!("extension handling is on hold");
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    async fn handle_ext_handlers(&mut self, goal: &GoalState, etag: &str) {
        if goal.handlers.is_empty() {
            debug!("no extension handler config found");
            return;
        }

        let deadline = self.clock.now() + self.opts.pass_deadline;
        let max_level = goal.handlers.iter().map(|h| h.sort_key).max().unwrap_or(-1);

        let mut handlers = goal.handlers.clone();
        handlers.sort_by_key(|h| h.sort_key);

        for handler in &handlers {
            self.handle_ext_handler(handler, etag).await;

            // Dependents only run once this handler reports terminal
            // success; a failure or timeout abandons the rest of the pass.
            let level = handler.sort_key;
            if level >= 0 && level < max_level {
                if !self.wait_for_handler_successful_completion(handler, deadline).await {
                    warn!(
                        "an extension failed or timed out, will skip processing the rest \
                         of the extensions"
                    );
                    break;
                }
            }
        }
    }

    /// Poll each of the handler's extensions until terminal or deadline.
    /// True only when every extension reached `success`.
    async fn wait_for_handler_successful_completion(
        &self,
        handler: &Handler,
        deadline: Instant,
    ) -> bool {
        let inst = HandlerInstance::new(&self.ctx, handler.clone());
        for ext in &handler.extensions {
            let (mut completed, mut status) = inst.is_ext_handling_complete(ext);

            while !completed && self.clock.now() <= deadline {
                tokio::time::sleep(self.opts.poll_interval).await;
                (completed, status) = inst.is_ext_handling_complete(ext);
            }

            let status_text = status.map_or_else(|| "None".to_string(), |s| s.to_string());
            if self.clock.now() > deadline {
                let msg = format!(
                    "Extension {} did not reach a terminal state within the allowed timeout. \
                     Last status was {status_text}",
                    ext.name
                );
                warn!("{msg}");
                self.agent_event(TelemetryOp::ExtensionProcessing, false, msg);
                return false;
            }

            if status != Some(ExtStatusKind::Success) {
                let msg =
                    format!("Extension {} did not succeed. Status was {status_text}", ext.name);
                warn!("{msg}");
                self.agent_event(TelemetryOp::ExtensionProcessing, false, msg);
                return false;
            }
        }
        true
    }

    /// Drive one handler; every error class lands in its handler status.
    async fn handle_ext_handler(&mut self, handler: &Handler, etag: &str) {
        let mut inst = HandlerInstance::new(&self.ctx, handler.clone());
        if let Err(e) = self.drive_handler(&mut inst, etag).await {
            match &e {
                // The old version already reported the failure.
                ExtError::Update { .. } => self.record_handler_error(&inst, &e, false),
                ExtError::Download { .. } => self.record_download_error(&inst, &e),
                _ => self.record_handler_error(&inst, &e, true),
            }
        }
    }

    fn record_handler_error(&self, inst: &HandlerInstance, e: &ExtError, report_event: bool) {
        inst.set_handler_status(HandlerStatusKind::NotReady, e.message(), e.code());
        if report_event {
            inst.report_event(e.message(), false, None, true);
        }
    }

    fn record_download_error(&mut self, inst: &HandlerInstance, e: &ExtError) {
        inst.set_handler_status(HandlerStatusKind::NotReady, e.message(), e.code());

        self.download_gate.incr();
        if self.download_gate.is_triggered() {
            self.agent_event(
                TelemetryOp::Download,
                false,
                format!(
                    "Failed to get artifact for over {:?}: {}",
                    self.download_gate.delta(),
                    e.message()
                ),
            );
            self.download_gate.reset();
        }
    }

    async fn drive_handler(
        &mut self,
        inst: &mut HandlerInstance,
        etag: &str,
    ) -> Result<(), ExtError> {
        let target = inst.handler().state.clone();

        if inst.decide_version(&target).await?.is_none() {
            let msg = format!(
                "Unable to find version {} in manifest for extension {}",
                inst.version(),
                inst.name()
            );
            inst.set_operation(TelemetryOp::Download);
            inst.set_handler_status(HandlerStatusKind::NotReady, &msg, -1);
            inst.report_event(&msg, false, None, true);
            return Ok(());
        }

        self.download_gate.reset();

        if !inst.is_upgrade() && self.last_etag.as_deref() == Some(etag) {
            if self.log_etag {
                debug!(
                    handler = %inst.full_name(),
                    etag,
                    "version is current for this incarnation"
                );
                self.log_etag = false;
            }
            return Ok(());
        }
        self.log_etag = true;

        info!(handler = %inst.full_name(), target = %target, "target handler state");
        match TargetState::parse(&target)? {
            TargetState::Enabled => self.handle_enable(inst).await,
            TargetState::Disabled => self.handle_disable(inst).await,
            TargetState::Uninstall => self.handle_uninstall(inst).await,
        }
    }

    async fn handle_enable(&mut self, inst: &mut HandlerInstance) -> Result<(), ExtError> {
        self.log_process = true;
        let old = inst.installed_instance();
        let state = inst.handler_state();
        info!(handler = %inst.full_name(), state = %state, "[enable] current handler state");

        let mut uninstall_failed = false;
        if state == HandlerState::NotInstalled {
            inst.set_handler_state(HandlerState::NotInstalled);
            let download_policy = self.opts.download.clone();
            inst.download(&download_policy).await?;
            inst.initialize().await?;
            inst.update_settings()?;

            match old {
                None => inst.install(false).await?,
                Some(mut old) => {
                    if versions_differ(&old, inst)? {
                        uninstall_failed = update_handler(&mut old, inst).await?;
                    }
                }
            }
        } else {
            inst.update_settings()?;
        }

        inst.enable(uninstall_failed).await
    }

    async fn handle_disable(&mut self, inst: &mut HandlerInstance) -> Result<(), ExtError> {
        self.log_process = true;
        let state = inst.handler_state();
        info!(handler = %inst.full_name(), state = %state, "[disable] current handler state");
        if state == HandlerState::Enabled {
            inst.disable().await?;
        }
        Ok(())
    }

    async fn handle_uninstall(&mut self, inst: &mut HandlerInstance) -> Result<(), ExtError> {
        self.log_process = true;
        let state = inst.handler_state();
        info!(handler = %inst.full_name(), state = %state, "[uninstall] current handler state");

        if state != HandlerState::NotInstalled {
            if state == HandlerState::Enabled {
                inst.disable().await?;
            }
            // Swallow uninstall-command failures; the tree goes away
            // regardless.
            if let Err(e) = inst.uninstall().await {
                inst.report_event(e.message(), false, None, true);
            }
        }

        inst.remove().await;
        Ok(())
    }

    /// Remove orphaned packages, then the trees and packages of handlers
    /// whose state is `NotInstalled`.
    async fn cleanup_outdated_handlers(&self) -> Result<(), ExtError> {
        let lib_dir = &self.ctx.conf.lib_dir;
        let entries = fs::read_dir(lib_dir)
            .map_err(|e| ExtError::extension(format!("Failed to scan library dir: {e}")))?;

        let agent_prefix = format!("{AGENT_NAME}-");
        let mut uninstalled: Vec<HandlerInstance> = Vec::new();
        let mut orphaned_pkgs: Vec<std::path::PathBuf> = Vec::new();

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if name.starts_with(&agent_prefix) {
                continue;
            }
            let path = entry.path();

            if path.is_dir() {
                let Some((handler_name, version)) = parse_full_name(&name) else { continue };
                let inst = HandlerInstance::from_disk(&self.ctx, handler_name, version.to_string());
                if inst.handler_state() != HandlerState::NotInstalled {
                    continue;
                }
                uninstalled.push(inst);
            } else if path.is_file() && parse_pkg_name(&name).is_some() {
                let matching_dir = match name.strip_suffix(PKG_EXT) {
                    Some(stem) => lib_dir.join(stem),
                    None => continue,
                };
                if !matching_dir.is_dir() {
                    orphaned_pkgs.push(path);
                }
            }
        }

        for pkg in orphaned_pkgs {
            match fs::remove_file(&pkg) {
                Ok(()) => debug!(pkg = %pkg.display(), "removed orphaned extension package"),
                Err(e) => warn!(pkg = %pkg.display(), error = %e, "failed to remove orphaned package"),
            }
        }

        for inst in uninstalled {
            inst.remove().await;
        }
        Ok(())
    }
}

/// Whether two instances are bound to different versions.
fn versions_differ(a: &HandlerInstance, b: &HandlerInstance) -> Result<bool, ExtError> {
    Ok(parse_version(a.version())? != parse_version(b.version())?)
}

fn parse_version(s: &str) -> Result<HandlerVersion, ExtError> {
    HandlerVersion::parse(s).map_err(|e| ExtError::extension(format!("Invalid version {s}: {e}")))
}

enum OldHandlerCommand {
    Disable,
    Uninstall,
}

/// Run one of the old version's commands under the update rules: failures
/// are reported against the old version, and unless the new manifest sets
/// `continueOnUpdateFailure` they abort the update as an update error (the
/// new version records it without re-reporting).
async fn execute_old_handler_command(
    new: &HandlerInstance,
    old: &mut HandlerInstance,
    command: OldHandlerCommand,
) -> Result<bool, ExtError> {
    let continue_on_update_failure = match new.load_manifest() {
        Ok(man) => man.continue_on_update_failure,
        Err(e) => {
            let msg = format!("{}; ContinueOnUpdate: false", e.message());
            old.report_event(&msg, false, None, true);
            return Err(ExtError::update(e.code(), msg));
        }
    };

    let result = match command {
        OldHandlerCommand::Disable => old.disable().await,
        OldHandlerCommand::Uninstall => old.uninstall().await,
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            let msg = format!("{}; ContinueOnUpdate: {continue_on_update_failure}", e.message());
            old.report_event(&msg, false, None, true);
            if !continue_on_update_failure {
                return Err(ExtError::update(e.code(), msg));
            }
            info!("continue on update failure flag is set, proceeding with update");
            Ok(false)
        }
    }
}

/// The update choreography between an installed old version and the new
/// one. Returns whether the old version's uninstall failed (the new
/// version's install and enable surface it in their environment).
async fn update_handler(
    old: &mut HandlerInstance,
    new: &mut HandlerInstance,
) -> Result<bool, ExtError> {
    let disable_failed =
        !execute_old_handler_command(new, old, OldHandlerCommand::Disable).await?;

    vext_storage::copy_status_files(old.paths(), new.paths())?;

    // Downgrades run the OLD version's update command, with the NEW
    // version string in the environment either way.
    let new_version = new.version().to_string();
    if parse_version(new.version())? > parse_version(old.version())? {
        new.update(&new_version, disable_failed).await?;
    } else {
        old.update(&new_version, disable_failed).await?;
    }

    let uninstall_failed =
        !execute_old_handler_command(new, old, OldHandlerCommand::Uninstall).await?;

    old.remove().await;
    new.update_with_install(uninstall_failed).await?;
    Ok(uninstall_failed)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
