// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-execution seam for publisher lifecycle commands.
//!
//! The default implementation runs `/bin/sh -c` under `tokio::process`
//! with the phase timeout enforced here; a resource-governed executor
//! (cgroups) can replace it behind the same trait.

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

/// One lifecycle command invocation.
///
/// `stdout`/`stderr` are caller-provided capture files living in the
/// handler's base dir; the executor owns them for the duration of the call
/// and reads the merged output back before returning.
#[derive(Debug)]
pub struct ExtensionCommand {
    /// Handler full name, for logging and cgroup naming.
    pub extension_name: String,
    /// Fully resolved command line, executed through the shell.
    pub command: String,
    pub timeout: Duration,
    pub cwd: PathBuf,
    /// Additions on top of the inherited process environment.
    pub env: Vec<(String, String)>,
    pub stdout: std::fs::File,
    pub stderr: std::fs::File,
    /// Phase-specific error code the caller wants failures tagged with.
    pub error_code: i64,
}

/// Errors from running a lifecycle command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("Command '{command}' timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },
    #[error("Command '{command}' failed with exit code {exit_code}: {output}")]
    Failed {
        command: String,
        exit_code: i32,
        output: String,
    },
    #[error("I/O failure running '{command}': {source}")]
    Io {
        command: String,
        source: std::io::Error,
    },
}

/// External subsystem that runs lifecycle commands and owns their
/// resource accounting.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one command to completion and return its merged output text.
    async fn start_extension_command(
        &self,
        request: ExtensionCommand,
    ) -> Result<String, CommandError>;

    /// Set up resource accounting for a handler.
    async fn create_extension_cgroups(&self, full_name: &str);

    /// Tear down resource accounting for a handler.
    async fn remove_extension_cgroups(&self, full_name: &str);
}

/// Shell-based executor without resource governance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellCommandExecutor;

impl ShellCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn start_extension_command(
        &self,
        request: ExtensionCommand,
    ) -> Result<String, CommandError> {
        let ExtensionCommand {
            extension_name,
            command,
            timeout,
            cwd,
            env,
            mut stdout,
            mut stderr,
            error_code: _,
        } = request;

        fn io_err(command: &str) -> impl FnOnce(std::io::Error) -> CommandError + '_ {
            move |source| CommandError::Io { command: command.to_string(), source }
        }

        let stdout_stdio = stdout.try_clone().map_err(io_err(&command))?;
        let stderr_stdio = stderr.try_clone().map_err(io_err(&command))?;

        let mut child = tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&cwd)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_stdio))
            .stderr(Stdio::from(stderr_stdio))
            .spawn()
            .map_err(|source| CommandError::Spawn { command: command.clone(), source })?;

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status.map_err(io_err(&command))?,
            Err(_) => {
                let _ = child.kill().await;
                info!(extension = %extension_name, %command, "command timed out, killed");
                return Err(CommandError::Timeout {
                    command,
                    timeout_secs: timeout.as_secs(),
                });
            }
        };

        let mut output = String::new();
        for file in [&mut stdout, &mut stderr] {
            file.seek(SeekFrom::Start(0)).map_err(io_err(&command))?;
            file.read_to_string(&mut output).map_err(io_err(&command))?;
        }

        let exit_code = status.code().unwrap_or(-1);
        debug!(extension = %extension_name, %command, exit_code, "command finished");

        if !status.success() {
            return Err(CommandError::Failed { command, exit_code, output });
        }
        Ok(output)
    }

    async fn create_extension_cgroups(&self, full_name: &str) {
        debug!(extension = full_name, "no resource governance, skipping cgroup setup");
    }

    async fn remove_extension_cgroups(&self, full_name: &str) {
        debug!(extension = full_name, "no resource governance, skipping cgroup teardown");
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
