// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-handler command execution log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only logger for one handler's lifecycle command activity.
///
/// Writes human-readable timestamped lines to
/// `<extlog>/<Name>/CommandExecution.log`. Each `append()` call opens,
/// writes, and closes the file. This is safe for the low write frequency
/// of lifecycle commands. Failures are logged via tracing and never
/// propagate — logging must not break the pass.
#[derive(Debug, Clone)]
pub struct CommandLog {
    log_dir: PathBuf,
}

impl CommandLog {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir }
    }

    /// Returns the log file path.
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join("CommandExecution.log")
    }

    /// Append a log block for the given handler version.
    ///
    /// Format: `2026-01-30T08:14:09Z [Name-Version] message`
    pub fn append(&self, full_name: &str, message: &str) {
        if let Err(e) = self.write_lines(full_name, message) {
            tracing::warn!(
                handler = full_name,
                error = %e,
                "failed to write command execution log"
            );
        }
    }

    fn write_lines(&self, full_name: &str, message: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let mut file = OpenOptions::new().create(true).append(true).open(self.log_file())?;
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        for line in message.lines().filter(|l| !l.is_empty()) {
            writeln!(file, "{ts} [{full_name}] {line}")?;
        }
        Ok(())
    }
}

/// Shared log dir accessor used when constructing instances.
pub(crate) fn for_handler(log_root: &Path, handler_name: &str) -> CommandLog {
    CommandLog::new(log_root.join(handler_name))
}

#[cfg(test)]
#[path = "command_log_tests.rs"]
mod tests;
