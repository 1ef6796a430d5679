// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Session recorder - the `append` operation
//!
//! Runs a command, stores its output in the output store, appends an
//! [`ActionRecord`] to the action log, rotates the log and reclaims output
//! belonging to evicted records.

use crate::action_log::{ActionLog, ActionLogFile};
use crate::executor::{CommandExecutor, ShellExecutor};
use crate::lock::WorkdirLock;
use crate::output_store::{GcReport, OutputStore};
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use strangeloop_core::{ActionRecord, LoopConfig, LoopResult};
use tracing::{debug, info, warn};

/// Records commands into the action log
pub struct SessionRecorder<E = ShellExecutor> {
    log: ActionLogFile,
    outputs: OutputStore,
    lock_path: PathBuf,
    executor: E,
    max_log_entries: usize,
    mirror_output: bool,
}

impl SessionRecorder<ShellExecutor> {
    /// Recorder running commands through the configured shell
    pub fn from_config(config: &LoopConfig) -> Self {
        let executor =
            ShellExecutor::new(config.shell.clone()).with_timeout(config.command_timeout());
        Self::new(config, executor)
    }
}

impl<E: CommandExecutor> SessionRecorder<E> {
    pub fn new(config: &LoopConfig, executor: E) -> Self {
        Self {
            log: ActionLogFile::new(config.log_path()),
            outputs: OutputStore::new(config.output_path()),
            lock_path: config.lock_path(),
            executor,
            max_log_entries: config.max_log_entries,
            mirror_output: true,
        }
    }

    /// Whether captured output is echoed to this process's stdout/stderr
    /// (on by default)
    pub fn with_mirroring(mut self, mirror_output: bool) -> Self {
        self.mirror_output = mirror_output;
        self
    }

    pub fn log_file(&self) -> &ActionLogFile {
        &self.log
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    /// Run `command` and record it.
    ///
    /// A failing command is recorded with its exit code; it is not an error
    /// of `append`. Errors are returned only when output or the log cannot be
    /// read or persisted.
    pub fn append(&self, command: &str, reason: &str, decision: &str) -> LoopResult<ActionRecord> {
        let timestamp_start = Utc::now();
        let output = self.executor.execute(command);
        let timestamp_end = Utc::now();

        let record = ActionRecord {
            timestamp_start,
            timestamp_end,
            command: command.to_string(),
            reason: reason.to_string(),
            decision: decision.to_string(),
            stdout_ref: self.outputs.put(&output.stdout)?,
            stderr_ref: self.outputs.put(&output.stderr)?,
            exit_code: output.exit_code,
        };

        {
            let _lock = WorkdirLock::acquire(&self.lock_path)?;
            let mut log = self.log.load()?;
            log.push(record.clone());
            let before = log.len();
            let log = log.rotate_if_needed(self.max_log_entries);
            self.log.save(&log)?;
            // Evicted output is only unreferenced once the rotated log is on disk
            if log.len() < before {
                self.reclaim(&log, before - log.len());
            }
        }

        debug!(
            tool = record.tool_name(),
            exit_code = record.exit_code,
            "Recorded action"
        );

        if self.mirror_output {
            mirror(&output.stdout, &output.stderr);
        }

        Ok(record)
    }

    /// Collect the output store against the current log
    pub fn collect_garbage(&self) -> LoopResult<GcReport> {
        let _lock = WorkdirLock::acquire(&self.lock_path)?;
        let log = self.log.load()?;
        self.outputs.collect_garbage(&log.live_hashes())
    }

    /// Sweep output of evicted records; the log is already saved, so a
    /// failed sweep only leaves orphans for the next `gc`
    fn reclaim(&self, log: &ActionLog, evicted: usize) {
        match self.outputs.collect_garbage(&log.live_hashes()) {
            Ok(report) => info!(
                evicted,
                outputs_removed = report.removed,
                "Rotated action log"
            ),
            Err(e) => warn!(evicted, error = %e, "Rotated action log, output sweep failed"),
        }
    }
}

fn mirror(stdout: &str, stderr: &str) {
    if !stdout.is_empty() {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(stdout.as_bytes()).and_then(|_| out.flush()) {
            warn!(error = %e, "Could not mirror stdout");
        }
    }
    if !stderr.is_empty() {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(stderr.as_bytes()).and_then(|_| err.flush());
    }
}
