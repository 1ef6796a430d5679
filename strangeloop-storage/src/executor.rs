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

//! Command execution
//!
//! The recorder only depends on [`CommandExecutor`]; [`ShellExecutor`] is the
//! production implementation that runs a command line through a shell.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

/// Exit code recorded when a command could not be launched or was killed
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

/// Captured result of running a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Output describing a command that never ran
    pub fn launch_failure(error: impl std::fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!(
                "CRITICAL_EXECUTION_ERROR: The command failed to launch: {}",
                error
            ),
            exit_code: LAUNCH_FAILURE_EXIT_CODE,
        }
    }

    fn timed_out(timeout: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("COMMAND_TIMEOUT: killed after {}s\n", timeout.as_secs_f64()),
            exit_code: LAUNCH_FAILURE_EXIT_CODE,
        }
    }
}

/// Runs a command line and captures its output.
///
/// Implementations never fail: problems running the command are reported in
/// the returned output.
pub trait CommandExecutor {
    fn execute(&self, command: &str) -> CommandOutput;
}

/// Runs commands via `<shell> -c <command>`
///
/// Each call drives the child on its own current-thread tokio runtime, so
/// `execute` must not be called from inside an async context.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            timeout: None,
        }
    }
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: None,
        }
    }

    /// Kill commands that run longer than `timeout`.
    ///
    /// Without a timeout the caller blocks until the command exits, however
    /// long that takes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, command: &str) -> CommandOutput {
        let spawned = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(shell = %self.shell, error = %e, "Failed to launch command");
                return CommandOutput::launch_failure(e);
            }
        };

        // Dropping the pending future drops the child, which kills it. Pipes
        // still held by grandchildren are abandoned with it.
        let finished = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(finished) => finished,
                Err(_) => {
                    warn!(
                        command,
                        timeout_secs = limit.as_secs_f64(),
                        "Command timed out and was killed"
                    );
                    return CommandOutput::timed_out(limit);
                }
            },
            None => child.wait_with_output().await,
        };

        match finished {
            Ok(output) => CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(LAUNCH_FAILURE_EXIT_CODE),
            },
            Err(e) => {
                warn!(command, error = %e, "Failed waiting for command");
                CommandOutput {
                    stdout: String::new(),
                    stderr: format!("CRITICAL_EXECUTION_ERROR: {}\n", e),
                    exit_code: LAUNCH_FAILURE_EXIT_CODE,
                }
            }
        }
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str) -> CommandOutput {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "Failed to start the process runtime");
                return CommandOutput::launch_failure(e);
            }
        };
        runtime.block_on(self.run(command))
    }
}
