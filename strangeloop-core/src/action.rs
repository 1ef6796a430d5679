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

//! Action records
//!
//! One record per command the agent ran through the session recorder. Records
//! are immutable once written; raw output lives in the output store and is
//! referenced here by content hash.

use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tool name used for records whose command is blank
pub const UNKNOWN_TOOL: &str = "unknown_tool";

/// A single executed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// When the command was started
    pub timestamp_start: DateTime<Utc>,
    /// When the command exited
    pub timestamp_end: DateTime<Utc>,
    /// The shell command line
    pub command: String,
    /// Why the agent ran it
    #[serde(default)]
    pub reason: String,
    /// What the agent decided before running it
    #[serde(default)]
    pub decision: String,
    /// Hash of captured stdout (absent when stdout was empty)
    #[serde(default, alias = "stdout_hash")]
    pub stdout_ref: Option<ContentHash>,
    /// Hash of captured stderr (absent when stderr was empty)
    #[serde(default, alias = "stderr_hash")]
    pub stderr_ref: Option<ContentHash>,
    /// Exit code, or -1 when the command could not be launched
    #[serde(alias = "returncode")]
    pub exit_code: i32,
}

impl ActionRecord {
    /// The tool this record counts as: the first word of the command.
    pub fn tool_name(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or(UNKNOWN_TOOL)
    }

    /// Whether the command failed
    pub fn is_failure(&self) -> bool {
        self.exit_code != 0
    }

    /// Digest identifying the failure output of this record.
    ///
    /// Prefers stderr; falls back to stdout for tools that report errors there.
    pub fn error_signature(&self) -> Option<ContentHash> {
        self.stderr_ref.or(self.stdout_ref)
    }

    /// Output objects this record keeps alive in the output store
    pub fn content_refs(&self) -> impl Iterator<Item = ContentHash> + '_ {
        self.stdout_ref.into_iter().chain(self.stderr_ref)
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.timestamp_end - self.timestamp_start).num_milliseconds()
    }
}
