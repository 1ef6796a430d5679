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

//! Action Log - bounded, append-only ledger of executed commands
//!
//! The log is persisted as a pretty JSON array. On load we also accept
//! newline-delimited JSON objects. An unreadable structure is treated as an
//! empty log with a warning, never as a fatal error.

use crate::fsutil::{move_file, read_optional, write_json_atomic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use strangeloop_core::{ActionRecord, ContentHash, LoopResult};
use tracing::{info, warn};

/// Ordered sequence of action records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionLog {
    entries: Vec<ActionRecord>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ActionRecord>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ActionRecord] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ActionRecord> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, record: ActionRecord) {
        self.entries.push(record);
    }

    /// The trailing `n` entries, oldest first
    pub fn window(&self, n: usize) -> &[ActionRecord] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Keep only the most recent `max_entries` records.
    ///
    /// Returns the log unchanged when it is already within bounds.
    pub fn rotate_if_needed(mut self, max_entries: usize) -> ActionLog {
        if self.entries.len() > max_entries {
            let excess = self.entries.len() - max_entries;
            self.entries.drain(..excess);
        }
        self
    }

    /// Output hashes referenced by the records in this log
    pub fn live_hashes(&self) -> HashSet<ContentHash> {
        self.entries.iter().flat_map(|r| r.content_refs()).collect()
    }

    /// Parse a JSON array or newline-delimited JSON objects
    pub fn parse(content: &str) -> Option<Self> {
        if content.trim().is_empty() {
            return Some(Self::new());
        }
        if let Ok(entries) = serde_json::from_str::<Vec<ActionRecord>>(content) {
            return Some(Self { entries });
        }
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<ActionRecord>(line).ok())
            .collect::<Option<Vec<_>>>()
            .map(Self::from_entries)
    }
}

/// The on-disk action log
#[derive(Debug, Clone)]
pub struct ActionLogFile {
    path: PathBuf,
}

impl ActionLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the persisted log.
    ///
    /// A missing file is an empty log. A corrupt file is an empty log plus a
    /// warning. Only I/O failures reading an existing file are errors.
    pub fn load(&self) -> LoopResult<ActionLog> {
        let Some(content) = read_optional(&self.path)? else {
            return Ok(ActionLog::new());
        };
        match ActionLog::parse(&content) {
            Some(log) => Ok(log),
            None => {
                warn!(
                    path = %self.path.display(),
                    "Action log is corrupt, starting a fresh log"
                );
                Ok(ActionLog::new())
            }
        }
    }

    /// Persist the log atomically
    pub fn save(&self, log: &ActionLog) -> LoopResult<()> {
        write_json_atomic(&self.path, log)
    }

    /// Rename the log aside with a timestamp suffix, leaving the path free for
    /// the next session. Returns the archive path, or `None` if there was no
    /// log to archive.
    pub fn archive(&self) -> LoopResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session_log".to_string());
        let target = self.path.with_file_name(format!("{}.{}.bak", name, stamp));

        move_file(&self.path, &target)?;
        info!(archived_to = %target.display(), "Archived session log");
        Ok(Some(target))
    }
}
