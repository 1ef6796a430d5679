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

//! Append-only advisory log written by the pattern monitor

use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use strangeloop_core::{LoopError, LoopResult};

#[derive(Debug, Clone)]
pub struct SuggestionLog {
    path: PathBuf,
}

impl SuggestionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[<timestamp>] message` as one entry
    pub fn append(&self, message: &str) -> LoopResult<()> {
        self.append_at(Utc::now(), message)
    }

    pub fn append_at(&self, at: DateTime<Utc>, message: &str) -> LoopResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LoopError::persist(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LoopError::persist(&self.path, e))?;
        writeln!(file, "{}", format_entry(at, message))
            .map_err(|e| LoopError::persist(&self.path, e))
    }
}

fn format_entry(at: DateTime<Utc>, message: &str) -> String {
    format!("[{}] {}", at.to_rfc3339(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_entries_are_appended() {
        let dir = tempdir().unwrap();
        let log = SuggestionLog::new(dir.path().join("context/suggestions.log"));
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        log.append_at(at, "first").unwrap();
        log.append_at(at, "second").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "[2025-03-01T12:00:00+00:00] first\n[2025-03-01T12:00:00+00:00] second\n"
        );
    }
}
