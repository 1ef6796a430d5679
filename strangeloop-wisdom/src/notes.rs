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

//! Decisions, lessons and summary attached to a session at consolidation

use std::path::Path;
use strangeloop_core::LoopResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionNotes {
    pub decisions: Vec<String>,
    pub lessons: Vec<String>,
    pub summary: Option<String>,
}

impl SessionNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision(mut self, text: impl Into<String>) -> Self {
        self.decisions.push(text.into());
        self
    }

    pub fn lesson(mut self, text: impl Into<String>) -> Self {
        self.lessons.push(text.into());
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary.filter(|s| !s.trim().is_empty());
        self
    }

    /// Append one decision per entry of a line file
    pub fn decisions_from_file(mut self, path: &Path) -> LoopResult<Self> {
        self.decisions.extend(read_entries(path)?);
        Ok(self)
    }

    /// Append one lesson per entry of a line file
    pub fn lessons_from_file(mut self, path: &Path) -> LoopResult<Self> {
        self.lessons.extend(read_entries(path)?);
        Ok(self)
    }
}

/// Entries of a line file: one per non-blank line, with a leading `- ` bullet
/// stripped.
pub fn parse_entries(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .map(|line| line.strip_prefix("- ").unwrap_or(line).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_entries(path: &Path) -> LoopResult<Vec<String>> {
    Ok(parse_entries(&std::fs::read_to_string(path)?))
}
