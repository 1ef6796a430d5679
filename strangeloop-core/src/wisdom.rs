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

//! Cumulative cross-session wisdom
//!
//! A `WisdomState` is the long-lived memory handed from one agent session to
//! the next: a bounded history of session summaries plus the decisions,
//! lessons, analogies and proven workflows accumulated along the way.

use crate::action::ActionRecord;
use crate::error::LoopResult;
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source tag for notes recorded at session consolidation
pub const SOURCE_SESSION_HANDOFF: &str = "session_handoff";

/// Source tag for notes merged from an imported wisdom packet
pub const SOURCE_IMPORT: &str = "import";

/// A decision or lesson, unique by `text` within its list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WisdomNote {
    pub text: String,
    pub recorded_at: DateTime<Utc>,
    pub source: String,
    /// Session that first recorded this note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
}

impl WisdomNote {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            recorded_at: Utc::now(),
            source: source.into(),
            session_id: None,
        }
    }

    pub fn in_session(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// A named analogy the agent can be reminded of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analogy {
    pub rationale: String,
    pub trigger: String,
}

/// One step of a proven workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub tool_name: String,
    pub command: String,
}

impl From<&ActionRecord> for WorkflowStep {
    fn from(record: &ActionRecord) -> Self {
        Self {
            tool_name: record.tool_name().to_string(),
            command: record.command.clone(),
        }
    }
}

/// Commands that took a failing test run to a passing one.
///
/// Unique by `success_timestamp` within a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenWorkflow {
    pub name: String,
    /// End of the passing test run
    pub success_timestamp: DateTime<Utc>,
    pub test_command: String,
    pub sequence: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
}

impl ProvenWorkflow {
    pub fn in_session(mut self, session_id: u64) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Marker left at the head of a fresh history after rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationMarker {
    /// Where the full previous snapshot was archived
    pub archived_to: String,
    /// Version of the archived snapshot
    pub archived_version: u64,
    /// Number of history entries the archived snapshot held
    pub archived_sessions: usize,
}

/// A frozen slice of one session's action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Wisdom version this session produced (0 for rotation markers)
    pub session_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    /// Free-text summary supplied at consolidation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Digest of `actions`, used to detect a session consolidated twice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<RotationMarker>,
}

impl SessionSummary {
    /// Summary for a consolidated session
    pub fn for_session(session_id: u64, actions: Vec<ActionRecord>) -> LoopResult<Self> {
        let checksum = session_checksum(&actions)?;
        Ok(Self {
            session_id,
            timestamp: Utc::now(),
            actions,
            summary: None,
            checksum: Some(checksum),
            rotation: None,
        })
    }

    /// Synthetic entry recording that older history was archived
    pub fn rotation(marker: RotationMarker) -> Self {
        Self {
            session_id: 0,
            timestamp: Utc::now(),
            actions: Vec::new(),
            summary: None,
            checksum: None,
            rotation: Some(marker),
        }
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    pub fn is_rotation(&self) -> bool {
        self.rotation.is_some()
    }
}

/// Digest of a session's actions in canonical JSON form
pub fn session_checksum(actions: &[ActionRecord]) -> LoopResult<String> {
    let bytes = serde_json::to_vec(actions)?;
    Ok(ContentHash::from_content(&bytes).to_hex())
}

/// The cumulative wisdom record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WisdomState {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub history: Vec<SessionSummary>,
    #[serde(default)]
    pub decisions: Vec<WisdomNote>,
    #[serde(default)]
    pub lessons: Vec<WisdomNote>,
    #[serde(default)]
    pub analogies: BTreeMap<String, Analogy>,
    #[serde(default)]
    pub proven_workflows: Vec<ProvenWorkflow>,
}

impl WisdomState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a decision unless one with identical text exists.
    ///
    /// Returns whether the note was inserted. The first write of a text wins.
    pub fn add_decision(&mut self, note: WisdomNote) -> bool {
        insert_unique(&mut self.decisions, note)
    }

    /// Insert a lesson unless one with identical text exists
    pub fn add_lesson(&mut self, note: WisdomNote) -> bool {
        insert_unique(&mut self.lessons, note)
    }

    /// Insert a workflow unless one with the same success time exists
    pub fn add_workflow(&mut self, workflow: ProvenWorkflow) -> bool {
        if self
            .proven_workflows
            .iter()
            .any(|w| w.success_timestamp == workflow.success_timestamp)
        {
            return false;
        }
        self.proven_workflows.push(workflow);
        true
    }

    pub fn has_decision(&self, text: &str) -> bool {
        self.decisions.iter().any(|d| d.text == text)
    }

    pub fn has_lesson(&self, text: &str) -> bool {
        self.lessons.iter().any(|l| l.text == text)
    }

    /// Whether a session with this action checksum is already in history
    pub fn contains_session(&self, checksum: &str) -> bool {
        self.history
            .iter()
            .any(|s| s.checksum.as_deref() == Some(checksum))
    }

    /// Number of real (non-rotation) sessions in history
    pub fn session_count(&self) -> usize {
        self.history.iter().filter(|s| !s.is_rotation()).count()
    }

    /// Total actions across history
    pub fn action_count(&self) -> usize {
        self.history.iter().map(|s| s.actions.len()).sum()
    }

    /// Failed actions across history
    pub fn failed_action_count(&self) -> usize {
        self.history
            .iter()
            .flat_map(|s| s.actions.iter())
            .filter(|a| a.is_failure())
            .count()
    }
}

fn insert_unique(notes: &mut Vec<WisdomNote>, note: WisdomNote) -> bool {
    if note.text.trim().is_empty() || notes.iter().any(|n| n.text == note.text) {
        return false;
    }
    notes.push(note);
    true
}
