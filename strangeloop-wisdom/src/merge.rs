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

//! Folding a session into the cumulative wisdom state
//!
//! This is the pure half of consolidation: no files are touched here. The
//! [`Consolidator`](crate::Consolidator) loads the inputs, and persists the
//! result in the required order.

use crate::notes::SessionNotes;
use crate::workflow::discover_workflows;
use std::collections::BTreeMap;
use strangeloop_core::{
    session_checksum, ActionRecord, Analogy, LoopResult, RotationMarker, SessionSummary,
    WisdomNote, WisdomState, SOURCE_SESSION_HANDOFF,
};
use tracing::debug;

/// What a merge decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No actions: the state is unchanged and nothing should be written
    NothingToConsolidate,
    /// These exact actions are already in history
    AlreadyConsolidated { session_id: u64 },
    Merged(MergedState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedState {
    pub state: WisdomState,
    /// Whether history was rotated; the previous snapshot must be archived
    pub rotated: bool,
    pub decisions_added: usize,
    pub lessons_added: usize,
    pub workflows_added: usize,
}

/// Merges sessions into a [`WisdomState`], bounding its history
#[derive(Debug, Clone)]
pub struct WisdomMerger {
    max_history_size: usize,
    analogies: BTreeMap<String, Analogy>,
}

impl WisdomMerger {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            max_history_size,
            analogies: BTreeMap::new(),
        }
    }

    /// Analogies folded into every merged state, replacing same-named entries
    pub fn with_analogies(mut self, analogies: BTreeMap<String, Analogy>) -> Self {
        self.analogies = analogies;
        self
    }

    /// Fold `actions` and `notes` into `wisdom`.
    ///
    /// `archived_to` names where the current snapshot will be moved if this
    /// merge rotates history; it is only recorded in the rotation marker.
    pub fn merge(
        &self,
        wisdom: WisdomState,
        actions: Vec<ActionRecord>,
        notes: &SessionNotes,
        archived_to: &str,
    ) -> LoopResult<MergeOutcome> {
        if actions.is_empty() {
            return Ok(MergeOutcome::NothingToConsolidate);
        }

        let checksum = session_checksum(&actions)?;
        if let Some(existing) = wisdom
            .history
            .iter()
            .find(|s| s.checksum.as_deref() == Some(checksum.as_str()))
        {
            return Ok(MergeOutcome::AlreadyConsolidated {
                session_id: existing.session_id,
            });
        }

        let rotated = wisdom.history.len() >= self.max_history_size;
        let mut state = if rotated {
            rotate(wisdom, archived_to)
        } else {
            wisdom
        };

        state.version += 1;
        let session_id = state.version;
        let workflows = discover_workflows(&actions);
        let summary = SessionSummary::for_session(session_id, actions)?
            .with_summary(notes.summary.clone());
        state.history.push(summary);

        let decisions_added = notes
            .decisions
            .iter()
            .filter(|text| {
                state.add_decision(
                    WisdomNote::new(text.as_str(), SOURCE_SESSION_HANDOFF).in_session(session_id),
                )
            })
            .count();
        let lessons_added = notes
            .lessons
            .iter()
            .filter(|text| {
                state.add_lesson(
                    WisdomNote::new(text.as_str(), SOURCE_SESSION_HANDOFF).in_session(session_id),
                )
            })
            .count();
        let workflows_added = workflows
            .into_iter()
            .filter(|w| state.add_workflow(w.clone().in_session(session_id)))
            .count();

        state
            .analogies
            .extend(self.analogies.iter().map(|(k, v)| (k.clone(), v.clone())));

        debug!(
            version = state.version,
            rotated,
            decisions_added,
            lessons_added,
            workflows_added,
            "Merged session into wisdom"
        );

        Ok(MergeOutcome::Merged(MergedState {
            state,
            rotated,
            decisions_added,
            lessons_added,
            workflows_added,
        }))
    }
}

/// Fresh state whose history holds only a rotation marker. Version and the
/// accumulated notes carry over.
fn rotate(old: WisdomState, archived_to: &str) -> WisdomState {
    let marker = RotationMarker {
        archived_to: archived_to.to_string(),
        archived_version: old.version,
        archived_sessions: old.history.len(),
    };
    WisdomState {
        version: old.version,
        history: vec![SessionSummary::rotation(marker)],
        decisions: old.decisions,
        lessons: old.lessons,
        analogies: old.analogies,
        proven_workflows: old.proven_workflows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn action(command: &str) -> ActionRecord {
        let now = Utc::now();
        ActionRecord {
            timestamp_start: now,
            timestamp_end: now,
            command: command.to_string(),
            reason: String::new(),
            decision: String::new(),
            stdout_ref: None,
            stderr_ref: None,
            exit_code: 0,
        }
    }

    fn merged(outcome: MergeOutcome) -> MergedState {
        match outcome {
            MergeOutcome::Merged(m) => m,
            other => panic!("expected merge, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_session_is_noop() {
        let merger = WisdomMerger::new(50);
        let outcome = merger
            .merge(WisdomState::new(), vec![], &SessionNotes::new(), "")
            .unwrap();
        assert_eq!(outcome, MergeOutcome::NothingToConsolidate);
    }

    #[test]
    fn test_same_actions_twice_detected() {
        let merger = WisdomMerger::new(50);
        let actions = vec![action("ls"), action("make")];
        let first = merged(
            merger
                .merge(WisdomState::new(), actions.clone(), &SessionNotes::new(), "")
                .unwrap(),
        );

        let again = merger
            .merge(first.state, actions, &SessionNotes::new(), "")
            .unwrap();
        assert_eq!(again, MergeOutcome::AlreadyConsolidated { session_id: 1 });
    }

    #[test]
    fn test_notes_tagged_with_session() {
        let merger = WisdomMerger::new(50);
        let notes = SessionNotes::new()
            .decision("Pin the toolchain")
            .decision("Pin the toolchain")
            .lesson("Read the error");
        let m = merged(
            merger
                .merge(WisdomState::new(), vec![action("ls")], &notes, "")
                .unwrap(),
        );

        assert_eq!(m.decisions_added, 1);
        assert_eq!(m.lessons_added, 1);
        assert_eq!(m.state.decisions[0].session_id, Some(1));
        assert_eq!(m.state.decisions[0].source, SOURCE_SESSION_HANDOFF);
    }

    #[test]
    fn test_registry_analogies_replace_existing() {
        let mut wisdom = WisdomState::new();
        wisdom.analogies.insert(
            "map".to_string(),
            Analogy {
                rationale: "old".to_string(),
                trigger: "t".to_string(),
            },
        );
        let mut registry = BTreeMap::new();
        registry.insert(
            "map".to_string(),
            Analogy {
                rationale: "new".to_string(),
                trigger: "t".to_string(),
            },
        );

        let merger = WisdomMerger::new(50).with_analogies(registry);
        let m = merged(
            merger
                .merge(wisdom, vec![action("ls")], &SessionNotes::new(), "")
                .unwrap(),
        );
        assert_eq!(m.state.analogies["map"].rationale, "new");
    }

    #[test]
    fn test_rotation_keeps_version_and_notes() {
        let merger = WisdomMerger::new(2);
        let mut state = WisdomState::new();
        for i in 0..2 {
            state = merged(
                merger
                    .merge(
                        state,
                        vec![action(&format!("cmd{}", i))],
                        &SessionNotes::new().lesson(format!("lesson {}", i)),
                        "",
                    )
                    .unwrap(),
            )
            .state;
        }

        let m = merged(
            merger
                .merge(state, vec![action("cmd2")], &SessionNotes::new(), "archive/x.json")
                .unwrap(),
        );
        assert!(m.rotated);
        assert_eq!(m.state.version, 3);
        assert_eq!(m.state.history.len(), 2);
        let marker = m.state.history[0].rotation.as_ref().unwrap();
        assert_eq!(marker.archived_to, "archive/x.json");
        assert_eq!(marker.archived_version, 2);
        assert_eq!(marker.archived_sessions, 2);
        assert_eq!(m.state.history[1].session_id, 3);
        assert_eq!(m.state.lessons.len(), 2);
    }

    #[test]
    fn test_workflows_recorded_and_survive_rotation() {
        let merger = WisdomMerger::new(1);
        let mut failing = action("pytest");
        failing.exit_code = 1;
        let fix_session = vec![failing, action("patch -p1 -i fix.diff"), action("pytest")];

        let first = merged(
            merger
                .merge(WisdomState::new(), fix_session, &SessionNotes::new(), "")
                .unwrap(),
        );
        assert_eq!(first.workflows_added, 1);
        assert_eq!(first.state.proven_workflows[0].session_id, Some(1));
        assert_eq!(first.state.proven_workflows[0].test_command, "pytest");

        let second = merged(
            merger
                .merge(first.state, vec![action("ls")], &SessionNotes::new(), "archive/x.json")
                .unwrap(),
        );
        assert!(second.rotated);
        assert_eq!(second.workflows_added, 0);
        assert_eq!(second.state.proven_workflows.len(), 1);
    }
}
