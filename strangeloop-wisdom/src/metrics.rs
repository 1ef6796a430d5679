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

//! Loop metrics over the cumulative wisdom state

use serde::Serialize;
use strangeloop_core::WisdomState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopMetrics {
    pub version: u64,
    pub sessions: usize,
    pub actions: usize,
    pub failed_actions: usize,
    pub decisions: usize,
    pub lessons: usize,
    pub analogies: usize,
    pub proven_workflows: usize,
    /// The session count just reached a multiple of the review interval
    pub improvement_due: bool,
}

impl LoopMetrics {
    pub fn from_state(state: &WisdomState, improvement_interval: usize) -> Self {
        let sessions = state.session_count();
        Self {
            version: state.version,
            sessions,
            actions: state.action_count(),
            failed_actions: state.failed_action_count(),
            decisions: state.decisions.len(),
            lessons: state.lessons.len(),
            analogies: state.analogies.len(),
            proven_workflows: state.proven_workflows.len(),
            improvement_due: improvement_interval > 0
                && sessions > 0
                && sessions % improvement_interval == 0,
        }
    }

    /// Share of recorded actions that failed, 0.0 with no actions
    pub fn failure_rate(&self) -> f64 {
        if self.actions == 0 {
            0.0
        } else {
            self.failed_actions as f64 / self.actions as f64
        }
    }
}
