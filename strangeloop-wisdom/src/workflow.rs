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

//! Proven workflow discovery
//!
//! A proven workflow is what the agent did between a failing test run and
//! the next passing one. Only commands that change something count as steps:
//! observation tools, failed commands and the test runs themselves are left
//! out. A pass with no such steps in between records nothing.

use strangeloop_core::{ActionRecord, ProvenWorkflow, WorkflowStep};

/// Substrings that mark a command as a test run
const TEST_RUNNERS: &[&str] = &[
    "pytest",
    "cargo test",
    "cargo nextest",
    "go test",
    "npm test",
    "yarn test",
    "make test",
];

/// Tools that only look at the workspace
const OBSERVATION_TOOLS: &[&str] = &[
    "ls", "cat", "grep", "rg", "find", "head", "tail", "less", "wc", "tree", "pwd", "echo",
    "read_file",
];

pub fn is_test_run(record: &ActionRecord) -> bool {
    TEST_RUNNERS.iter().any(|r| record.command.contains(r))
}

fn is_step(record: &ActionRecord) -> bool {
    !record.is_failure()
        && !is_test_run(record)
        && !OBSERVATION_TOOLS.contains(&record.tool_name())
}

/// Every fail-then-pass test sequence in `actions`, in log order
pub fn discover_workflows(actions: &[ActionRecord]) -> Vec<ProvenWorkflow> {
    let mut found = Vec::new();
    let mut last_failure = None;

    for (index, record) in actions.iter().enumerate() {
        if !is_test_run(record) {
            continue;
        }
        if record.is_failure() {
            last_failure = Some(index);
            continue;
        }
        let Some(failed) = last_failure.take() else {
            continue;
        };

        let sequence: Vec<WorkflowStep> = actions[failed + 1..index]
            .iter()
            .filter(|r| is_step(r))
            .map(WorkflowStep::from)
            .collect();
        if sequence.is_empty() {
            continue;
        }

        let mut tools: Vec<&str> = Vec::new();
        for step in &sequence {
            if !tools.contains(&step.tool_name.as_str()) {
                tools.push(&step.tool_name);
            }
        }
        found.push(ProvenWorkflow {
            name: format!(
                "Workflow that fixed `{}` using: {}",
                record.command,
                tools.join(", ")
            ),
            success_timestamp: record.timestamp_end,
            test_command: record.command.clone(),
            sequence,
            session_id: None,
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(second: i64, command: &str, exit_code: i32) -> ActionRecord {
        let t = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap() + Duration::seconds(second);
        ActionRecord {
            timestamp_start: t,
            timestamp_end: t,
            command: command.to_string(),
            reason: String::new(),
            decision: String::new(),
            stdout_ref: None,
            stderr_ref: None,
            exit_code,
        }
    }

    #[test]
    fn test_fix_between_failure_and_pass() {
        let actions = vec![
            at(1, "ls", 0),
            at(2, "pytest", 1),
            at(3, "patch -p1 -i fix.diff", 0),
            at(4, "pytest", 0),
        ];

        let workflows = discover_workflows(&actions);
        assert_eq!(workflows.len(), 1);
        let workflow = &workflows[0];
        assert_eq!(workflow.name, "Workflow that fixed `pytest` using: patch");
        assert_eq!(workflow.success_timestamp, actions[3].timestamp_end);
        assert_eq!(workflow.sequence.len(), 1);
        assert_eq!(workflow.sequence[0].tool_name, "patch");
        assert_eq!(workflow.sequence[0].command, "patch -p1 -i fix.diff");
    }

    #[test]
    fn test_observation_only_is_not_a_workflow() {
        let actions = vec![
            at(1, "pytest", 1),
            at(2, "cat src/main.py", 0),
            at(3, "pytest", 0),
        ];
        assert!(discover_workflows(&actions).is_empty());
    }

    #[test]
    fn test_pass_without_prior_failure_is_not_a_workflow() {
        let actions = vec![at(1, "patch -p1 -i fix.diff", 0), at(2, "pytest", 0)];
        assert!(discover_workflows(&actions).is_empty());
    }

    #[test]
    fn test_only_steps_after_the_latest_failure_count() {
        let actions = vec![
            at(1, "cargo test", 101),
            at(2, "git stash", 0),
            at(3, "cargo test", 101),
            at(4, "sed -i s/a/b/ src/lib.rs", 0),
            at(5, "cargo fmt --check", 1),
            at(6, "cargo test", 0),
            // Passing again consumes nothing new
            at(7, "touch src/lib.rs", 0),
            at(8, "cargo test", 0),
        ];

        let workflows = discover_workflows(&actions);
        assert_eq!(workflows.len(), 1);
        let commands: Vec<&str> = workflows[0]
            .sequence
            .iter()
            .map(|s| s.command.as_str())
            .collect();
        assert_eq!(commands, vec!["sed -i s/a/b/ src/lib.rs"]);
    }
}
