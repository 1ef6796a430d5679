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

//! Trigger evaluation
//!
//! The engine is stateless: each call to [`TriggerEngine::evaluate`] looks at
//! the trailing `lookback` entries of the log from scratch. Patterns are tried
//! in declared order and evaluation stops at the first one that fires.

use crate::analogy::AnalogyRegistry;
use crate::pattern::{RepetitionPattern, SequencePattern, TriggerPattern, TriggerSet};
use crate::template::TemplateVars;
use serde::Serialize;
use strangeloop_core::{ActionRecord, ContentHash, LoopConfig};
use tracing::debug;

/// A pattern that fired
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub pattern_name: String,
    /// Message with placeholders substituted
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analogy_id: Option<String>,
    /// Length of the run or size of the failure group
    pub count: usize,
    /// Tools involved, in window order
    pub tools: Vec<String>,
}

/// Evaluates trigger patterns over a trailing window of the action log
#[derive(Debug, Clone, Default)]
pub struct TriggerEngine {
    patterns: TriggerSet,
    analogies: AnalogyRegistry,
    lookback: usize,
}

impl TriggerEngine {
    pub fn new(patterns: TriggerSet, lookback: usize) -> Self {
        Self {
            patterns,
            analogies: AnalogyRegistry::default(),
            lookback,
        }
    }

    pub fn with_analogies(mut self, analogies: AnalogyRegistry) -> Self {
        self.analogies = analogies;
        self
    }

    /// Engine built from the configured trigger file and analogy registry.
    ///
    /// Never fails; absent configuration gives an engine that finds nothing.
    pub fn from_config(config: &LoopConfig) -> Self {
        Self::new(
            TriggerSet::load(&config.triggers_path()),
            config.history_lookback,
        )
        .with_analogies(AnalogyRegistry::load(&config.analogy_registry_path()))
    }

    pub fn patterns(&self) -> &TriggerSet {
        &self.patterns
    }

    /// First finding over the last `lookback` entries of `log`
    pub fn evaluate(&self, log: &[ActionRecord]) -> Option<Finding> {
        let window = &log[log.len().saturating_sub(self.lookback)..];
        if window.is_empty() {
            return None;
        }

        self.patterns.patterns().iter().find_map(|pattern| {
            let finding = match pattern {
                TriggerPattern::Sequence(p) => evaluate_sequence(p, window),
                TriggerPattern::Repetition(p) => evaluate_repetition(p, window),
            };
            if let Some(f) = &finding {
                debug!(pattern = %f.pattern_name, count = f.count, "Trigger fired");
            }
            finding
        })
    }

    /// The finding's message plus its analogy line, if the registry has one
    pub fn render(&self, finding: &Finding) -> String {
        let Some(id) = finding.analogy_id.as_deref() else {
            return finding.message.clone();
        };
        match self.analogies.describe(id) {
            Some(line) => format!("{}\n{}", finding.message, line),
            None => {
                debug!(analogy_id = id, "Finding references unknown analogy");
                finding.message.clone()
            }
        }
    }
}

fn evaluate_sequence(pattern: &SequencePattern, window: &[ActionRecord]) -> Option<Finding> {
    let mut run: Vec<&str> = Vec::with_capacity(pattern.threshold);

    for record in window {
        let tool = record.tool_name();
        if !pattern.tools.contains(tool) {
            run.clear();
            continue;
        }
        run.push(tool);
        if run.len() == pattern.threshold {
            let tool_list = run.join(", ");
            let vars = TemplateVars {
                count: run.len(),
                tool_name: Some(tool.to_string()),
                tool_list: Some(tool_list),
            };
            return Some(Finding {
                pattern_name: pattern.name.clone(),
                message: vars.render(&pattern.message),
                analogy_id: pattern.analogy_id.clone(),
                count: run.len(),
                tools: run.iter().map(|t| t.to_string()).collect(),
            });
        }
    }
    None
}

struct FailureGroup<'a> {
    tool: &'a str,
    signature: Option<ContentHash>,
    count: usize,
    last_command: &'a str,
}

fn evaluate_repetition(pattern: &RepetitionPattern, window: &[ActionRecord]) -> Option<Finding> {
    // Groups in order of first occurrence, so ties go to the earliest group.
    let mut groups: Vec<FailureGroup<'_>> = Vec::new();
    for record in window.iter().filter(|r| r.is_failure()) {
        let tool = record.tool_name();
        let signature = record.error_signature();
        match groups
            .iter_mut()
            .find(|g| g.tool == tool && g.signature == signature)
        {
            Some(group) => {
                group.count += 1;
                group.last_command = &record.command;
            }
            None => groups.push(FailureGroup {
                tool,
                signature,
                count: 1,
                last_command: &record.command,
            }),
        }
    }

    let mut best: Option<&FailureGroup<'_>> = None;
    for group in &groups {
        if best.map_or(true, |b| group.count > b.count) {
            best = Some(group);
        }
    }
    let group = best?;
    if group.count < pattern.threshold {
        return None;
    }

    let template = pattern
        .contextual_messages
        .iter()
        .find(|(keyword, _)| group.last_command.contains(keyword.as_str()))
        .map(|(_, message)| message)
        .unwrap_or(&pattern.message);

    let vars = TemplateVars {
        count: group.count,
        tool_name: Some(group.tool.to_string()),
        tool_list: Some(group.tool.to_string()),
    };
    Some(Finding {
        pattern_name: pattern.name.clone(),
        message: vars.render(template),
        analogy_id: pattern.analogy_id.clone(),
        count: group.count,
        tools: vec![group.tool.to_string(); group.count],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use strangeloop_core::Analogy;

    fn record(command: &str, exit_code: i32, stderr: &str) -> ActionRecord {
        let now = Utc::now();
        ActionRecord {
            timestamp_start: now,
            timestamp_end: now,
            command: command.to_string(),
            reason: String::new(),
            decision: String::new(),
            stdout_ref: None,
            stderr_ref: ContentHash::of_text(stderr),
            exit_code,
        }
    }

    fn sequence(threshold: usize) -> TriggerPattern {
        TriggerPattern::Sequence(SequencePattern {
            name: "Analysis Paralysis".to_string(),
            tools: ["ls", "cat"].iter().map(|s| s.to_string()).collect(),
            threshold,
            message: "{count} reads: {tool_list}".to_string(),
            analogy_id: Some("map".to_string()),
        })
    }

    fn repetition(threshold: usize) -> TriggerPattern {
        TriggerPattern::Repetition(RepetitionPattern {
            name: "Tool Fixation".to_string(),
            threshold,
            message: "{tool_name} x{count}".to_string(),
            contextual_messages: BTreeMap::new(),
            analogy_id: None,
        })
    }

    #[test]
    fn test_lookback_limits_window() {
        let engine = TriggerEngine::new(TriggerSet::new(vec![sequence(3)]), 2);
        let log = vec![record("ls", 0, ""), record("ls", 0, ""), record("ls", 0, "")];
        assert!(engine.evaluate(&log).is_none());

        let engine = TriggerEngine::new(TriggerSet::new(vec![sequence(3)]), 10);
        let finding = engine.evaluate(&log).unwrap();
        assert_eq!(finding.message, "3 reads: ls, ls, ls");
    }

    #[test]
    fn test_first_declared_pattern_wins() {
        let engine = TriggerEngine::new(TriggerSet::new(vec![repetition(2), sequence(2)]), 10);
        let log = vec![record("cat x", 1, "nope"), record("cat x", 1, "nope")];
        let finding = engine.evaluate(&log).unwrap();
        assert_eq!(finding.pattern_name, "Tool Fixation");
        assert_eq!(finding.message, "cat x2");
    }

    #[test]
    fn test_repetition_groups_by_signature() {
        let engine = TriggerEngine::new(TriggerSet::new(vec![repetition(3)]), 10);
        let log = vec![
            record("make", 2, "error A"),
            record("make", 2, "error B"),
            record("make", 2, "error A"),
            record("make", 2, "error B"),
        ];
        assert!(engine.evaluate(&log).is_none());
    }

    #[test]
    fn test_successes_are_not_repetitions() {
        let engine = TriggerEngine::new(TriggerSet::new(vec![repetition(2)]), 10);
        let log = vec![record("make", 0, "warn"), record("make", 0, "warn")];
        assert!(engine.evaluate(&log).is_none());
    }

    #[test]
    fn test_render_with_analogy() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "map".to_string(),
            Analogy {
                rationale: "Reading is not doing".to_string(),
                trigger: "Analysis Paralysis".to_string(),
            },
        );
        let engine = TriggerEngine::new(TriggerSet::new(vec![sequence(2)]), 10)
            .with_analogies(AnalogyRegistry::new(entries));

        let finding = engine
            .evaluate(&[record("cat a", 0, ""), record("ls", 0, "")])
            .unwrap();
        assert_eq!(
            engine.render(&finding),
            "2 reads: cat, ls\nAnalogy 'map': Reading is not doing (trigger: Analysis Paralysis)"
        );
    }

    #[test]
    fn test_empty_engine_finds_nothing() {
        let engine = TriggerEngine::default();
        assert!(engine.evaluate(&[record("ls", 1, "x")]).is_none());
    }
}
