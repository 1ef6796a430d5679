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

//! Trigger engine behaviour over realistic logs

use chrono::Utc;
use std::collections::BTreeMap;
use strangeloop_core::{ActionRecord, ContentHash, LoopConfig};
use strangeloop_storage::{ActionLog, ActionLogFile};
use strangeloop_triggers::{
    PatternMonitor, RepetitionPattern, SequencePattern, TriggerEngine, TriggerPattern, TriggerSet,
};
use tempfile::tempdir;

fn record(command: &str, exit_code: i32, stderr: &str) -> ActionRecord {
    let now = Utc::now();
    ActionRecord {
        timestamp_start: now,
        timestamp_end: now,
        command: command.to_string(),
        reason: "investigate".to_string(),
        decision: "look around".to_string(),
        stdout_ref: None,
        stderr_ref: ContentHash::of_text(stderr),
        exit_code,
    }
}

fn read_only_sequence() -> TriggerPattern {
    TriggerPattern::Sequence(SequencePattern {
        name: "Analysis Paralysis".to_string(),
        tools: ["ls", "read_file", "grep"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        threshold: 5,
        message: "{count} read-only commands in a row: {tool_list}".to_string(),
        analogy_id: None,
    })
}

fn fixation(contextual: &[(&str, &str)]) -> TriggerPattern {
    TriggerPattern::Repetition(RepetitionPattern {
        name: "Tool Fixation".to_string(),
        threshold: 3,
        message: "DEFAULT {tool_name} {count}".to_string(),
        contextual_messages: contextual
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        analogy_id: None,
    })
}

fn engine(patterns: Vec<TriggerPattern>) -> TriggerEngine {
    TriggerEngine::new(TriggerSet::new(patterns), 10)
}

#[test]
fn test_sequence_fires_on_unbroken_run() {
    let log: Vec<_> = ["ls", "read_file a.rs", "ls src", "grep -rn foo", "read_file b.rs"]
        .iter()
        .map(|c| record(c, 0, ""))
        .collect();

    let finding = engine(vec![read_only_sequence()]).evaluate(&log).unwrap();
    assert_eq!(finding.pattern_name, "Analysis Paralysis");
    assert_eq!(finding.count, 5);
    assert_eq!(
        finding.message,
        "5 read-only commands in a row: ls, read_file, ls, grep, read_file"
    );
}

#[test]
fn test_sequence_resets_on_other_tool() {
    let log: Vec<_> = ["ls", "write_file x", "ls", "grep foo", "read_file y"]
        .iter()
        .map(|c| record(c, 0, ""))
        .collect();

    assert!(engine(vec![read_only_sequence()]).evaluate(&log).is_none());
}

#[test]
fn test_repetition_uses_contextual_message() {
    let log: Vec<_> = (0..3)
        .map(|_| record("pytest tests/test_api.py", 1, "AssertionError"))
        .collect();

    let finding = engine(vec![fixation(&[("pytest", "M1")])])
        .evaluate(&log)
        .unwrap();
    assert_eq!(finding.message, "M1");
    assert_eq!(finding.count, 3);
}

#[test]
fn test_repetition_falls_back_to_default() {
    let log: Vec<_> = (0..3)
        .map(|_| record("some_other_command", 1, "boom"))
        .collect();

    let finding = engine(vec![fixation(&[("pytest", "M1")])])
        .evaluate(&log)
        .unwrap();
    assert_eq!(finding.message, "DEFAULT some_other_command 3");
}

#[test]
fn test_finding_serializes_for_callers() {
    let log: Vec<_> = (0..3).map(|_| record("cargo build", 101, "E0382")).collect();
    let finding = engine(vec![fixation(&[])]).evaluate(&log).unwrap();

    let json = serde_json::to_value(&finding).unwrap();
    assert_eq!(json["pattern_name"], "Tool Fixation");
    assert!(json.get("analogy_id").is_none());
}

#[test]
fn test_engine_from_config_files() {
    let dir = tempdir().unwrap();
    let config = LoopConfig::for_root(dir.path());
    std::fs::create_dir_all(config.triggers_path().parent().unwrap()).unwrap();
    std::fs::write(
        config.triggers_path(),
        r#"
patterns:
  - name: Retry Loop
    type: repetition
    threshold: 2
    message: "{tool_name} keeps failing"
    analogy_id: insanity
"#,
    )
    .unwrap();
    std::fs::create_dir_all(config.analogy_registry_path().parent().unwrap()).unwrap();
    std::fs::write(
        config.analogy_registry_path(),
        r#"{"insanity": {"rationale": "Same input, same output", "trigger": "Retry Loop"}}"#,
    )
    .unwrap();

    let engine = TriggerEngine::from_config(&config);
    let log = vec![record("make", 2, "missing"), record("make", 2, "missing")];
    let finding = engine.evaluate(&log).unwrap();
    assert_eq!(
        engine.render(&finding),
        "make keeps failing\nAnalogy 'insanity': Same input, same output (trigger: Retry Loop)"
    );
}

#[test]
fn test_monitor_only_reevaluates_changed_log() {
    let dir = tempdir().unwrap();
    let config = LoopConfig::for_root(dir.path());
    std::fs::create_dir_all(config.triggers_path().parent().unwrap()).unwrap();
    std::fs::write(
        config.triggers_path(),
        "- {name: Retry, type: repetition, threshold: 2, message: again}\n",
    )
    .unwrap();

    let mut monitor = PatternMonitor::new(config.clone());
    // No log yet: nothing to do, and no error.
    assert!(monitor.tick().unwrap().is_none());

    let log_file = ActionLogFile::new(config.log_path());
    log_file
        .save(&ActionLog::from_entries(vec![
            record("make", 2, "x"),
            record("make", 2, "x"),
        ]))
        .unwrap();

    assert!(monitor.tick().unwrap().is_some());
    assert!(monitor.tick().unwrap().is_none());

    let written = std::fs::read_to_string(config.suggestions_path()).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert!(written.trim_end().ends_with("] again"));
}

#[test]
fn test_monitor_tolerates_corrupt_log() {
    let dir = tempdir().unwrap();
    let config = LoopConfig::for_root(dir.path());
    std::fs::write(config.log_path(), "{{{{").unwrap();

    let mut monitor = PatternMonitor::new(config);
    assert!(monitor.tick().unwrap().is_none());
}

#[test]
fn test_monitor_reevaluates_rotated_log_of_same_length() {
    let dir = tempdir().unwrap();
    let config = LoopConfig::for_root(dir.path());
    std::fs::create_dir_all(config.triggers_path().parent().unwrap()).unwrap();
    std::fs::write(
        config.triggers_path(),
        "- {name: Retry, type: repetition, threshold: 2, message: again}\n",
    )
    .unwrap();

    let log_file = ActionLogFile::new(config.log_path());
    let mut monitor = PatternMonitor::new(config.clone());
    log_file
        .save(&ActionLog::from_entries(vec![
            record("ls", 0, ""),
            record("make", 2, "x"),
        ]))
        .unwrap();
    assert!(monitor.tick().unwrap().is_none());

    // One entry evicted, one appended: same length, newer tail
    let mut newest = record("make", 2, "x");
    newest.timestamp_end = newest.timestamp_end + chrono::Duration::seconds(1);
    log_file
        .save(&ActionLog::from_entries(vec![record("make", 2, "x"), newest]))
        .unwrap();
    assert!(monitor.tick().unwrap().is_some());
}

#[test]
fn test_monitor_keeps_polling_after_write_failure() {
    let dir = tempdir().unwrap();
    let mut config = LoopConfig::for_root(dir.path());
    config.poll_interval_secs = 0;
    std::fs::create_dir_all(config.triggers_path().parent().unwrap()).unwrap();
    std::fs::write(
        config.triggers_path(),
        "- {name: Retry, type: repetition, threshold: 2, message: again}\n",
    )
    .unwrap();
    ActionLogFile::new(config.log_path())
        .save(&ActionLog::from_entries(vec![
            record("make", 2, "x"),
            record("make", 2, "x"),
        ]))
        .unwrap();

    // A directory where the suggestion log should be makes every write fail
    std::fs::create_dir_all(config.suggestions_path()).unwrap();

    let mut monitor = PatternMonitor::new(config.clone());
    let mut polls = 0;
    monitor
        .run(|| {
            polls += 1;
            polls <= 3
        })
        .unwrap();
    assert_eq!(polls, 4);

    // The unwritten finding is retried once the log is writable again
    std::fs::remove_dir(config.suggestions_path()).unwrap();
    assert!(monitor.tick().unwrap().is_some());
}
