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

//! Integration tests for the action log and output store

use proptest::prelude::*;
use std::cell::Cell;
use std::collections::HashSet;
use strangeloop_core::LoopConfig;
use strangeloop_storage::{
    ActionLogFile, CommandExecutor, CommandOutput, OutputStore, SessionRecorder,
};
use tempfile::tempdir;

/// Executor that numbers its invocations, failing every third one
struct Counting {
    calls: Cell<usize>,
}

impl Counting {
    fn new() -> Self {
        Self {
            calls: Cell::new(0),
        }
    }
}

impl CommandExecutor for Counting {
    fn execute(&self, command: &str) -> CommandOutput {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n % 3 == 2 {
            CommandOutput {
                stdout: String::new(),
                stderr: format!("{} failed", command),
                exit_code: 1,
            }
        } else {
            CommandOutput {
                stdout: format!("{} output {}", command, n),
                stderr: String::new(),
                exit_code: 0,
            }
        }
    }
}

/// Identical text stored twice yields one object
#[test]
fn test_blob_storage_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = OutputStore::new(dir.path());

    let s1 = String::from("same bytes");
    let s2 = String::from("same bytes");
    assert_eq!(store.put(&s1).unwrap(), store.put(&s2).unwrap());
    assert_eq!(store.list().unwrap().len(), 1);
}

/// Every live reference in the log resolves to a stored object
#[test]
fn test_live_references_resolve() {
    let dir = tempdir().unwrap();
    let mut config = LoopConfig::for_root(dir.path());
    config.max_log_entries = 4;
    let recorder = SessionRecorder::new(&config, Counting::new()).with_mirroring(false);

    for i in 0..10 {
        recorder.append(&format!("tool{}", i), "reason", "decision").unwrap();
    }

    let log = ActionLogFile::new(config.log_path()).load().unwrap();
    let store = OutputStore::new(config.output_path());
    for hash in log.live_hashes() {
        assert!(store.contains(&hash), "missing object for live ref {}", hash);
    }
    let stored: HashSet<_> = store.list().unwrap().into_iter().collect();
    assert_eq!(stored, log.live_hashes());
}

/// Failed commands are data, not errors
#[test]
fn test_failure_is_recorded() {
    let dir = tempdir().unwrap();
    let config = LoopConfig::for_root(dir.path());
    let recorder = SessionRecorder::new(&config, Counting::new()).with_mirroring(false);

    recorder.append("a", "", "").unwrap();
    recorder.append("b", "", "").unwrap();
    let failed = recorder.append("c", "", "").unwrap();

    assert_eq!(failed.exit_code, 1);
    assert!(failed.stdout_ref.is_none());
    let stderr = recorder
        .outputs()
        .get(&failed.stderr_ref.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(stderr, "c failed");
}

/// A corrupt log on disk is replaced by a fresh log on the next append
#[test]
fn test_append_over_corrupt_log() {
    let dir = tempdir().unwrap();
    let config = LoopConfig::for_root(dir.path());
    std::fs::write(config.log_path(), "this is not json").unwrap();

    let recorder = SessionRecorder::new(&config, Counting::new()).with_mirroring(false);
    recorder.append("ls", "look", "list").unwrap();

    let log = recorder.log_file().load().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log.entries()[0].reason, "look");
}

/// A rotation whose log write fails leaves the persisted log fully backed
#[test]
fn test_failed_save_keeps_evicted_output() {
    let dir = tempdir().unwrap();
    let mut config = LoopConfig::for_root(dir.path());
    config.max_log_entries = 2;
    let recorder = SessionRecorder::new(&config, Counting::new()).with_mirroring(false);
    recorder.append("a", "", "").unwrap();
    recorder.append("b", "", "").unwrap();

    // Occupy the temp sibling the atomic write renames from
    let log_path = config.log_path();
    let name = log_path.file_name().unwrap().to_string_lossy().into_owned();
    let blocker = log_path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));
    std::fs::create_dir(&blocker).unwrap();

    assert!(recorder.append("c", "", "").is_err());
    std::fs::remove_dir(&blocker).unwrap();

    let log = recorder.log_file().load().unwrap();
    let commands: Vec<&str> = log.entries().iter().map(|r| r.command.as_str()).collect();
    assert_eq!(commands, vec!["a", "b"]);
    for hash in log.live_hashes() {
        assert!(recorder.outputs().contains(&hash), "dangling ref {}", hash);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// After every append the log holds at most `max` entries, and they are
    /// exactly the most recent ones in original order.
    #[test]
    fn prop_log_stays_bounded(max in 1usize..6, appends in 1usize..14) {
        let dir = tempdir().unwrap();
        let mut config = LoopConfig::for_root(dir.path());
        config.max_log_entries = max;
        let recorder = SessionRecorder::new(&config, Counting::new()).with_mirroring(false);

        for i in 0..appends {
            recorder.append(&format!("cmd{}", i), "", "").unwrap();

            let log = recorder.log_file().load().unwrap();
            prop_assert!(log.len() <= max);

            let expected: Vec<String> = (0..=i)
                .skip((i + 1).saturating_sub(max))
                .map(|j| format!("cmd{}", j))
                .collect();
            let actual: Vec<String> = log.entries().iter().map(|r| r.command.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
