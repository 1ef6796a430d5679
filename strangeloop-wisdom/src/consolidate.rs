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

//! Consolidation: fold the current action log into a new wisdom snapshot
//!
//! Order of effects, all under the working-directory lock:
//!
//! 1. write the new snapshot
//! 2. archive the previous snapshot (only when history rotated)
//! 3. archive the action log
//!
//! A failure before step 1 leaves everything untouched. A crash after step 1
//! is recovered by running consolidation again: the session's checksum is
//! already in history, so no second snapshot is written. The re-run finishes
//! steps 2 and 3; the pre-rotation snapshot is found through the rotation
//! marker's `archived_to` name.

use crate::merge::{MergeOutcome, WisdomMerger};
use crate::notes::SessionNotes;
use crate::snapshot::SnapshotStore;
use std::path::{Path, PathBuf};
use strangeloop_core::{LoopConfig, LoopResult, WisdomState};
use strangeloop_storage::{ActionLogFile, WorkdirLock};
use strangeloop_triggers::AnalogyRegistry;
use tracing::info;

/// What `consolidate` did
#[derive(Debug, Clone)]
pub enum Consolidation {
    /// The action log was empty or absent; nothing was written
    NothingToConsolidate,
    /// The log's actions were consolidated by an earlier run; the leftover
    /// archive steps of that run were completed
    AlreadyConsolidated {
        session_id: u64,
        /// Pre-rotation snapshot the interrupted run left behind
        archived_snapshot: Option<PathBuf>,
        archived_log: Option<PathBuf>,
    },
    Consolidated(ConsolidationReport),
}

#[derive(Debug, Clone)]
pub struct ConsolidationReport {
    pub state: WisdomState,
    pub snapshot: PathBuf,
    /// BLAKE3 of the snapshot file
    pub checksum: String,
    /// Where the previous snapshot went, if history rotated
    pub archived_snapshot: Option<PathBuf>,
    pub archived_log: Option<PathBuf>,
    pub decisions_added: usize,
    pub lessons_added: usize,
    pub workflows_added: usize,
}

pub struct Consolidator {
    log: ActionLogFile,
    snapshots: SnapshotStore,
    merger: WisdomMerger,
    lock_path: PathBuf,
}

impl Consolidator {
    pub fn from_config(config: &LoopConfig) -> Self {
        let registry = AnalogyRegistry::load(&config.analogy_registry_path());
        Self {
            log: ActionLogFile::new(config.log_path()),
            snapshots: SnapshotStore::new(config.snapshot_path(), config.archive_path()),
            merger: WisdomMerger::new(config.max_history_size)
                .with_analogies(registry.entries().clone()),
            lock_path: config.lock_path(),
        }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn consolidate(&self, notes: &SessionNotes) -> LoopResult<Consolidation> {
        let _lock = WorkdirLock::acquire(&self.lock_path)?;

        let actions = self.log.load()?.into_entries();
        let latest = self.snapshots.latest()?;
        let (current_path, wisdom) = match latest {
            Some(s) => (Some(s.path), s.state),
            None => (None, WisdomState::default()),
        };
        let unarchived = self.unarchived_snapshot(&wisdom, current_path.as_deref());
        let archive_target = current_path
            .as_deref()
            .map(|p| self.snapshots.archive_target(p).display().to_string())
            .unwrap_or_default();

        let merged = match self.merger.merge(wisdom, actions, notes, &archive_target)? {
            MergeOutcome::NothingToConsolidate => {
                info!("Action log is empty, nothing to consolidate");
                return Ok(Consolidation::NothingToConsolidate);
            }
            MergeOutcome::AlreadyConsolidated { session_id } => {
                let archived_snapshot = match unarchived {
                    Some(path) => Some(self.snapshots.archive(&path)?),
                    None => None,
                };
                let archived_log = self.log.archive()?;
                info!(
                    session_id,
                    recovered_snapshot = archived_snapshot.is_some(),
                    "Session already consolidated, finished archiving"
                );
                return Ok(Consolidation::AlreadyConsolidated {
                    session_id,
                    archived_snapshot,
                    archived_log,
                });
            }
            MergeOutcome::Merged(merged) => merged,
        };

        let written = self.snapshots.write(&merged.state)?;

        let archived_snapshot = match (merged.rotated, current_path) {
            (true, Some(previous)) => Some(self.snapshots.archive(&previous)?),
            _ => None,
        };

        let archived_log = self.log.archive()?;
        info!(
            version = merged.state.version,
            snapshot = %written.path.display(),
            "Consolidated session"
        );

        Ok(Consolidation::Consolidated(ConsolidationReport {
            state: merged.state,
            snapshot: written.path,
            checksum: written.checksum,
            archived_snapshot,
            archived_log,
            decisions_added: merged.decisions_added,
            lessons_added: merged.lessons_added,
            workflows_added: merged.workflows_added,
        }))
    }

    /// A snapshot still in the snapshot directory under the name the latest
    /// rotation marker says was archived
    fn unarchived_snapshot(&self, wisdom: &WisdomState, current: Option<&Path>) -> Option<PathBuf> {
        let marker = wisdom.history.iter().rev().find_map(|s| s.rotation.as_ref())?;
        let name = Path::new(&marker.archived_to).file_name()?;
        let candidate = self.snapshots.dir().join(name);
        (candidate.is_file() && current != Some(candidate.as_path())).then_some(candidate)
    }
}
