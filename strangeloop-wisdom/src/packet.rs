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

//! Portable wisdom packets
//!
//! A packet carries the notes, analogies and proven workflows of a wisdom
//! state without its session history, for seeding another working directory.
//! Notes may be plain strings (as older packets wrote them) or full notes.

use crate::snapshot::{SnapshotStore, WrittenSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strangeloop_core::{
    Analogy, LoopError, LoopResult, ProvenWorkflow, WisdomNote, WisdomState, SOURCE_IMPORT,
};
use strangeloop_storage::{read_json, write_json_atomic, Loaded, WorkdirLock};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketNote {
    Text(String),
    Note(WisdomNote),
}

impl PacketNote {
    pub fn text(&self) -> &str {
        match self {
            PacketNote::Text(text) => text,
            PacketNote::Note(note) => &note.text,
        }
    }

    fn into_note(self) -> WisdomNote {
        match self {
            PacketNote::Text(text) => WisdomNote::new(text, SOURCE_IMPORT),
            PacketNote::Note(note) => WisdomNote {
                source: SOURCE_IMPORT.to_string(),
                session_id: None,
                ..note
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WisdomPacket {
    #[serde(default)]
    pub decisions: Vec<PacketNote>,
    #[serde(default)]
    pub lessons: Vec<PacketNote>,
    #[serde(default)]
    pub analogies: BTreeMap<String, Analogy>,
    #[serde(default)]
    pub workflows: Vec<ProvenWorkflow>,
}

/// Counts of what an import added
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub decisions_added: usize,
    pub lessons_added: usize,
    pub analogies_added: usize,
    pub workflows_added: usize,
}

impl ImportReport {
    pub fn is_empty(&self) -> bool {
        self.decisions_added == 0
            && self.lessons_added == 0
            && self.analogies_added == 0
            && self.workflows_added == 0
    }
}

impl WisdomPacket {
    pub fn from_state(state: &WisdomState) -> Self {
        Self {
            decisions: state.decisions.iter().cloned().map(PacketNote::Note).collect(),
            lessons: state.lessons.iter().cloned().map(PacketNote::Note).collect(),
            analogies: state.analogies.clone(),
            workflows: state.proven_workflows.clone(),
        }
    }

    pub fn read(path: &Path) -> LoopResult<Self> {
        match read_json(path)? {
            Loaded::Present(packet) => Ok(packet),
            Loaded::Missing => Err(LoopError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no wisdom packet at {}", path.display()),
            ))),
            Loaded::Corrupt(reason) => Err(LoopError::SerializationError(format!(
                "{}: {}",
                path.display(),
                reason
            ))),
        }
    }

    pub fn write(&self, path: &Path) -> LoopResult<()> {
        write_json_atomic(path, self)
    }

    /// Merge into `state` with the usual dedup rules. Existing analogies are
    /// kept; only unknown ids are added. Workflows dedup by success time.
    pub fn merge_into(self, state: &mut WisdomState) -> ImportReport {
        let decisions_added = self
            .decisions
            .into_iter()
            .filter(|n| state.add_decision(n.clone().into_note()))
            .count();
        let lessons_added = self
            .lessons
            .into_iter()
            .filter(|n| state.add_lesson(n.clone().into_note()))
            .count();

        let mut analogies_added = 0;
        for (id, analogy) in self.analogies {
            if !state.analogies.contains_key(&id) {
                state.analogies.insert(id, analogy);
                analogies_added += 1;
            }
        }

        let workflows_added = self
            .workflows
            .into_iter()
            .filter(|w| {
                state.add_workflow(ProvenWorkflow {
                    session_id: None,
                    ..w.clone()
                })
            })
            .count();

        ImportReport {
            decisions_added,
            lessons_added,
            analogies_added,
            workflows_added,
        }
    }
}

/// Write the latest state's packet to `path`
pub fn export_packet(snapshots: &SnapshotStore, path: &Path) -> LoopResult<WisdomPacket> {
    let packet = WisdomPacket::from_state(&snapshots.load_state()?);
    packet.write(path)?;
    info!(
        path = %path.display(),
        decisions = packet.decisions.len(),
        lessons = packet.lessons.len(),
        analogies = packet.analogies.len(),
        workflows = packet.workflows.len(),
        "Exported wisdom packet"
    );
    Ok(packet)
}

/// Merge the packet at `path` into the latest state, holding the lock at
/// `lock_path`.
///
/// Writes a new snapshot (same version) when anything was added.
pub fn import_packet(
    snapshots: &SnapshotStore,
    lock_path: &Path,
    path: &Path,
) -> LoopResult<(ImportReport, Option<WrittenSnapshot>)> {
    let packet = WisdomPacket::read(path)?;
    let _lock = WorkdirLock::acquire(lock_path)?;
    let mut state = snapshots.load_state()?;
    let report = packet.merge_into(&mut state);
    if report.is_empty() {
        info!(path = %path.display(), "Wisdom packet added nothing new");
        return Ok((report, None));
    }
    let written = snapshots.write(&state)?;
    Ok((report, Some(written)))
}
