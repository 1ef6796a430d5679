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

//! Strangeloop wisdom
//!
//! Consolidates each session's action log into a cumulative, versioned
//! [`WisdomState`](strangeloop_core::WisdomState), persisted as immutable
//! snapshots.
//!
//! ```text
//!   ActionLogFile ──┐
//!   SessionNotes ───┼──► WisdomMerger ──► SnapshotStore (wisdom_packet_*.json)
//!   AnalogyRegistry ┘                         └──► archive/ (rotated snapshots)
//! ```

pub mod consolidate;
pub mod merge;
pub mod metrics;
pub mod notes;
pub mod packet;
pub mod snapshot;
pub mod workflow;

pub use consolidate::{Consolidation, ConsolidationReport, Consolidator};
pub use merge::{MergeOutcome, MergedState, WisdomMerger};
pub use metrics::LoopMetrics;
pub use notes::{parse_entries, SessionNotes};
pub use packet::{export_packet, import_packet, ImportReport, PacketNote, WisdomPacket};
pub use snapshot::{Snapshot, SnapshotStore, WrittenSnapshot, SNAPSHOT_PREFIX};
pub use workflow::{discover_workflows, is_test_run};
