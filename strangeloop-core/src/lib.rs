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

//! Strangeloop core types
//!
//! Shared data model for the agent session protocol:
//! - **ActionRecord**: one executed command, with output referenced by hash
//! - **ContentHash**: BLAKE3 key of a stored output blob
//! - **WisdomState**: cumulative decisions, lessons, analogies, workflows and history
//! - **LoopConfig**: file layout and limits
//!
//! Persistence lives in `strangeloop-storage`; pattern detection in
//! `strangeloop-triggers`; consolidation in `strangeloop-wisdom`.

pub mod action;
pub mod config;
pub mod error;
pub mod hash;
pub mod wisdom;

// Re-exports
pub use action::{ActionRecord, UNKNOWN_TOOL};
pub use config::{LoopConfig, CONFIG_FILE_NAME};
pub use error::{LoopError, LoopResult};
pub use hash::ContentHash;
pub use wisdom::{
    session_checksum, Analogy, ProvenWorkflow, RotationMarker, SessionSummary, WisdomNote,
    WisdomState, WorkflowStep, SOURCE_IMPORT, SOURCE_SESSION_HANDOFF,
};
