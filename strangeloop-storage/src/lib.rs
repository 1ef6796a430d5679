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

//! Strangeloop storage layer
//!
//! File-system resident state for the session protocol. There is no
//! in-memory cache: every operation re-reads from disk, and every write is an
//! atomic rename, so a crashed process loses at most its in-flight operation.
//!
//! ```text
//!   exec ──► SessionRecorder ──► CommandExecutor
//!                 │
//!                 ├──► OutputStore   (.session_outputs/<blake3>)
//!                 └──► ActionLogFile (.session_history.json, bounded, rotated)
//! ```

pub mod action_log;
pub mod executor;
pub mod fsutil;
pub mod lock;
pub mod output_store;
pub mod recorder;

// Re-exports
pub use action_log::{ActionLog, ActionLogFile};
pub use executor::{CommandExecutor, CommandOutput, ShellExecutor, LAUNCH_FAILURE_EXIT_CODE};
pub use fsutil::{load_or_default, read_json, write_atomic, write_json_atomic, Loaded};
pub use lock::WorkdirLock;
pub use output_store::{GcReport, OutputStore};
pub use recorder::SessionRecorder;
