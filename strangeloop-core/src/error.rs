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

//! Error types shared by every strangeloop crate

use std::path::PathBuf;
use thiserror::Error;

/// Result type for session-protocol operations
pub type LoopResult<T> = Result<T, LoopError>;

/// Errors that can occur while recording, analysing or consolidating a session.
///
/// Only failures that threaten persisted data are represented here. Corrupt or
/// missing bookkeeping files are not errors: loaders fall back to defaults and
/// emit a warning instead.
#[derive(Debug, Error)]
pub enum LoopError {
    /// A file could not be written or moved into place
    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another writer holds the working-directory lock
    #[error("Working directory is locked by another session: {0}")]
    Locked(PathBuf),

    /// Invalid content hash text
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LoopError {
    /// Wrap an IO error with the path that was being written
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoopError::Persist {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for LoopError {
    fn from(e: serde_json::Error) -> Self {
        LoopError::SerializationError(e.to_string())
    }
}
