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

//! File helpers shared by every persisted artifact
//!
//! All writes go to a temporary sibling first and are renamed into place, so a
//! concurrent reader sees either the old file or the new one, never a partial
//! write. All reads go through [`read_json`], which separates "absent" and
//! "corrupt" from real I/O failures.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use strangeloop_core::{LoopError, LoopResult};
use tracing::warn;

/// Outcome of reading a persisted JSON document
#[derive(Debug)]
pub enum Loaded<T> {
    /// No file at the path
    Missing,
    /// File exists but does not parse as the expected shape
    Corrupt(String),
    /// Parsed successfully
    Present(T),
}

impl<T> Loaded<T> {
    /// Present value, or `None` for missing/corrupt
    pub fn present(self) -> Option<T> {
        match self {
            Loaded::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Read a file to a string, `None` when it does not exist
pub fn read_optional(path: &Path) -> LoopResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read and parse a JSON document.
///
/// Only genuine I/O failures (permissions, bad disk) are errors.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> LoopResult<Loaded<T>> {
    let Some(content) = read_optional(path)? else {
        return Ok(Loaded::Missing);
    };
    match serde_json::from_str(&content) {
        Ok(value) => Ok(Loaded::Present(value)),
        Err(e) => Ok(Loaded::Corrupt(e.to_string())),
    }
}

/// Load a JSON document, substituting the default when absent or corrupt.
///
/// Corruption is logged as a warning naming `what` was reset.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path, what: &str) -> LoopResult<T> {
    match read_json(path)? {
        Loaded::Present(value) => Ok(value),
        Loaded::Missing => Ok(T::default()),
        Loaded::Corrupt(reason) => {
            warn!(path = %path.display(), %reason, "Corrupt {}, starting fresh", what);
            Ok(T::default())
        }
    }
}

/// Atomically replace `path` with `bytes` (write temp, fsync, rename)
pub fn write_atomic(path: &Path, bytes: &[u8]) -> LoopResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| LoopError::persist(parent, e))?;
        }
    }

    let tmp = temp_sibling(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(LoopError::persist(path, e));
    }
    Ok(())
}

/// Serialize as pretty JSON and write atomically
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> LoopResult<()> {
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content)
}

/// Move a file, creating the destination directory if needed
pub fn move_file(from: &Path, to: &Path) -> LoopResult<()> {
    if let Some(parent) = to.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| LoopError::persist(parent, e))?;
        }
    }
    fs::rename(from, to).map_err(|e| LoopError::persist(to, e))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()))
}
