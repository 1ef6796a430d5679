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

//! Advisory lock for writers
//!
//! Every read-modify-write of the action log, output store or snapshot
//! directory happens while holding an exclusive `fs2` lock on a sidecar file.
//! Readers (the pattern monitor, `check`) never lock; they rely on writes
//! being atomic renames.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use strangeloop_core::{LoopError, LoopResult};
use tracing::debug;

/// Held lock; released on drop
#[derive(Debug)]
pub struct WorkdirLock {
    file: File,
    path: PathBuf,
}

impl WorkdirLock {
    /// Block until the exclusive lock is acquired
    pub fn acquire(path: &Path) -> LoopResult<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive()
            .map_err(|e| LoopError::persist(path, e))?;
        debug!(lock_path = %path.display(), "Acquired workdir lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Acquire without waiting; `LoopError::Locked` if another process holds it
    pub fn try_acquire(path: &Path) -> LoopResult<Self> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                file,
                path: path.to_path_buf(),
            }),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                Err(LoopError::Locked(path.to_path_buf()))
            }
            Err(e) => Err(LoopError::persist(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkdirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(lock_path = %self.path.display(), "Released workdir lock");
    }
}

fn open_lock_file(path: &Path) -> LoopResult<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| LoopError::persist(parent, e))?;
        }
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| LoopError::persist(path, e))
}
