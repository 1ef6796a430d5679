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

//! Output Store - content-addressed storage for command output
//!
//! Each distinct stdout/stderr text is stored once, in a file named by the hex
//! of its BLAKE3 hash. Action records reference outputs by that hash. Objects
//! no longer referenced by the live action log are reclaimed by
//! [`OutputStore::collect_garbage`].

use crate::fsutil::{read_optional, write_atomic};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use strangeloop_core::{ContentHash, LoopResult};
use tracing::{debug, warn};

/// Result of a garbage-collection pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcReport {
    /// Objects deleted
    pub removed: usize,
    /// Objects kept because they are still referenced
    pub retained: usize,
    /// Bytes reclaimed
    pub bytes_freed: u64,
}

/// Content-addressed blob directory
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Store rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the object for `hash` lives at
    pub fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(hash.to_hex())
    }

    /// Store `text`, returning its hash.
    ///
    /// Empty text is not stored and has no hash. Storing the same text twice
    /// writes one object.
    pub fn put(&self, text: &str) -> LoopResult<Option<ContentHash>> {
        let Some(hash) = ContentHash::of_text(text) else {
            return Ok(None);
        };

        let path = self.object_path(&hash);
        if path.exists() {
            debug!(hash = %hash.short(), "Output already stored");
        } else {
            write_atomic(&path, text.as_bytes())?;
            debug!(hash = %hash.short(), bytes = text.len(), "Stored output");
        }
        Ok(Some(hash))
    }

    /// Read stored text back
    pub fn get(&self, hash: &ContentHash) -> LoopResult<Option<String>> {
        read_optional(&self.object_path(hash))
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.object_path(hash).exists()
    }

    /// Every object currently in the store.
    ///
    /// Files whose names are not content hashes (temp files, strays) are ignored.
    pub fn list(&self) -> LoopResult<BTreeSet<ContentHash>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut hashes = BTreeSet::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if let Ok(hash) = name.to_string_lossy().parse::<ContentHash>() {
                hashes.insert(hash);
            }
        }
        Ok(hashes)
    }

    /// Delete every object whose hash is not in `live`.
    ///
    /// Call with the hashes of the post-rotation action log. An object that
    /// disappears before we delete it (another process got there first) is
    /// not an error; any other deletion failure is logged and skipped.
    pub fn collect_garbage(&self, live: &HashSet<ContentHash>) -> LoopResult<GcReport> {
        let mut report = GcReport::default();

        for hash in self.list()? {
            if live.contains(&hash) {
                report.retained += 1;
                continue;
            }

            let path = self.object_path(&hash);
            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path) {
                Ok(()) => {
                    report.removed += 1;
                    report.bytes_freed += size;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "GC could not delete output");
                }
            }
        }

        debug!(
            removed = report.removed,
            retained = report.retained,
            bytes_freed = report.bytes_freed,
            "Output store garbage collection complete"
        );
        Ok(report)
    }
}
