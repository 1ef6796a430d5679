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

//! Immutable wisdom snapshots
//!
//! Every write produces a new `wisdom_packet_*.json` file; existing snapshots
//! are never rewritten. The latest snapshot is the newest by modification
//! time, ties broken by file name (names embed a UTC timestamp).

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use strangeloop_core::{LoopError, LoopResult, WisdomState};
use strangeloop_storage::{read_json, write_atomic, Loaded};
use tracing::{debug, info, warn};

/// File name prefix of snapshot files
pub const SNAPSHOT_PREFIX: &str = "wisdom_packet_";

/// A snapshot read from disk
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub state: WisdomState,
}

/// Result of writing a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenSnapshot {
    pub path: PathBuf,
    /// BLAKE3 of the file's bytes
    pub checksum: String,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    archive_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            archive_dir: archive_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot files, oldest first
    pub fn list(&self) -> LoopResult<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !is_snapshot_name(&path) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                // Removed between listing and stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, path));
        }

        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// The newest readable snapshot.
    ///
    /// Corrupt snapshots are skipped with a warning, falling back to the next
    /// older one. `None` when no usable snapshot exists.
    pub fn latest(&self) -> LoopResult<Option<Snapshot>> {
        for path in self.list()?.into_iter().rev() {
            match read_json::<WisdomState>(&path)? {
                Loaded::Present(state) => {
                    debug!(path = %path.display(), version = state.version, "Loaded wisdom snapshot");
                    return Ok(Some(Snapshot { path, state }));
                }
                Loaded::Corrupt(reason) => {
                    warn!(path = %path.display(), %reason, "Skipping corrupt wisdom snapshot");
                }
                // Raced with an archive move
                Loaded::Missing => {}
            }
        }
        Ok(None)
    }

    /// Latest state, or an empty state when there is no snapshot
    pub fn load_state(&self) -> LoopResult<WisdomState> {
        Ok(self.latest()?.map(|s| s.state).unwrap_or_default())
    }

    /// Write `state` as a new snapshot file
    pub fn write(&self, state: &WisdomState) -> LoopResult<WrittenSnapshot> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let path = self.unique_path(state.version);
        write_atomic(&path, &bytes)?;

        let checksum = blake3::hash(&bytes).to_hex().to_string();
        info!(
            path = %path.display(),
            version = state.version,
            checksum = %checksum,
            "Wrote wisdom snapshot"
        );
        Ok(WrittenSnapshot { path, checksum })
    }

    /// Where `snapshot` goes when archived
    pub fn archive_target(&self, snapshot: &Path) -> PathBuf {
        let name = snapshot
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| format!("{}archived.json", SNAPSHOT_PREFIX).into());
        self.archive_dir.join(name)
    }

    /// Move `snapshot` into the archive directory
    pub fn archive(&self, snapshot: &Path) -> LoopResult<PathBuf> {
        let target = self.archive_target(snapshot);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LoopError::persist(parent, e))?;
        }
        std::fs::rename(snapshot, &target).map_err(|e| LoopError::persist(&target, e))?;
        info!(from = %snapshot.display(), to = %target.display(), "Archived wisdom snapshot");
        Ok(target)
    }

    fn unique_path(&self, version: u64) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        let base = format!("{}{}_v{}", SNAPSHOT_PREFIX, stamp, version);
        let mut path = self.dir.join(format!("{}.json", base));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}.json", base, n));
            n += 1;
        }
        path
    }
}

fn is_snapshot_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(".json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(root: &Path) -> SnapshotStore {
        SnapshotStore::new(root.join("artifacts"), root.join("artifacts/archive"))
    }

    #[test]
    fn test_writes_never_overwrite() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let state = WisdomState::new();

        let a = store.write(&state).unwrap();
        let b = store.write(&state).unwrap();
        assert_ne!(a.path, b.path);
        assert_eq!(a.checksum, b.checksum);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_latest_skips_corrupt() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let state = WisdomState {
            version: 4,
            ..Default::default()
        };
        store.write(&state).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(
            store.dir().join(format!("{}zzz_corrupt.json", SNAPSHOT_PREFIX)),
            "{not json",
        )
        .unwrap();

        assert_eq!(store.latest().unwrap().unwrap().state.version, 4);
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.latest().unwrap().is_none());
        assert_eq!(store.load_state().unwrap(), WisdomState::default());
    }

    #[test]
    fn test_archive_moves_file() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let written = store.write(&WisdomState::new()).unwrap();

        let archived = store.archive(&written.path).unwrap();
        assert!(!written.path.exists());
        assert!(archived.exists());
        // The archive directory lives under the snapshot directory but is not
        // itself listed.
        assert!(store.list().unwrap().is_empty());
    }
}
