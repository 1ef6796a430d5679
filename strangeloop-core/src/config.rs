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

//! Configuration for the session protocol
//!
//! Every field has a default, so an absent or partial `.strangeloop.toml` is
//! fine. Relative paths are resolved against the working root.

use crate::error::{LoopError, LoopResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the optional config file looked up in the working root
pub const CONFIG_FILE_NAME: &str = ".strangeloop.toml";

/// Session protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Working root all relative paths are resolved against
    #[serde(skip)]
    pub root: PathBuf,

    /// Action log file
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Content-addressed directory for command output
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory of wisdom snapshots
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Directory for rotated snapshots
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Human-edited trigger rules (YAML or JSON)
    #[serde(default = "default_triggers_file")]
    pub triggers_file: PathBuf,

    /// Analogy registry (JSON object of name -> {rationale, trigger})
    #[serde(default = "default_analogy_registry")]
    pub analogy_registry: PathBuf,

    /// Advisory log the pattern monitor appends findings to
    #[serde(default = "default_suggestions_log")]
    pub suggestions_log: PathBuf,

    /// Advisory lock held by writers
    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// Maximum action log entries kept after rotation
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// History length at which a snapshot is rotated into the archive
    #[serde(default = "default_max_history_size")]
    pub max_history_size: usize,

    /// Trailing log entries the trigger engine looks at
    #[serde(default = "default_history_lookback")]
    pub history_lookback: usize,

    /// Pattern monitor polling interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Kill logged commands after this many seconds.
    /// None = wait for the command however long it takes.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    /// Shell used to run logged commands
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Sessions between "recursive improvement" reviews
    #[serde(default = "default_improvement_interval")]
    pub improvement_interval: usize,
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".session_history.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".session_outputs")
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("artifacts/archive")
}

fn default_triggers_file() -> PathBuf {
    PathBuf::from("config/meta_triggers.yaml")
}

fn default_analogy_registry() -> PathBuf {
    PathBuf::from("analogies/registry.json")
}

fn default_suggestions_log() -> PathBuf {
    PathBuf::from("context/metacog_suggestions.log")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from(".strangeloop.lock")
}

fn default_max_log_entries() -> usize {
    200
}

fn default_max_history_size() -> usize {
    50
}

fn default_history_lookback() -> usize {
    10
}

fn default_poll_interval() -> u64 {
    15
}

fn default_shell() -> String {
    "/bin/bash".to_string()
}

fn default_improvement_interval() -> usize {
    10
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            log_file: default_log_file(),
            output_dir: default_output_dir(),
            snapshot_dir: default_snapshot_dir(),
            archive_dir: default_archive_dir(),
            triggers_file: default_triggers_file(),
            analogy_registry: default_analogy_registry(),
            suggestions_log: default_suggestions_log(),
            lock_file: default_lock_file(),
            max_log_entries: default_max_log_entries(),
            max_history_size: default_max_history_size(),
            history_lookback: default_history_lookback(),
            poll_interval_secs: default_poll_interval(),
            command_timeout_secs: None,
            shell: default_shell(),
            improvement_interval: default_improvement_interval(),
        }
    }
}

impl LoopConfig {
    /// Defaults rooted at `root`
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document
    pub fn from_toml(toml_str: &str) -> LoopResult<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| LoopError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration for `root`.
    ///
    /// Reads `explicit` if given, otherwise `<root>/.strangeloop.toml`. A missing
    /// file yields defaults; an unreadable or malformed one yields defaults and a
    /// warning.
    pub fn load(root: impl Into<PathBuf>, explicit: Option<&Path>) -> Self {
        let root = root.into();
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Self::for_root(root);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read config, using defaults");
                return Self::for_root(root);
            }
        };

        match Self::from_toml(&content) {
            Ok(config) => Self { root, ..config },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::for_root(root)
            }
        }
    }

    fn validate(&self) -> LoopResult<()> {
        if self.max_log_entries == 0 {
            return Err(LoopError::ConfigError(
                "max_log_entries must be at least 1".to_string(),
            ));
        }
        if self.max_history_size == 0 {
            return Err(LoopError::ConfigError(
                "max_history_size must be at least 1".to_string(),
            ));
        }
        if self.history_lookback == 0 {
            return Err(LoopError::ConfigError(
                "history_lookback must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a configured path against the root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn log_path(&self) -> PathBuf {
        self.resolve(&self.log_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.resolve(&self.snapshot_dir)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.resolve(&self.archive_dir)
    }

    pub fn triggers_path(&self) -> PathBuf {
        self.resolve(&self.triggers_file)
    }

    pub fn analogy_registry_path(&self) -> PathBuf {
        self.resolve(&self.analogy_registry)
    }

    pub fn suggestions_path(&self) -> PathBuf {
        self.resolve(&self.suggestions_log)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.resolve(&self.lock_file)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
