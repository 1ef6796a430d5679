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

//! Analogy registry
//!
//! A JSON object mapping analogy ids to `{rationale, trigger}`. Only used to
//! decorate findings, so every failure to read it degrades to an empty
//! registry.

use std::collections::BTreeMap;
use std::path::Path;
use strangeloop_core::Analogy;
use strangeloop_storage::{read_json, Loaded};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalogyRegistry {
    entries: BTreeMap<String, Analogy>,
}

impl AnalogyRegistry {
    pub fn new(entries: BTreeMap<String, Analogy>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Self {
        match read_json::<BTreeMap<String, Analogy>>(path) {
            Ok(Loaded::Present(entries)) => Self { entries },
            Ok(Loaded::Missing) => {
                debug!(path = %path.display(), "No analogy registry");
                Self::default()
            }
            Ok(Loaded::Corrupt(reason)) => {
                warn!(path = %path.display(), %reason, "Ignoring malformed analogy registry");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read analogy registry");
                Self::default()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Analogy> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> &BTreeMap<String, Analogy> {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The decoration line for `id`, if the registry knows it
    pub fn describe(&self, id: &str) -> Option<String> {
        self.get(id).map(|a| {
            format!(
                "Analogy '{}': {} (trigger: {})",
                id, a.rationale, a.trigger
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_and_describe() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"map_is_not_territory": {"rationale": "Reading is not doing", "trigger": "Analysis Paralysis"}}"#,
        )
        .unwrap();

        let registry = AnalogyRegistry::load(&path);
        assert_eq!(
            registry.describe("map_is_not_territory").unwrap(),
            "Analogy 'map_is_not_territory': Reading is not doing (trigger: Analysis Paralysis)"
        );
        assert!(registry.describe("unknown").is_none());
    }

    #[test]
    fn test_missing_or_corrupt_is_empty() {
        let dir = tempdir().unwrap();
        assert!(AnalogyRegistry::load(&dir.path().join("none.json")).is_empty());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(AnalogyRegistry::load(&path).is_empty());
    }
}
