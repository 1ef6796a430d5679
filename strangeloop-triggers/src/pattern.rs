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

//! Trigger pattern configuration
//!
//! Patterns come from a human-edited YAML (or JSON) document:
//!
//! ```yaml
//! patterns:
//!   - name: Analysis Paralysis
//!     type: sequence
//!     threshold: 5
//!     tools: [ls, cat, grep, read_file]
//!     message: "You've run {count} read-only commands in a row ({tool_list})."
//!     analogy_id: map_is_not_territory
//!   - name: Tool Fixation
//!     type: repetition
//!     threshold: 3
//!     message: "`{tool_name}` failed the same way {count} times."
//!     contextual_messages:
//!       pytest: "The tests keep failing identically. Read the traceback."
//! ```
//!
//! Each rule is validated on its own. A bad rule is dropped with a warning;
//! the remaining rules still load.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

/// Fires when the last `threshold` consecutive entries all use one of `tools`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePattern {
    pub name: String,
    pub tools: BTreeSet<String>,
    pub threshold: usize,
    #[serde(alias = "message_template")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analogy_id: Option<String>,
}

/// Fires when the same tool fails with the same output `threshold` times
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionPattern {
    pub name: String,
    pub threshold: usize,
    #[serde(alias = "message_template")]
    pub message: String,
    /// keyword -> message used when the keyword occurs in the failing command
    #[serde(default)]
    pub contextual_messages: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analogy_id: Option<String>,
}

/// A declarative detection rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TriggerPattern {
    Sequence(SequencePattern),
    Repetition(RepetitionPattern),
}

impl TriggerPattern {
    pub fn name(&self) -> &str {
        match self {
            TriggerPattern::Sequence(p) => &p.name,
            TriggerPattern::Repetition(p) => &p.name,
        }
    }

    pub fn threshold(&self) -> usize {
        match self {
            TriggerPattern::Sequence(p) => p.threshold,
            TriggerPattern::Repetition(p) => p.threshold,
        }
    }

    pub fn analogy_id(&self) -> Option<&str> {
        match self {
            TriggerPattern::Sequence(p) => p.analogy_id.as_deref(),
            TriggerPattern::Repetition(p) => p.analogy_id.as_deref(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.name().trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if self.threshold() == 0 {
            return Err("threshold must be at least 1".to_string());
        }
        if let TriggerPattern::Sequence(p) = self {
            if p.tools.is_empty() {
                return Err("sequence pattern lists no tools".to_string());
            }
        }
        Ok(())
    }
}

/// Validated rules, in declared order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerSet {
    patterns: Vec<TriggerPattern>,
}

impl TriggerSet {
    pub fn new(patterns: Vec<TriggerPattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[TriggerPattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Load rules from a file.
    ///
    /// A missing, unreadable or malformed file yields an empty set (pattern
    /// detection becomes a no-op) and a warning.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, &path.display().to_string()),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Trigger configuration unavailable, pattern detection disabled"
                );
                Self::default()
            }
        }
    }

    /// Parse a YAML/JSON document; `origin` only labels warnings.
    ///
    /// Accepts either `{patterns: [...]}` or a bare list of rules.
    pub fn parse(content: &str, origin: &str) -> Self {
        let doc: serde_yaml::Value = match serde_yaml::from_str(content) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(origin, error = %e, "Malformed trigger configuration, pattern detection disabled");
                return Self::default();
            }
        };

        let rules = match doc {
            serde_yaml::Value::Sequence(rules) => rules,
            serde_yaml::Value::Mapping(mut map) => {
                match map.remove("patterns") {
                    Some(serde_yaml::Value::Sequence(rules)) => rules,
                    _ => {
                        warn!(origin, "Trigger configuration has no `patterns` list");
                        return Self::default();
                    }
                }
            }
            _ => {
                warn!(origin, "Trigger configuration is not a list or mapping");
                return Self::default();
            }
        };

        let mut patterns = Vec::with_capacity(rules.len());
        for (index, rule) in rules.into_iter().enumerate() {
            let label = rule
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("<unnamed>")
                .to_string();

            let pattern = match serde_yaml::from_value::<TriggerPattern>(rule) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!(origin, index, rule = %label, error = %e, "Skipping invalid trigger rule");
                    continue;
                }
            };
            if let Err(reason) = pattern.validate() {
                warn!(origin, index, rule = %label, %reason, "Skipping invalid trigger rule");
                continue;
            }
            patterns.push(pattern);
        }

        debug!(origin, count = patterns.len(), "Loaded trigger patterns");
        Self { patterns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
patterns:
  - name: Analysis Paralysis
    type: sequence
    threshold: 5
    tools: [ls, cat, grep]
    message: "{count} read-only commands: {tool_list}"
    analogy_id: map
  - name: Tool Fixation
    type: repetition
    threshold: 3
    message: "{tool_name} failed {count} times"
    contextual_messages:
      pytest: "Read the traceback."
"#;

    #[test]
    fn test_parse_both_variants() {
        let set = TriggerSet::parse(CONFIG, "test");
        assert_eq!(set.len(), 2);

        match &set.patterns()[0] {
            TriggerPattern::Sequence(p) => {
                assert_eq!(p.threshold, 5);
                assert!(p.tools.contains("grep"));
                assert_eq!(p.analogy_id.as_deref(), Some("map"));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
        match &set.patterns()[1] {
            TriggerPattern::Repetition(p) => {
                assert_eq!(p.contextual_messages["pytest"], "Read the traceback.");
            }
            other => panic!("expected repetition, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_rules_are_dropped_individually() {
        let set = TriggerSet::parse(
            r#"
- name: missing threshold
  type: sequence
  tools: [ls]
  message: m
- name: zero threshold
  type: repetition
  threshold: 0
  message: m
- name: unknown kind
  type: oscillation
  threshold: 2
  message: m
- name: no tools
  type: sequence
  tools: []
  threshold: 2
  message: m
- name: good
  type: repetition
  threshold: 2
  message: m
"#,
            "test",
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.patterns()[0].name(), "good");
    }

    #[test]
    fn test_json_is_accepted() {
        let set = TriggerSet::parse(
            r#"{"patterns": [{"name": "x", "type": "sequence", "threshold": 2, "tools": ["ls"], "message": "m"}]}"#,
            "test",
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_malformed_or_missing_is_empty() {
        assert!(TriggerSet::parse("patterns: [", "test").is_empty());
        assert!(TriggerSet::parse("just a string", "test").is_empty());
        assert!(TriggerSet::load(Path::new("/nonexistent/meta_triggers.yaml")).is_empty());
    }
}
