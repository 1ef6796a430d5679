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

//! Strangeloop pattern triggers
//!
//! Read-only detection of unproductive agent behaviour over the tail of the
//! action log. Findings are advisory: nothing here ever writes to the log.
//!
//! ## Components
//!
//! - [`TriggerSet`]: validated rules loaded from the trigger configuration
//! - [`TriggerEngine`]: stateless evaluator, first finding wins
//! - [`AnalogyRegistry`]: optional decoration for findings
//! - [`PatternMonitor`]: polling loop writing to the [`SuggestionLog`]

pub mod analogy;
pub mod engine;
pub mod monitor;
pub mod pattern;
pub mod suggestions;
pub mod template;

pub use analogy::AnalogyRegistry;
pub use engine::{Finding, TriggerEngine};
pub use monitor::PatternMonitor;
pub use pattern::{RepetitionPattern, SequencePattern, TriggerPattern, TriggerSet};
pub use suggestions::SuggestionLog;
pub use template::TemplateVars;
