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

//! Background pattern monitor
//!
//! Polls the action log and, whenever it has changed since the previous poll,
//! evaluates the trigger rules and appends any finding to the suggestion log.
//! Rules and the analogy registry are re-read on each evaluation so they can
//! be edited while the monitor runs.

use crate::engine::{Finding, TriggerEngine};
use crate::suggestions::SuggestionLog;
use chrono::{DateTime, Utc};
use std::time::Duration;
use strangeloop_core::{LoopConfig, LoopResult};
use strangeloop_storage::{ActionLog, ActionLogFile};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What the monitor last evaluated: log length plus the newest entry's end
/// time, so a rotated log of constant length still counts as changed.
type LogFingerprint = (usize, Option<DateTime<Utc>>);

pub struct PatternMonitor {
    config: LoopConfig,
    log: ActionLogFile,
    suggestions: SuggestionLog,
    last_seen: Option<LogFingerprint>,
}

impl PatternMonitor {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            log: ActionLogFile::new(config.log_path()),
            suggestions: SuggestionLog::new(config.suggestions_path()),
            config,
            last_seen: None,
        }
    }

    pub fn suggestions(&self) -> &SuggestionLog {
        &self.suggestions
    }

    /// Record that monitoring started
    pub fn start(&self) -> LoopResult<()> {
        info!(
            log = %self.log.path().display(),
            interval_secs = self.config.poll_interval_secs,
            "Pattern monitor started"
        );
        self.suggestions
            .append("Meta-cognitive monitor initialized. Watching the action log.")
    }

    /// One poll. Returns the finding written, if any.
    ///
    /// An unreadable log is skipped until the next poll; only failing to
    /// write the suggestion log is an error.
    pub fn tick(&mut self) -> LoopResult<Option<Finding>> {
        let log = match self.log.load() {
            Ok(log) => log,
            Err(e) => {
                warn!(error = %e, "Could not read action log, skipping poll");
                return Ok(None);
            }
        };

        let fingerprint = fingerprint(&log);
        if self.last_seen == Some(fingerprint) {
            return Ok(None);
        }
        self.last_seen = Some(fingerprint);
        debug!(entries = log.len(), "Action log changed, evaluating triggers");

        let engine = TriggerEngine::from_config(&self.config);
        let Some(finding) = engine.evaluate(log.entries()) else {
            return Ok(None);
        };

        info!(pattern = %finding.pattern_name, "Pattern detected");
        if let Err(e) = self.suggestions.append(&engine.render(&finding)) {
            // Unwritten finding: evaluate the same log again next poll
            self.last_seen = None;
            return Err(e);
        }
        Ok(Some(finding))
    }

    /// Poll every `poll_interval_secs` while `keep_running` returns true.
    ///
    /// A failed poll is logged and the next one proceeds as scheduled; only
    /// failing to start the timer runtime is an error.
    pub fn run(&mut self, mut keep_running: impl FnMut() -> bool) -> LoopResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        if let Err(e) = self.start() {
            warn!(error = %e, "MONITOR-ERROR: could not record monitor start");
        }
        let period = self.config.poll_interval().max(Duration::from_millis(100));

        runtime.block_on(async {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while keep_running() {
                interval.tick().await;
                if let Err(e) = self.tick() {
                    warn!(error = %e, "MONITOR-ERROR: poll failed, continuing");
                }
            }
        });
        Ok(())
    }
}

fn fingerprint(log: &ActionLog) -> LogFingerprint {
    (log.len(), log.entries().last().map(|r| r.timestamp_end))
}
