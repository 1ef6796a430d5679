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

//! Strangeloop CLI
//!
//! Command-line front end for the agent session protocol: log commands,
//! check for unproductive patterns, and consolidate sessions into wisdom.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strangeloop_core::LoopConfig;
use strangeloop_storage::{ActionLogFile, SessionRecorder};
use strangeloop_triggers::{PatternMonitor, TriggerEngine};
use strangeloop_wisdom::{
    export_packet, import_packet, Consolidation, Consolidator, LoopMetrics, SessionNotes,
    SnapshotStore,
};
use tracing::{info, Level};

const CHECK_PASSED: &str = "Meta-cognitive check passed. No obvious loops or issues detected.";

#[derive(Parser)]
#[command(name = "strangeloop")]
#[command(about = "Strangeloop - agent session protocol", long_about = None)]
struct Cli {
    /// Working directory holding the session state
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <root>/.strangeloop.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command and record it in the action log
    Exec {
        /// Why the command is being run
        #[arg(long, default_value = "")]
        reason: String,

        /// What was decided before running it
        #[arg(long, default_value = "")]
        decision: String,

        /// The command line, after `--`. A single argument is run as a shell
        /// line; several are quoted word by word.
        #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Evaluate trigger patterns once against the action log
    Check,

    /// Watch the action log and append findings to the suggestion log
    Monitor {
        /// Run a single poll and exit
        #[arg(long)]
        once: bool,

        /// Poll interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Fold the action log into a new wisdom snapshot
    Consolidate {
        /// Decision made this session (repeatable)
        #[arg(long = "decision")]
        decisions: Vec<String>,

        /// Lesson learned this session (repeatable)
        #[arg(long = "lesson")]
        lessons: Vec<String>,

        /// File with one decision per line
        #[arg(long)]
        decisions_file: Option<PathBuf>,

        /// File with one lesson per line
        #[arg(long)]
        lessons_file: Option<PathBuf>,

        /// Free-text session summary
        #[arg(long)]
        summary: Option<String>,
    },

    /// Show metrics for the cumulative wisdom state
    Metrics,

    /// Remove stored output no longer referenced by the action log
    Gc,

    /// Export decisions, lessons and analogies to a packet file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Merge a packet file into the wisdom state
    Import {
        /// Packet file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output and reports
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = LoopConfig::load(&cli.root, cli.config.as_deref());

    match cli.command {
        Commands::Exec {
            reason,
            decision,
            command,
        } => {
            let command = command_line(&command);
            let record = SessionRecorder::from_config(&config)
                .append(&command, &reason, &decision)
                .context("Failed to record command")?;
            std::process::exit(record.exit_code);
        }

        Commands::Check => {
            let log = ActionLogFile::new(config.log_path())
                .load()
                .context("Failed to read action log")?;
            let engine = TriggerEngine::from_config(&config);
            let finding = engine.evaluate(log.entries());

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&finding)?);
            } else {
                match finding {
                    Some(f) => println!("{}", engine.render(&f)),
                    None => println!("{}", CHECK_PASSED),
                }
            }
        }

        Commands::Monitor { once, interval } => {
            let mut config = config;
            if let Some(secs) = interval {
                config.poll_interval_secs = secs;
            }
            let mut monitor = PatternMonitor::new(config);
            if once {
                match monitor.tick().context("Monitor poll failed")? {
                    Some(f) => println!("⚠ {}: {}", f.pattern_name, f.message),
                    None => println!("{}", CHECK_PASSED),
                }
            } else {
                monitor.run(|| true).context("Monitor stopped")?;
            }
        }

        Commands::Consolidate {
            decisions,
            lessons,
            decisions_file,
            lessons_file,
            summary,
        } => {
            let mut notes = SessionNotes {
                decisions,
                lessons,
                summary: None,
            }
            .with_summary(summary);
            if let Some(path) = &decisions_file {
                notes = notes
                    .decisions_from_file(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
            }
            if let Some(path) = &lessons_file {
                notes = notes
                    .lessons_from_file(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
            }

            let outcome = Consolidator::from_config(&config)
                .consolidate(&notes)
                .context("Consolidation failed")?;
            print_consolidation(&outcome);
        }

        Commands::Metrics => {
            let state = snapshots(&config)
                .load_state()
                .context("Failed to load wisdom state")?;
            let metrics = LoopMetrics::from_state(&state, config.improvement_interval);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("Wisdom version:   {}", metrics.version);
                println!("Sessions:         {}", metrics.sessions);
                println!(
                    "Actions:          {} ({} failed, {:.1}%)",
                    metrics.actions,
                    metrics.failed_actions,
                    metrics.failure_rate() * 100.0
                );
                println!("Decisions:        {}", metrics.decisions);
                println!("Lessons:          {}", metrics.lessons);
                println!("Analogies:        {}", metrics.analogies);
                println!("Proven workflows: {}", metrics.proven_workflows);
                if metrics.improvement_due {
                    println!(
                        "\n⚠ {} sessions completed: time for a recursive improvement review.",
                        metrics.sessions
                    );
                }
            }
        }

        Commands::Gc => {
            let report = SessionRecorder::from_config(&config)
                .collect_garbage()
                .context("Garbage collection failed")?;
            info!(removed = report.removed, "Collected output store");
            println!(
                "✓ Removed {} objects ({} bytes), {} retained",
                report.removed, report.bytes_freed, report.retained
            );
        }

        Commands::Export { file } => {
            let packet = export_packet(&snapshots(&config), &file)
                .with_context(|| format!("Failed to export to {}", file.display()))?;
            println!(
                "✓ Exported {} decisions, {} lessons, {} analogies, {} workflows to {}",
                packet.decisions.len(),
                packet.lessons.len(),
                packet.analogies.len(),
                packet.workflows.len(),
                file.display()
            );
        }

        Commands::Import { file } => {
            let (report, written) =
                import_packet(&snapshots(&config), &config.lock_path(), &file)
                    .with_context(|| format!("Failed to import {}", file.display()))?;
            println!(
                "✓ Imported {} decisions, {} lessons, {} analogies, {} workflows",
                report.decisions_added,
                report.lessons_added,
                report.analogies_added,
                report.workflows_added
            );
            if let Some(written) = written {
                println!("  Snapshot: {}", written.path.display());
                println!("  Checksum: {}", written.checksum);
            }
        }
    }

    Ok(())
}

/// Rebuild the command line from argv
fn command_line(args: &[String]) -> String {
    match args {
        [line] => line.clone(),
        words => shell_words::join(words),
    }
}

fn snapshots(config: &LoopConfig) -> SnapshotStore {
    SnapshotStore::new(config.snapshot_path(), config.archive_path())
}

fn print_consolidation(outcome: &Consolidation) {
    match outcome {
        Consolidation::NothingToConsolidate => {
            println!("Action log is empty. Nothing to consolidate.");
        }
        Consolidation::AlreadyConsolidated {
            session_id,
            archived_snapshot,
            archived_log,
        } => {
            println!("Session {} was already consolidated.", session_id);
            if let Some(path) = archived_snapshot {
                println!("  Archived previous snapshot: {}", path.display());
            }
            if let Some(path) = archived_log {
                println!("  Archived log: {}", path.display());
            }
        }
        Consolidation::Consolidated(report) => {
            println!("✓ Consolidated session {}", report.state.version);
            println!("  Snapshot: {}", report.snapshot.display());
            println!("  Checksum: {}", report.checksum);
            println!(
                "  New decisions: {}, new lessons: {}, new proven workflows: {}",
                report.decisions_added, report.lessons_added, report.workflows_added
            );
            if let Some(path) = &report.archived_snapshot {
                println!("  History rotated, previous snapshot: {}", path.display());
            }
            if let Some(path) = &report.archived_log {
                println!("  Archived log: {}", path.display());
            }
        }
    }
}
