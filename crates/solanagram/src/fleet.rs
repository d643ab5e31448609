// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `solanagram fleet` subcommands.
//!
//! Each subcommand drives one [`FleetManager`] operation and prints its
//! outcome, either as a short human-readable line or as JSON for scripting.
//! Fleet operations never error on runtime failures; the returned `bool`
//! says whether every operation succeeded so `main` can pick the exit code.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde::Serialize;
use solanagram_config::SolanagramConfig;
use solanagram_core::{
    ContainerRuntime, Credentials, ElaborationRule, ForwardTarget, LimitRequest, SessionSource,
    SolanagramError, SourceChannel, TargetType, WorkerHandle, WorkerKind, WorkerSpec,
};
use solanagram_fleet::{FleetManager, Outcome, ReapReport, WorkerStatus};

#[derive(Subcommand, Debug)]
pub enum FleetCommand {
    /// Provision a worker (create, start, inject config, restart).
    Create(CreateArgs),
    /// Show a worker's state, resource usage and progress counters.
    Status(NamedWorker),
    /// Restart a worker.
    Restart(NamedWorker),
    /// Stop and remove a worker. An absent worker counts as removed.
    Remove(NamedWorker),
    /// List managed workers.
    List {
        /// Only this kind.
        #[arg(long)]
        kind: Option<WorkerKind>,
        /// Only workers owned by this user.
        #[arg(long)]
        user_id: Option<i64>,
    },
    /// Remove orphaned workers now.
    Cleanup {
        /// Only this kind.
        #[arg(long)]
        kind: Option<WorkerKind>,
        /// Age threshold in hours (defaults to `reaper.age_threshold_hours`).
        #[arg(long)]
        threshold_hours: Option<u64>,
    },
    /// Replace a running listener's or extractor's elaboration rules and signal a reload.
    UpdateRules {
        #[command(flatten)]
        worker: NamedWorker,
        /// JSON array of elaboration rules.
        #[arg(long)]
        rules_file: PathBuf,
    },
    /// Print the last lines of a worker's log.
    Logs {
        #[command(flatten)]
        worker: NamedWorker,
        #[arg(long, default_value_t = 100)]
        tail: usize,
    },
}

#[derive(Args, Debug)]
pub struct NamedWorker {
    /// Worker kind.
    #[arg(long)]
    pub kind: WorkerKind,
    /// Worker name.
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub kind: WorkerKind,
    #[arg(long)]
    pub user_id: i64,
    #[arg(long, allow_hyphen_values = true)]
    pub source_id: i64,
    #[arg(long)]
    pub source_title: String,
    #[arg(long, default_value = "channel")]
    pub source_type: String,
    /// Forwarder destination type.
    #[arg(long, requires = "target_id")]
    pub target_type: Option<TargetType>,
    /// Forwarder destination: numeric chat id or `@username`.
    #[arg(long, allow_hyphen_values = true, requires = "target_type")]
    pub target_id: Option<String>,
    /// Display name of the destination (defaults to its id).
    #[arg(long)]
    pub target_name: Option<String>,
    #[arg(long)]
    pub processor_id: Option<i64>,
    /// Distinguishes several workers of one user on one source.
    #[arg(long)]
    pub disambiguator: Option<String>,
    #[arg(long, env = "SOLANAGRAM_PHONE")]
    pub phone: String,
    #[arg(long, env = "SOLANAGRAM_API_ID")]
    pub api_id: i32,
    #[arg(long, env = "SOLANAGRAM_API_HASH", hide_env_values = true)]
    pub api_hash: String,
    /// Serialized session.
    #[arg(long, env = "SOLANAGRAM_SESSION", hide_env_values = true, conflicts_with = "session_file")]
    pub session: Option<String>,
    /// Session file to copy into the worker.
    #[arg(long)]
    pub session_file: Option<PathBuf>,
    /// Memory limit such as `256m` (defaults to the kind's default).
    #[arg(long)]
    pub memory: Option<String>,
    /// CPU fraction such as `0.5` (defaults to the kind's default).
    #[arg(long)]
    pub cpu: Option<f64>,
}

impl CreateArgs {
    fn to_spec(&self) -> Result<(WorkerSpec, LimitRequest), SolanagramError> {
        let session = match (&self.session, &self.session_file) {
            (_, Some(path)) => SessionSource::File(path.clone()),
            (Some(s), None) => SessionSource::String(s.clone()),
            (None, None) => {
                return Err(SolanagramError::Config(
                    "either --session or --session-file is required".to_string(),
                ));
            }
        };
        let target = match (self.target_type, &self.target_id) {
            (Some(target_type), Some(id)) => Some(ForwardTarget {
                target_type,
                id: id.clone(),
                name: self.target_name.clone().unwrap_or_else(|| id.clone()),
            }),
            _ => None,
        };
        let spec = WorkerSpec {
            kind: self.kind,
            user_id: self.user_id,
            disambiguator: self.disambiguator.clone(),
            source: SourceChannel {
                id: self.source_id,
                title: self.source_title.clone(),
                chat_type: self.source_type.clone(),
            },
            target,
            processor_id: self.processor_id,
            credentials: Credentials {
                phone: self.phone.clone(),
                api_id: self.api_id,
                api_hash: self.api_hash.clone(),
            },
            session,
        };
        let limits = LimitRequest {
            memory_limit: self.memory.clone(),
            cpu_limit: self.cpu,
        };
        Ok((spec, limits))
    }
}

/// Runs one fleet subcommand. `Ok(false)` means an operation reported failure.
pub async fn run_fleet(
    config: &SolanagramConfig,
    runtime: Arc<dyn ContainerRuntime>,
    command: FleetCommand,
    json: bool,
) -> Result<bool, SolanagramError> {
    let manager = |kind| FleetManager::from_config(runtime.clone(), kind, config);

    match command {
        FleetCommand::Create(args) => {
            let (spec, limits) = args.to_spec()?;
            let outcome = manager(spec.kind)?.create(&spec, &limits).await;
            Ok(print_outcome(&outcome, json))
        }
        FleetCommand::Status(worker) => {
            let status = manager(worker.kind)?.status(&worker.name).await;
            print_status(&status, json);
            Ok(true)
        }
        FleetCommand::Restart(worker) => {
            let outcome = manager(worker.kind)?.restart(&worker.name).await;
            Ok(print_outcome(&outcome, json))
        }
        FleetCommand::Remove(worker) => {
            let outcome = manager(worker.kind)?.stop_and_remove(&worker.name).await;
            Ok(print_outcome(&outcome, json))
        }
        FleetCommand::List { kind, user_id } => {
            let mut handles = Vec::new();
            for kind in kinds(kind) {
                let fleet = manager(kind)?;
                let found = match user_id {
                    Some(user_id) => fleet.list_for_user(user_id).await?,
                    None => fleet.list_all().await?,
                };
                handles.extend(found);
            }
            print_handles(&handles, json);
            Ok(true)
        }
        FleetCommand::Cleanup {
            kind,
            threshold_hours,
        } => {
            let hours = threshold_hours.unwrap_or(config.reaper.age_threshold_hours);
            let threshold = Duration::from_secs(hours * 3600);
            let mut report = ReapReport::default();
            for kind in kinds(kind) {
                report.merge(manager(kind)?.cleanup_orphans(threshold).await);
            }
            print_reap_report(&report, json);
            Ok(report.failed.is_empty())
        }
        FleetCommand::UpdateRules {
            worker,
            rules_file,
        } => {
            let raw = tokio::fs::read_to_string(&rules_file).await.map_err(|e| {
                SolanagramError::Config(format!("cannot read {}: {e}", rules_file.display()))
            })?;
            let rules: Vec<ElaborationRule> = serde_json::from_str(&raw).map_err(|e| {
                SolanagramError::Config(format!("invalid rules in {}: {e}", rules_file.display()))
            })?;
            let outcome = manager(worker.kind)?.update_rules(&worker.name, &rules).await;
            Ok(print_outcome(&outcome, json))
        }
        FleetCommand::Logs { worker, tail } => {
            let outcome = manager(worker.kind)?.logs(&worker.name, tail).await;
            if outcome.ok && !json {
                print!("{}", outcome.message);
                return Ok(true);
            }
            Ok(print_outcome(&outcome, json))
        }
    }
}

fn kinds(only: Option<WorkerKind>) -> Vec<WorkerKind> {
    match only {
        Some(kind) => vec![kind],
        None => WorkerKind::ALL.to_vec(),
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_outcome(outcome: &Outcome, json: bool) -> bool {
    if json {
        print_json(outcome);
    } else if use_color() {
        use colored::Colorize;
        let mark = if outcome.ok { "✓".green() } else { "✗".red() };
        println!("  {mark} {}: {}", outcome.name.bold(), outcome.message);
    } else {
        let mark = if outcome.ok { "[OK]" } else { "[FAIL]" };
        println!("  {mark} {}: {}", outcome.name, outcome.message);
    }
    outcome.ok
}

fn print_status(status: &WorkerStatus, json: bool) {
    if json {
        print_json(status);
        return;
    }
    println!();
    println!("  {}", status.name);
    println!("  {}", "-".repeat(35));
    println!("    State:      {}", status.state);
    if let Some(usage) = &status.resources {
        println!(
            "    Memory:     {:.1}% of {} bytes",
            usage.memory_percent, usage.memory_limit
        );
        println!("    CPU:        {:.1}%", usage.cpu_percent);
    }
    let c = &status.counters;
    println!(
        "    Messages:   {} processed, {} forwarded, {} failed, {} duplicates",
        c.messages_processed, c.messages_forwarded, c.messages_failed, c.duplicates_skipped
    );
    if let Some(last) = &c.last_message_at {
        println!("    Last:       {last}");
    }
    if let Some(detail) = &status.detail {
        println!("    Note:       {detail}");
    }
    println!();
}

fn print_handles(handles: &[WorkerHandle], json: bool) {
    if json {
        print_json(&handles);
        return;
    }
    if handles.is_empty() {
        println!("  no managed workers");
        return;
    }
    for handle in handles {
        println!(
            "  {:<48} {:<10} {}",
            handle.name,
            handle.state.to_string(),
            handle.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_reap_report(report: &ReapReport, json: bool) {
    if json {
        print_json(report);
        return;
    }
    println!(
        "  scanned {}, removed {}",
        report.scanned,
        report.removed.len()
    );
    for name in &report.removed {
        println!("    removed {name}");
    }
    for (name, reason) in &report.failed {
        println!("    failed  {name}: {reason}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: FleetCommand,
    }

    fn parse(args: &[&str]) -> FleetCommand {
        TestCli::try_parse_from(std::iter::once("fleet").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn create_args_build_a_forwarder_spec() {
        let FleetCommand::Create(args) = parse(&[
            "create",
            "--kind",
            "forwarder",
            "--user-id",
            "7",
            "--source-id",
            "-100123",
            "--source-title",
            "Alpha Group",
            "--target-type",
            "user",
            "--target-id",
            "@bob",
            "--phone",
            "+1555",
            "--api-id",
            "11",
            "--api-hash",
            "hash",
            "--session",
            "token",
            "--memory",
            "128m",
        ]) else {
            panic!("expected create");
        };
        let (spec, limits) = args.to_spec().unwrap();
        assert_eq!(spec.kind, WorkerKind::Forwarder);
        assert_eq!(spec.source.id, -100123);
        let target = spec.target.unwrap();
        assert_eq!(target.target_type, TargetType::User);
        assert_eq!(target.name, "@bob");
        assert_eq!(spec.session, SessionSource::String("token".into()));
        assert_eq!(limits.memory_limit.as_deref(), Some("128m"));
        assert_eq!(limits.cpu_limit, None);
    }

    #[test]
    fn create_without_session_is_a_config_error() {
        let FleetCommand::Create(args) = parse(&[
            "create",
            "--kind",
            "logger",
            "--user-id",
            "1",
            "--source-id",
            "5",
            "--source-title",
            "x",
            "--phone",
            "+1",
            "--api-id",
            "1",
            "--api-hash",
            "h",
        ]) else {
            panic!("expected create");
        };
        assert!(matches!(args.to_spec(), Err(SolanagramError::Config(_))));
    }

    #[test]
    fn unknown_kind_is_rejected_by_the_parser() {
        let parsed = TestCli::try_parse_from(["fleet", "status", "--kind", "robot", "w"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn kinds_defaults_to_all() {
        assert_eq!(kinds(None).len(), 4);
        assert_eq!(kinds(Some(WorkerKind::Logger)), vec![WorkerKind::Logger]);
    }
}
