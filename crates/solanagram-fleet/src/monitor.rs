// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status and resource monitoring.
//!
//! Utilization math never divides by zero and never goes negative. Progress
//! counters are read opportunistically: a missing or garbled artifact
//! reads as all zeros.

use serde::Serialize;
use solanagram_core::traits::{ContainerRuntime, StatsSnapshot};
use solanagram_core::{ProgressCounters, WorkerState};
use tracing::debug;

use crate::inject::read_file_command;

/// Resource utilization of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceUsage {
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub cpu_percent: f64,
}

/// Point-in-time view of a worker. Always produced, even when the worker
/// or the runtime is gone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerStatus {
    pub name: String,
    pub state: WorkerState,
    pub running: bool,
    pub resources: Option<ResourceUsage>,
    pub counters: ProgressCounters,
    /// Why the status is incomplete, if it is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WorkerStatus {
    pub fn not_found(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: WorkerState::NotFound,
            running: false,
            resources: None,
            counters: ProgressCounters::default(),
            detail: None,
        }
    }

    pub fn unknown(name: &str, detail: String) -> Self {
        Self {
            state: WorkerState::Error,
            detail: Some(detail),
            ..Self::not_found(name)
        }
    }
}

pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    usage as f64 / limit as f64 * 100.0
}

/// CPU share between the snapshot's previous and current samples.
pub fn cpu_percent(stats: &StatsSnapshot) -> f64 {
    let cpu_delta = stats.cpu_total as i128 - stats.precpu_total as i128;
    let system_delta = stats.system_total as i128 - stats.presystem_total as i128;
    if cpu_delta <= 0 || system_delta <= 0 {
        return 0.0;
    }
    cpu_delta as f64 / system_delta as f64 * 100.0
}

pub fn usage_from_stats(stats: &StatsSnapshot) -> ResourceUsage {
    ResourceUsage {
        memory_usage: stats.memory_usage,
        memory_limit: stats.memory_limit,
        memory_percent: memory_percent(stats.memory_usage, stats.memory_limit),
        cpu_percent: cpu_percent(stats),
    }
}

pub fn parse_counters(raw: &str) -> ProgressCounters {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Reads the worker's counter artifact; any failure yields zeros.
pub async fn read_counters(runtime: &dyn ContainerRuntime, name: &str, path: &str) -> ProgressCounters {
    match runtime.exec(name, read_file_command(path)).await {
        Ok(out) if out.success() => parse_counters(&out.output),
        Ok(out) => {
            debug!(worker = %name, exit_code = out.exit_code, "counter artifact unavailable");
            ProgressCounters::default()
        }
        Err(e) => {
            debug!(worker = %name, error = %e, "counter artifact unreadable");
            ProgressCounters::default()
        }
    }
}

/// Samples resource usage; `None` when the runtime cannot report it.
pub async fn sample_usage(runtime: &dyn ContainerRuntime, name: &str) -> Option<ResourceUsage> {
    match runtime.stats(name).await {
        Ok(stats) => Some(usage_from_stats(&stats)),
        Err(e) => {
            debug!(worker = %name, error = %e, "stats unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_percent_with_zero_limit_is_zero() {
        assert_eq!(memory_percent(123, 0), 0.0);
        assert_eq!(memory_percent(50, 200), 25.0);
    }

    #[test]
    fn cpu_percent_from_deltas() {
        let stats = StatsSnapshot {
            cpu_total: 300,
            precpu_total: 100,
            system_total: 2_000,
            presystem_total: 1_000,
            ..Default::default()
        };
        assert_eq!(cpu_percent(&stats), 20.0);
    }

    #[test]
    fn cpu_percent_never_negative_or_nan() {
        let backwards = StatsSnapshot {
            cpu_total: 100,
            precpu_total: 300,
            system_total: 2_000,
            presystem_total: 1_000,
            ..Default::default()
        };
        assert_eq!(cpu_percent(&backwards), 0.0);

        let idle_system = StatsSnapshot {
            cpu_total: 300,
            precpu_total: 100,
            system_total: 1_000,
            presystem_total: 1_000,
            ..Default::default()
        };
        assert_eq!(cpu_percent(&idle_system), 0.0);
        assert_eq!(cpu_percent(&StatsSnapshot::default()), 0.0);
    }

    #[test]
    fn garbled_counters_read_as_zero() {
        assert_eq!(parse_counters("not json"), ProgressCounters::default());
        assert_eq!(parse_counters(""), ProgressCounters::default());
        let partial = parse_counters(r#"{"messages_processed": 9}"#);
        assert_eq!(partial.messages_processed, 9);
        assert_eq!(partial.messages_forwarded, 0);
    }
}
