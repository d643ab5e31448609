// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Orphan reaping: selection of reclaimable workers and the periodic loop.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use solanagram_core::{WorkerHandle, WorkerState};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::manager::FleetManager;

/// Result of one reaper pass over one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    pub scanned: usize,
    pub removed: Vec<String>,
    /// `(name, reason)` for every worker that could not be removed.
    pub failed: Vec<(String, String)>,
}

impl ReapReport {
    pub fn merge(&mut self, other: ReapReport) {
        self.scanned += other.scanned;
        self.removed.extend(other.removed);
        self.failed.extend(other.failed);
    }
}

/// Whether `handle` is an orphan at `now`.
///
/// Older than `threshold` and not running, or simply older than
/// `threshold` when `any_state` is set.
pub fn is_orphan(
    handle: &WorkerHandle,
    now: DateTime<Utc>,
    threshold: Duration,
    any_state: bool,
) -> bool {
    let age = now.signed_duration_since(handle.created_at);
    let old_enough = age
        .to_std()
        .map(|age| age > threshold)
        .unwrap_or(false);
    old_enough && (any_state || handle.state != WorkerState::Running)
}

/// Runs `cleanup_orphans` for every manager each `interval` until cancelled.
pub async fn run_periodic(
    managers: &[FleetManager],
    interval: Duration,
    threshold: Duration,
    cancel: CancellationToken,
) -> ReapReport {
    let mut total = ReapReport::default();
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(removed = total.removed.len(), "reaper stopped");
                return total;
            }
            _ = ticker.tick() => {
                for manager in managers {
                    let report = manager.cleanup_orphans(threshold).await;
                    if !report.failed.is_empty() {
                        warn!(
                            kind = %manager.kind(),
                            failed = report.failed.len(),
                            "some orphans could not be removed"
                        );
                    }
                    total.merge(report);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn handle(hours_old: i64, state: WorkerState) -> WorkerHandle {
        WorkerHandle {
            id: "id".into(),
            name: "w".into(),
            state,
            created_at: Utc::now() - chrono::Duration::hours(hours_old),
            labels: HashMap::new(),
        }
    }

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn old_stopped_worker_is_an_orphan() {
        assert!(is_orphan(&handle(30, WorkerState::Stopped), Utc::now(), DAY, false));
    }

    #[test]
    fn young_or_running_workers_are_kept() {
        assert!(!is_orphan(&handle(1, WorkerState::Stopped), Utc::now(), DAY, false));
        assert!(!is_orphan(&handle(30, WorkerState::Running), Utc::now(), DAY, false));
    }

    #[test]
    fn any_state_reaps_old_running_workers() {
        assert!(is_orphan(&handle(30, WorkerState::Running), Utc::now(), DAY, true));
        assert!(!is_orphan(&handle(1, WorkerState::Running), Utc::now(), DAY, true));
    }

    #[test]
    fn future_creation_time_is_never_an_orphan() {
        assert!(!is_orphan(&handle(-5, WorkerState::Stopped), Utc::now(), DAY, true));
    }
}
