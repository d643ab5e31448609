// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `solanagram reaper`: periodic orphan cleanup across every worker kind.

use std::sync::Arc;
use std::time::Duration;

use solanagram_config::SolanagramConfig;
use solanagram_core::{ContainerRuntime, SolanagramError, WorkerKind};
use solanagram_fleet::FleetManager;
use solanagram_fleet::reaper::run_periodic;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run_reaper(
    config: &SolanagramConfig,
    runtime: Arc<dyn ContainerRuntime>,
    cancel: CancellationToken,
) -> Result<(), SolanagramError> {
    let managers = WorkerKind::ALL
        .iter()
        .map(|kind| FleetManager::from_config(runtime.clone(), *kind, config))
        .collect::<Result<Vec<_>, _>>()?;

    let interval = Duration::from_secs(config.reaper.interval_secs.max(1));
    let threshold = Duration::from_secs(config.reaper.age_threshold_hours * 3600);
    info!(
        interval_secs = interval.as_secs(),
        threshold_hours = config.reaper.age_threshold_hours,
        "reaper started"
    );

    let report = run_periodic(&managers, interval, threshold, cancel).await;
    info!(
        scanned = report.scanned,
        removed = report.removed.len(),
        failed = report.failed.len(),
        "reaper finished"
    );
    Ok(())
}
