// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker runtime for the Solanagram fleet.
//!
//! A worker reads the config document the control plane injected, connects
//! to the messaging service under a reconnect supervisor, and runs its
//! kind's pipeline on every message from the source channel. Elaboration
//! rules can be swapped at runtime through a reload signal.

pub mod bootstrap;
pub mod counters;
pub mod forward;
pub mod pipeline;
pub mod reload;
pub mod runtime;
pub mod supervisor;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use solanagram_config::SolanagramConfig;
use solanagram_core::{MessageStore, MessagingService, SolanagramError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use counters::CounterArtifact;
pub use forward::ForwardPolicy;
pub use pipeline::{MessageReport, Pipeline};
pub use reload::{ReloadFlag, RuleRecords, RuleSet};
pub use runtime::{Exit, WorkerRuntime};
pub use supervisor::{ConnectionState, ReconnectPolicy, Supervisor};

/// Boots a worker from `config` and runs it until `cancel` fires or the
/// supervisor gives up.
///
/// Startup problems (no config document, unreadable rules, no session) are
/// returned as errors before any connection is attempted.
pub async fn run(
    config: &SolanagramConfig,
    messaging: Arc<dyn MessagingService>,
    store: Arc<dyn MessageStore>,
    cancel: CancellationToken,
) -> Result<Exit, SolanagramError> {
    let worker = &config.worker;

    let document = bootstrap::wait_for_document(
        &PathBuf::from(&worker.config_path),
        Duration::from_secs(worker.config_wait_secs),
    )
    .await?;
    let session = bootstrap::session_source(&document, |key| std::env::var(key).ok())?;

    let rules_path = PathBuf::from(&worker.rules_path);
    let initial = reload::load_rules(&rules_path).await?;
    info!(
        worker = %document.worker_name,
        kind = %document.kind,
        rules = initial.len(),
        "worker configured"
    );
    let records = document
        .kind
        .runs_elaborations()
        .then(|| reload::RuleRecords::new(store.clone(), document.rule_owner()));
    if let Some(records) = &records {
        records.publish(&initial).await;
    }
    let rules = reload::rule_set(initial);

    // Background tasks stop with the runtime even when it terminates on its own.
    let background = cancel.child_token();
    let flag = ReloadFlag::new();
    reload::spawn_signal_listener(flag.clone(), background.clone())?;
    let reloader = tokio::spawn(reload::reload_loop(
        flag,
        rules.clone(),
        rules_path,
        records,
        Duration::from_millis(worker.reload_poll_ms.max(1)),
        background.clone(),
    ));

    let pipeline = Pipeline::new(
        document.kind,
        document.session_id.clone(),
        document.target.as_ref().map(|t| t.id.clone()),
        messaging.clone(),
        store,
        ForwardPolicy::from_config(&worker.forward_retry),
    );
    let supervisor = Supervisor::new(ReconnectPolicy::from_config(&worker.reconnect));
    let mut runtime = WorkerRuntime::new(
        document,
        session,
        messaging,
        pipeline,
        rules,
        CounterArtifact::new(&worker.counters_path),
        supervisor,
    );

    let exit = runtime.run(cancel).await;
    background.cancel();
    let _ = reloader.await;

    if let Exit::Terminated(reason) = &exit {
        error!(%reason, "worker terminated");
    }
    Ok(exit)
}
