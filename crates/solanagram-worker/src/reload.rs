// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hot reload of the elaboration rule list.
//!
//! The OS signal only raises a flag. A timer loop polls the flag, re-reads
//! the rules file and swaps the whole list in one store, so a message being
//! processed keeps the snapshot it started with and the next message sees
//! the new list in full. The messaging connection is never touched.
//!
//! Workers that run elaborations also publish every list they load to the
//! store, so the rule records the pipeline bumps counters on always exist.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use solanagram_core::{ElaborationRule, MessageStore, SolanagramError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared, wholesale-replaced rule list.
pub type RuleSet = Arc<ArcSwap<Vec<ElaborationRule>>>;

pub fn rule_set(rules: Vec<ElaborationRule>) -> RuleSet {
    Arc::new(ArcSwap::from_pointee(rules))
}

/// "Reload pending" marker set from the signal handler.
#[derive(Debug, Clone, Default)]
pub struct ReloadFlag(Arc<AtomicBool>);

impl ReloadFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Store-side copy of one listener's rule list.
#[derive(Clone)]
pub struct RuleRecords {
    store: Arc<dyn MessageStore>,
    owner: i64,
}

impl RuleRecords {
    pub fn new(store: Arc<dyn MessageStore>, owner: i64) -> Self {
        Self { store, owner }
    }

    /// Syncs `rules` into the store. A failure only costs counters, so it
    /// is logged and the rules are still applied.
    pub async fn publish(&self, rules: &[ElaborationRule]) {
        match self.store.sync_rules(self.owner, rules).await {
            Ok(()) => debug!(listener_id = self.owner, rules = rules.len(), "rule records synced"),
            Err(e) => warn!(listener_id = self.owner, error = %e, "rule records not synced"),
        }
    }
}

/// Reads the rules file. A missing file is an empty rule set.
pub async fn load_rules(path: &Path) -> Result<Vec<ElaborationRule>, SolanagramError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(SolanagramError::Config(format!(
                "cannot read rules file {}: {e}",
                path.display()
            )));
        }
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|e| {
        SolanagramError::Config(format!("invalid rules file {}: {e}", path.display()))
    })
}

/// Re-reads the rules file into `rules`. A broken file keeps the old list.
pub async fn apply_reload(rules: &RuleSet, path: &Path, records: Option<&RuleRecords>) -> bool {
    match load_rules(path).await {
        Ok(next) => {
            if let Some(records) = records {
                records.publish(&next).await;
            }
            let active = next.iter().filter(|r| r.is_active).count();
            info!(total = next.len(), active, "elaboration rules reloaded");
            rules.store(Arc::new(next));
            true
        }
        Err(e) => {
            warn!(error = %e, "reload failed, keeping previous rules");
            false
        }
    }
}

/// Polls `flag` every `poll` and reloads when it is set.
pub async fn reload_loop(
    flag: ReloadFlag,
    rules: RuleSet,
    path: PathBuf,
    records: Option<RuleRecords>,
    poll: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if flag.take() {
                    apply_reload(&rules, &path, records.as_ref()).await;
                }
            }
        }
    }
}

/// Raises `flag` on every reload signal until cancelled.
#[cfg(unix)]
pub fn spawn_signal_listener(flag: ReloadFlag, cancel: CancellationToken) -> Result<(), SolanagramError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigusr1 = signal(SignalKind::user_defined1())
        .map_err(|e| SolanagramError::Internal(format!("failed to install reload handler: {e}")))?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = sigusr1.recv() => {
                    if received.is_none() {
                        return;
                    }
                    info!("reload requested");
                    flag.request();
                }
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_signal_listener(_flag: ReloadFlag, _cancel: CancellationToken) -> Result<(), SolanagramError> {
    warn!("reload signals are not supported on this platform");
    Ok(())
}
