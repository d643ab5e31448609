// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Container runtime capability consumed by the fleet manager.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SolanagramError;
use crate::types::{ResourceLimits, WorkerHandle};

/// Everything needed to create one worker container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<(String, String)>,
    pub labels: HashMap<String, String>,
    pub network: Option<String>,
    /// Host bind mounts in `host:container[:mode]` form.
    pub binds: Vec<String>,
    pub limits: ResourceLimits,
    pub security_opt: Vec<String>,
    pub log_max_size: String,
    pub log_max_files: u32,
    pub restart_policy: String,
}

/// Result of running a command inside a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Raw counters reported by the runtime for one worker.
///
/// `precpu_*` are the counters of the previous sample, so one snapshot is
/// enough to compute a CPU delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_total: u64,
    pub presystem_total: u64,
}

/// Filter for listing workers. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub name_prefix: Option<String>,
    pub labels: Vec<(String, String)>,
}

impl ListFilter {
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn matches(&self, handle: &WorkerHandle) -> bool {
        if let Some(prefix) = &self.name_prefix
            && !handle.name.starts_with(prefix.as_str())
        {
            return false;
        }
        self.labels
            .iter()
            .all(|(k, v)| handle.labels.get(k).map(|x| x == v).unwrap_or(false))
    }
}

/// Operations the fleet manager issues against the container runtime.
///
/// Implementations must report a missing container as
/// [`SolanagramError::NotFound`] so callers can apply the
/// destructive-operation-on-absent-target-is-success rule.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    async fn image_exists(&self, tag: &str) -> Result<bool, SolanagramError>;

    /// Builds `tag` from the given build context directory.
    async fn build_image(&self, tag: &str, context: &Path) -> Result<(), SolanagramError>;

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SolanagramError>;

    async fn start(&self, name: &str) -> Result<(), SolanagramError>;

    async fn stop(&self, name: &str, grace: Duration) -> Result<(), SolanagramError>;

    async fn restart(&self, name: &str, grace: Duration) -> Result<(), SolanagramError>;

    async fn remove(&self, name: &str, force: bool) -> Result<(), SolanagramError>;

    /// Returns `None` when no container has this name.
    async fn inspect(&self, name: &str) -> Result<Option<WorkerHandle>, SolanagramError>;

    async fn exec(&self, name: &str, cmd: Vec<String>) -> Result<ExecOutput, SolanagramError>;

    /// Extracts a tar archive into `path` inside the container.
    async fn put_archive(
        &self,
        name: &str,
        path: &str,
        tar: Vec<u8>,
    ) -> Result<(), SolanagramError>;

    async fn stats(&self, name: &str) -> Result<StatsSnapshot, SolanagramError>;

    async fn list(&self, filter: &ListFilter) -> Result<Vec<WorkerHandle>, SolanagramError>;

    /// Delivers an OS signal (e.g. `SIGUSR1`) to the worker's main process.
    async fn signal(&self, name: &str, signal: &str) -> Result<(), SolanagramError>;

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SolanagramError>;
}
