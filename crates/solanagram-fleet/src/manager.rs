// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fleet manager: lifecycle operations for one worker kind.
//!
//! Every operation returns a value. Runtime failures are classified, logged
//! and folded into an [`Outcome`] (or a [`WorkerStatus`] for status queries)
//! so callers never see a raw runtime error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use solanagram_config::SolanagramConfig;
use solanagram_core::traits::{ContainerRuntime, ContainerSpec, ListFilter};
use solanagram_core::{
    ElaborationRule, LimitRequest, SessionSource, SolanagramError, WorkerConfigDocument,
    WorkerHandle, WorkerKind, WorkerSpec, WorkerState, worker_env,
};
use tracing::{debug, error, info, warn};

use crate::image::{ResolvedImage, resolve_image};
use crate::inject::{single_file_archive, write_file_command};
use crate::labels;
use crate::limits::normalize_limits;
use crate::monitor::{WorkerStatus, read_counters, sample_usage};
use crate::naming::worker_name;
use crate::policy::WorkerKindPolicy;
use crate::reaper::{ReapReport, is_orphan};

/// In-worker mount point of the shared data volume.
const DATA_MOUNT: &str = "/app/data";

/// Success flag, worker name and a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub ok: bool,
    pub name: String,
    pub message: String,
}

impl Outcome {
    pub fn success(name: &str, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn failure(name: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Settings shared by the managers of every kind.
#[derive(Debug, Clone)]
pub struct FleetSettings {
    /// Directory holding one image build context per kind.
    pub build_root: PathBuf,
    pub network: Option<String>,
    /// Host path mounted at `/app/data` in every worker.
    pub data_volume: Option<String>,
    pub stop_timeout: Duration,
    pub log_max_size: String,
    pub log_max_files: u32,
    pub security_opt: Vec<String>,
    pub config_path: String,
    pub rules_path: String,
    pub counters_path: String,
    pub session_dir: String,
}

impl FleetSettings {
    pub fn from_config(config: &SolanagramConfig) -> Self {
        Self {
            build_root: PathBuf::from(&config.control.build_context),
            network: config.control.network.clone(),
            data_volume: config.control.data_volume.clone(),
            stop_timeout: Duration::from_secs(config.control.stop_timeout_secs),
            log_max_size: config.control.log_max_size.clone(),
            log_max_files: config.control.log_max_files,
            security_opt: config.control.security_opt.clone(),
            config_path: config.worker.config_path.clone(),
            rules_path: config.worker.rules_path.clone(),
            counters_path: config.worker.counters_path.clone(),
            session_dir: config.worker.session_dir.clone(),
        }
    }
}

/// Steps of the two-phase create. Any failure after `Provision` triggers
/// the compensating stop+remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreatePhase {
    Provision,
    Start,
    InjectSession,
    InjectConfig,
    Restart,
}

impl CreatePhase {
    fn plan(with_session_file: bool) -> Vec<CreatePhase> {
        let mut plan = vec![CreatePhase::Provision, CreatePhase::Start];
        if with_session_file {
            plan.push(CreatePhase::InjectSession);
        }
        plan.push(CreatePhase::InjectConfig);
        plan.push(CreatePhase::Restart);
        plan
    }

    fn label(self) -> &'static str {
        match self {
            CreatePhase::Provision => "create",
            CreatePhase::Start => "start",
            CreatePhase::InjectSession => "session transfer",
            CreatePhase::InjectConfig => "config injection",
            CreatePhase::Restart => "restart",
        }
    }
}

/// Session file staged for transfer into a new worker.
struct StagedSession {
    archive: Vec<u8>,
    worker_path: String,
}

pub struct FleetManager {
    runtime: Arc<dyn ContainerRuntime>,
    policy: WorkerKindPolicy,
    settings: FleetSettings,
}

impl FleetManager {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        policy: WorkerKindPolicy,
        settings: FleetSettings,
    ) -> Self {
        Self {
            runtime,
            policy,
            settings,
        }
    }

    /// Builds the manager of `kind` from the loaded configuration.
    pub fn from_config(
        runtime: Arc<dyn ContainerRuntime>,
        kind: WorkerKind,
        config: &SolanagramConfig,
    ) -> Result<Self, SolanagramError> {
        let policy = WorkerKindPolicy::from_config(kind, config.kinds.get(kind))?;
        Ok(Self::new(runtime, policy, FleetSettings::from_config(config)))
    }

    pub fn kind(&self) -> WorkerKind {
        self.policy.kind
    }

    pub fn policy(&self) -> &WorkerKindPolicy {
        &self.policy
    }

    pub fn name_for(&self, spec: &WorkerSpec) -> String {
        worker_name(&self.policy.name_prefix, spec)
    }

    pub async fn ensure_image(&self) -> Result<ResolvedImage, SolanagramError> {
        resolve_image(self.runtime.as_ref(), &self.policy, &self.settings.build_root).await
    }

    /// Provisions a worker: create+start with env configuration, then inject
    /// the config document (and session file), then restart.
    ///
    /// A running worker with the same name is left untouched and reported as
    /// "already running". A stopped one is replaced.
    pub async fn create(&self, spec: &WorkerSpec, request: &LimitRequest) -> Outcome {
        let name = self.name_for(spec);
        if spec.kind != self.policy.kind {
            return Outcome::failure(
                &name,
                format!("{} manager cannot create {} workers", self.policy.kind, spec.kind),
            );
        }

        let normalized = match normalize_limits(&self.policy, request) {
            Ok(n) => n,
            Err(e) => return Outcome::failure(&name, e.to_string()),
        };

        let session = match self.stage_session(&name, &spec.session).await {
            Ok(s) => s,
            Err(e) => return Outcome::failure(&name, e.to_string()),
        };

        match self.runtime.inspect(&name).await {
            Ok(Some(existing)) if existing.state == WorkerState::Running => {
                info!(worker = %name, "create refused, worker already running");
                return Outcome::failure(&name, "already running");
            }
            Ok(Some(existing)) => {
                info!(worker = %name, state = %existing.state, "replacing stale worker");
                if let Err(e) = self.runtime.remove(&name, true).await
                    && !e.is_not_found()
                {
                    warn!(worker = %name, error = %e, "failed to remove stale worker");
                    return Outcome::failure(&name, format!("failed to remove stale worker: {e}"));
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(worker = %name, error = %e, "inspect failed before create");
                return Outcome::failure(&name, e.to_string());
            }
        }

        let image = match self.ensure_image().await {
            Ok(image) => image,
            Err(e) => {
                error!(kind = %self.policy.kind, error = %e, "no image available");
                return Outcome::failure(&name, format!("image unavailable: {e}"));
            }
        };

        let document = WorkerConfigDocument {
            kind: spec.kind,
            user_id: spec.user_id,
            worker_name: name.clone(),
            session_id: uuid::Uuid::new_v4().to_string(),
            source: spec.source.clone(),
            processor_id: spec.processor_id,
            target: spec.target.clone(),
            credentials: spec.credentials.clone(),
            session_file: session.as_ref().map(|s| s.worker_path.clone()),
        };
        let document_bytes = match serde_json::to_vec_pretty(&document) {
            Ok(b) => b,
            Err(e) => return Outcome::failure(&name, format!("failed to encode config: {e}")),
        };

        let container = self.container_spec(&name, spec, &image, normalized.limits, session.as_ref());

        for phase in CreatePhase::plan(session.is_some()) {
            let step = match phase {
                CreatePhase::Provision => self.runtime.create(&container).await.map(|id| {
                    debug!(worker = %name, id = %id, "worker created");
                }),
                CreatePhase::Start => self.runtime.start(&name).await,
                CreatePhase::InjectSession => match &session {
                    Some(s) => {
                        self.runtime
                            .put_archive(&name, &self.settings.session_dir, s.archive.clone())
                            .await
                    }
                    None => Ok(()),
                },
                CreatePhase::InjectConfig => {
                    self.write_file(&name, &self.settings.config_path, &document_bytes)
                        .await
                }
                CreatePhase::Restart => self.runtime.restart(&name, self.settings.stop_timeout).await,
            };
            if let Err(e) = step {
                error!(worker = %name, phase = phase.label(), error = %e, "create failed");
                self.compensate(&name).await;
                return Outcome::failure(&name, format!("{} failed: {e}", phase.label()));
            }
        }

        let mut message = String::from("created");
        if image.degraded {
            message.push_str(&format!(" (degraded: running on {})", image.tag));
        }
        for note in &normalized.downgrades {
            message.push_str(&format!("; {note}"));
        }
        info!(worker = %name, image = %image.tag, "worker provisioned");
        Outcome::success(&name, message)
    }

    /// Current state, resource usage and progress counters. Never fails.
    pub async fn status(&self, name: &str) -> WorkerStatus {
        let handle = match self.runtime.inspect(name).await {
            Ok(Some(h)) => h,
            Ok(None) => return WorkerStatus::not_found(name),
            Err(e) => {
                warn!(worker = %name, error = %e, "status unavailable");
                return WorkerStatus::unknown(name, e.to_string());
            }
        };

        let running = handle.state == WorkerState::Running;
        let mut status = WorkerStatus {
            name: name.to_string(),
            state: handle.state,
            running,
            ..WorkerStatus::not_found(name)
        };
        if running {
            status.resources = sample_usage(self.runtime.as_ref(), name).await;
            status.counters =
                read_counters(self.runtime.as_ref(), name, &self.counters_path_for(name)).await;
        }
        status
    }

    /// Restarts an existing worker. Fails when it does not exist.
    pub async fn restart(&self, name: &str) -> Outcome {
        match self.runtime.inspect(name).await {
            Ok(Some(_)) => {}
            Ok(None) => return Outcome::failure(name, "not found"),
            Err(e) => return Outcome::failure(name, e.to_string()),
        }
        match self.runtime.restart(name, self.settings.stop_timeout).await {
            Ok(()) => {
                info!(worker = %name, "worker restarted");
                Outcome::success(name, "restarted")
            }
            Err(e) if e.is_not_found() => Outcome::failure(name, "not found"),
            Err(e) => {
                warn!(worker = %name, error = %e, "restart failed");
                Outcome::failure(name, e.to_string())
            }
        }
    }

    /// Stops with the grace timeout, then force-removes. Absent is success.
    pub async fn stop_and_remove(&self, name: &str) -> Outcome {
        match self.runtime.stop(name, self.settings.stop_timeout).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Outcome::success(name, "not found, nothing to remove"),
            Err(e) => warn!(worker = %name, error = %e, "graceful stop failed, forcing removal"),
        }
        match self.runtime.remove(name, true).await {
            Ok(()) => {
                info!(worker = %name, "worker removed");
                Outcome::success(name, "removed")
            }
            Err(e) if e.is_not_found() => Outcome::success(name, "not found, nothing to remove"),
            Err(e) => {
                warn!(worker = %name, error = %e, "remove failed");
                Outcome::failure(name, e.to_string())
            }
        }
    }

    fn kind_filter(&self) -> ListFilter {
        ListFilter::default().label(labels::KIND, self.policy.kind.to_string())
    }

    pub async fn list_all(&self) -> Result<Vec<WorkerHandle>, SolanagramError> {
        self.runtime.list(&self.kind_filter()).await
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<WorkerHandle>, SolanagramError> {
        let filter = self.kind_filter().label(labels::USER_ID, user_id.to_string());
        self.runtime.list(&filter).await
    }

    /// Removes workers of this kind older than `threshold` that are stopped
    /// (or in any state, for kinds with `reap_any_state`). One failed removal
    /// does not stop the scan.
    pub async fn cleanup_orphans(&self, threshold: Duration) -> ReapReport {
        let mut report = ReapReport::default();
        let handles = match self.list_all().await {
            Ok(h) => h,
            Err(e) => {
                warn!(kind = %self.policy.kind, error = %e, "orphan scan failed");
                report.failed.push(("*".to_string(), e.to_string()));
                return report;
            }
        };

        let now = Utc::now();
        report.scanned = handles.len();
        for handle in handles
            .iter()
            .filter(|h| is_orphan(h, now, threshold, self.policy.reap_any_state))
        {
            match self.runtime.remove(&handle.name, true).await {
                Ok(()) => report.removed.push(handle.name.clone()),
                Err(e) if e.is_not_found() => report.removed.push(handle.name.clone()),
                Err(e) => {
                    warn!(worker = %handle.name, error = %e, "failed to reap orphan");
                    report.failed.push((handle.name.clone(), e.to_string()));
                }
            }
        }
        if !report.removed.is_empty() {
            info!(kind = %self.policy.kind, removed = report.removed.len(), "orphans reaped");
        }
        report
    }

    /// Overwrites the worker's rules file and signals a reload. No restart.
    pub async fn update_rules(&self, name: &str, rules: &[ElaborationRule]) -> Outcome {
        if !self.policy.kind.runs_elaborations() {
            return Outcome::failure(
                name,
                format!("{} workers do not run elaborations", self.policy.kind),
            );
        }
        match self.runtime.inspect(name).await {
            Ok(Some(h)) if h.state == WorkerState::Running => {}
            Ok(Some(h)) => return Outcome::failure(name, format!("worker is {}", h.state)),
            Ok(None) => return Outcome::failure(name, "not found"),
            Err(e) => return Outcome::failure(name, e.to_string()),
        }

        let bytes = match serde_json::to_vec_pretty(rules) {
            Ok(b) => b,
            Err(e) => return Outcome::failure(name, format!("failed to encode rules: {e}")),
        };
        if let Err(e) = self.write_file(name, &self.settings.rules_path, &bytes).await {
            warn!(worker = %name, error = %e, "rules write failed");
            return Outcome::failure(name, format!("rules write failed: {e}"));
        }
        if let Err(e) = self.runtime.signal(name, worker_env::RELOAD_SIGNAL).await {
            warn!(worker = %name, error = %e, "reload signal failed");
            return Outcome::failure(name, format!("rules written but reload signal failed: {e}"));
        }
        info!(worker = %name, rules = rules.len(), "rules updated, reload signalled");
        Outcome::success(name, format!("{} rules pushed, reload signalled", rules.len()))
    }

    /// Last `tail` log lines; the text is carried in the outcome message.
    pub async fn logs(&self, name: &str, tail: usize) -> Outcome {
        match self.runtime.logs(name, tail).await {
            Ok(text) => Outcome::success(name, text),
            Err(e) if e.is_not_found() => Outcome::failure(name, "not found"),
            Err(e) => Outcome::failure(name, e.to_string()),
        }
    }

    /// In-worker path of `name`'s counter artifact.
    ///
    /// Every worker mounts the same host directory at `/app/data`, so a
    /// counters path under that mount gets a per-worker subdirectory.
    pub fn counters_path_for(&self, name: &str) -> String {
        let configured = Path::new(&self.settings.counters_path);
        match (&self.settings.data_volume, configured.strip_prefix(DATA_MOUNT)) {
            (Some(_), Ok(rest)) => Path::new(DATA_MOUNT).join(name).join(rest).display().to_string(),
            _ => self.settings.counters_path.clone(),
        }
    }

    async fn stage_session(
        &self,
        name: &str,
        session: &SessionSource,
    ) -> Result<Option<StagedSession>, SolanagramError> {
        let SessionSource::File(path) = session else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            SolanagramError::Config(format!("cannot read session file {}: {e}", path.display()))
        })?;
        let file_name = format!("{name}.session");
        Ok(Some(StagedSession {
            archive: single_file_archive(&file_name, &bytes)?,
            worker_path: format!("{}/{file_name}", self.settings.session_dir.trim_end_matches('/')),
        }))
    }

    fn container_spec(
        &self,
        name: &str,
        spec: &WorkerSpec,
        image: &ResolvedImage,
        limits: solanagram_core::ResourceLimits,
        session: Option<&StagedSession>,
    ) -> ContainerSpec {
        let mut env = vec![
            (worker_env::KIND.to_string(), spec.kind.to_string()),
            (worker_env::WORKER_NAME.to_string(), name.to_string()),
            (worker_env::USER_ID.to_string(), spec.user_id.to_string()),
            (worker_env::SOURCE_ID.to_string(), spec.source.id.to_string()),
            (worker_env::SOURCE_TITLE.to_string(), spec.source.title.clone()),
            (worker_env::PHONE.to_string(), spec.credentials.phone.clone()),
            (worker_env::API_ID.to_string(), spec.credentials.api_id.to_string()),
            (worker_env::API_HASH.to_string(), spec.credentials.api_hash.clone()),
            (worker_env::CONFIG_PATH.to_string(), self.settings.config_path.clone()),
            (worker_env::RULES_PATH.to_string(), self.settings.rules_path.clone()),
            (worker_env::COUNTERS_PATH.to_string(), self.counters_path_for(name)),
        ];
        match (&spec.session, session) {
            (_, Some(staged)) => {
                env.push((worker_env::SESSION_FILE.to_string(), staged.worker_path.clone()));
            }
            (SessionSource::String(s), None) => {
                env.push((worker_env::SESSION_STRING.to_string(), s.clone()));
            }
            (SessionSource::File(_), None) => {}
        }
        if let Some(target) = &spec.target {
            env.push((worker_env::TARGET_ID.to_string(), target.id.clone()));
        }
        if let Some(processor_id) = spec.processor_id {
            env.push((worker_env::PROCESSOR_ID.to_string(), processor_id.to_string()));
        }

        let mut binds = Vec::new();
        if let Some(volume) = &self.settings.data_volume {
            binds.push(format!("{volume}:{DATA_MOUNT}"));
            env.push((
                worker_env::DATABASE_PATH.to_string(),
                Path::new(DATA_MOUNT).join("solanagram.db").display().to_string(),
            ));
        }

        let labels = HashMap::from([
            (labels::MANAGED.to_string(), "true".to_string()),
            (labels::KIND.to_string(), spec.kind.to_string()),
            (labels::USER_ID.to_string(), spec.user_id.to_string()),
            (labels::SOURCE_ID.to_string(), spec.source.id.to_string()),
        ]);

        ContainerSpec {
            name: name.to_string(),
            image: image.tag.clone(),
            env,
            labels,
            network: self.settings.network.clone(),
            binds,
            limits,
            security_opt: self.settings.security_opt.clone(),
            log_max_size: self.settings.log_max_size.clone(),
            log_max_files: self.settings.log_max_files,
            restart_policy: "unless-stopped".to_string(),
        }
    }

    async fn write_file(&self, name: &str, path: &str, bytes: &[u8]) -> Result<(), SolanagramError> {
        let out = self.runtime.exec(name, write_file_command(path, bytes)).await?;
        if out.success() {
            Ok(())
        } else {
            Err(SolanagramError::runtime(format!(
                "writing {path} exited with {}: {}",
                out.exit_code,
                out.output.trim()
            )))
        }
    }

    /// Undo a partial create: stop, then force-remove.
    async fn compensate(&self, name: &str) {
        if let Err(e) = self.runtime.stop(name, Duration::ZERO).await
            && !e.is_not_found()
        {
            debug!(worker = %name, error = %e, "stop during rollback failed");
        }
        match self.runtime.remove(name, true).await {
            Ok(()) => info!(worker = %name, "partially created worker removed"),
            Err(e) if e.is_not_found() => {}
            Err(e) => error!(
                worker = %name,
                error = %e,
                "rollback failed, worker may need manual removal"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solanagram_core::{Credentials, ElaborationType, ForwardTarget, SourceChannel, TargetType};
    use solanagram_core::traits::StatsSnapshot;
    use solanagram_test_utils::MockRuntime;

    const IMAGES: &[&str] = &[
        "solanagram-forwarder:latest",
        "solanagram-logger:latest",
        "solanagram-listener:latest",
        "solanagram-extractor:latest",
    ];

    fn settings() -> FleetSettings {
        FleetSettings::from_config(&SolanagramConfig::default())
    }

    fn manager(runtime: &MockRuntime, kind: WorkerKind) -> FleetManager {
        FleetManager::new(
            Arc::new(runtime.clone()),
            WorkerKindPolicy::builtin(kind).unwrap(),
            settings(),
        )
    }

    fn spec(kind: WorkerKind) -> WorkerSpec {
        WorkerSpec {
            kind,
            user_id: 7,
            disambiguator: None,
            source: SourceChannel {
                id: -1001,
                title: "Alpha Group".into(),
                chat_type: "channel".into(),
            },
            target: (kind == WorkerKind::Forwarder).then(|| ForwardTarget {
                target_type: TargetType::User,
                id: "@bob".into(),
                name: "bob".into(),
            }),
            processor_id: None,
            credentials: Credentials {
                phone: "+15550001".into(),
                api_id: 11,
                api_hash: "hash".into(),
            },
            session: SessionSource::String("session-blob".into()),
        }
    }

    #[tokio::test]
    async fn create_runs_both_phases() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Forwarder);

        let outcome = fleet.create(&spec(WorkerKind::Forwarder), &LimitRequest::default()).await;
        assert!(outcome.ok, "{outcome:?}");
        assert_eq!(outcome.name, "solanagram-fwd-7-alpha_group-to-bob");

        let c = runtime.container(&outcome.name).await.unwrap();
        assert_eq!(c.handle.state, WorkerState::Running);
        assert_eq!(c.restarts, 1);
        assert_eq!(c.spec.restart_policy, "unless-stopped");
        assert!(c.spec.security_opt.iter().any(|s| s.starts_with("no-new-privileges")));
        assert!(c.spec.env.contains(&(worker_env::SESSION_STRING.into(), "session-blob".into())));
        assert_eq!(c.handle.labels.get(labels::USER_ID).map(String::as_str), Some("7"));

        let doc: WorkerConfigDocument =
            serde_json::from_str(&runtime.file(&outcome.name, "/app/config/worker.json").await.unwrap())
                .unwrap();
        assert_eq!(doc.worker_name, outcome.name);
        assert_eq!(doc.source.id, -1001);
        assert!(!doc.session_id.is_empty());
    }

    #[tokio::test]
    async fn session_file_is_transferred_by_archive() {
        let dir = tempfile::tempdir().unwrap();
        let session_path = dir.path().join("user.session");
        std::fs::write(&session_path, b"sqlite-session").unwrap();

        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Logger);
        let mut s = spec(WorkerKind::Logger);
        s.session = SessionSource::File(session_path);

        let outcome = fleet.create(&s, &LimitRequest::default()).await;
        assert!(outcome.ok, "{outcome:?}");

        let worker_path = format!("/app/sessions/{}.session", outcome.name);
        assert_eq!(
            runtime.file(&outcome.name, &worker_path).await.as_deref(),
            Some("sqlite-session")
        );
        let c = runtime.container(&outcome.name).await.unwrap();
        assert!(c.spec.env.contains(&(worker_env::SESSION_FILE.into(), worker_path.clone())));
        assert!(!c.spec.env.iter().any(|(k, _)| k == worker_env::SESSION_STRING));
    }

    #[tokio::test]
    async fn missing_session_file_fails_before_any_runtime_call() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Logger);
        let mut s = spec(WorkerKind::Logger);
        s.session = SessionSource::File("/no/such/file.session".into());

        let outcome = fleet.create(&s, &LimitRequest::default()).await;
        assert!(!outcome.ok);
        assert!(runtime.calls().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_limits_fail_before_any_runtime_call() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Forwarder);
        let request = LimitRequest {
            memory_limit: Some("huge".into()),
            cpu_limit: None,
        };
        let outcome = fleet.create(&spec(WorkerKind::Forwarder), &request).await;
        assert!(!outcome.ok);
        assert!(runtime.calls().await.is_empty());
    }

    #[tokio::test]
    async fn restart_failure_rolls_back() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        runtime.fail_next("restart").await;
        let fleet = manager(&runtime, WorkerKind::Listener);

        let outcome = fleet.create(&spec(WorkerKind::Listener), &LimitRequest::default()).await;
        assert!(!outcome.ok);
        assert!(outcome.message.starts_with("restart failed"));
        assert!(runtime.container(&outcome.name).await.is_none());
    }

    #[tokio::test]
    async fn kind_mismatch_is_refused() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Logger);
        let outcome = fleet.create(&spec(WorkerKind::Forwarder), &LimitRequest::default()).await;
        assert!(!outcome.ok);
        assert!(runtime.calls().await.is_empty());
    }

    #[tokio::test]
    async fn status_reports_usage_and_counters() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Logger);
        let outcome = fleet.create(&spec(WorkerKind::Logger), &LimitRequest::default()).await;
        runtime
            .set_stats(
                &outcome.name,
                StatsSnapshot {
                    memory_usage: 64,
                    memory_limit: 128,
                    cpu_total: 200,
                    precpu_total: 100,
                    system_total: 1100,
                    presystem_total: 100,
                },
            )
            .await;
        runtime
            .write_file(&outcome.name, "/app/data/stats.json", r#"{"messages_processed": 12}"#)
            .await;

        let status = fleet.status(&outcome.name).await;
        assert!(status.running);
        let usage = status.resources.unwrap();
        assert_eq!(usage.memory_percent, 50.0);
        assert_eq!(usage.cpu_percent, 10.0);
        assert_eq!(status.counters.messages_processed, 12);
    }

    #[tokio::test]
    async fn shared_data_volume_gives_each_worker_its_own_counters() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let mut shared = settings();
        shared.data_volume = Some("/srv/solanagram".into());
        let fleet = FleetManager::new(
            Arc::new(runtime.clone()),
            WorkerKindPolicy::builtin(WorkerKind::Logger).unwrap(),
            shared,
        );

        let mut alpha = spec(WorkerKind::Logger);
        alpha.user_id = 1;
        let mut beta = spec(WorkerKind::Logger);
        beta.user_id = 2;
        beta.source.title = "Beta".into();
        let a = fleet.create(&alpha, &LimitRequest::default()).await.name;
        let b = fleet.create(&beta, &LimitRequest::default()).await.name;

        let counters_env = |c: &solanagram_test_utils::MockContainer| {
            c.spec
                .env
                .iter()
                .find(|(k, _)| k == worker_env::COUNTERS_PATH)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        let ca = runtime.container(&a).await.unwrap();
        let cb = runtime.container(&b).await.unwrap();
        assert_eq!(ca.spec.binds, vec!["/srv/solanagram:/app/data".to_string()]);
        assert_eq!(ca.spec.binds, cb.spec.binds);
        assert_eq!(counters_env(&ca), format!("/app/data/{a}/stats.json"));
        assert_eq!(counters_env(&cb), format!("/app/data/{b}/stats.json"));

        runtime
            .write_file(&a, &counters_env(&ca), r#"{"messages_processed": 5}"#)
            .await;
        assert_eq!(fleet.status(&a).await.counters.messages_processed, 5);
        assert_eq!(fleet.status(&b).await.counters.messages_processed, 0);
    }

    #[test]
    fn counters_path_is_unchanged_without_a_shared_volume() {
        let runtime = MockRuntime::new();
        let fleet = manager(&runtime, WorkerKind::Logger);
        assert_eq!(fleet.counters_path_for("w1"), "/app/data/stats.json");
    }

    #[tokio::test]
    async fn status_of_missing_worker_is_a_value() {
        let runtime = MockRuntime::new();
        let fleet = manager(&runtime, WorkerKind::Logger);
        let status = fleet.status("ghost").await;
        assert_eq!(status.state, WorkerState::NotFound);
        assert!(!status.running);

        runtime.fail_next("inspect").await;
        let status = fleet.status("ghost").await;
        assert_eq!(status.state, WorkerState::Error);
        assert!(status.detail.is_some());
    }

    #[tokio::test]
    async fn destructive_operations_on_absent_worker_succeed() {
        let runtime = MockRuntime::new();
        let fleet = manager(&runtime, WorkerKind::Forwarder);
        assert!(fleet.stop_and_remove("ghost").await.ok);
        assert!(!fleet.restart("ghost").await.ok);
        assert_eq!(fleet.cleanup_orphans(Duration::from_secs(1)).await.removed.len(), 0);
        assert!(fleet.list_for_user(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_for_user_filters_by_labels() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Forwarder);
        fleet.create(&spec(WorkerKind::Forwarder), &LimitRequest::default()).await;
        let mut other = spec(WorkerKind::Forwarder);
        other.user_id = 8;
        fleet.create(&other, &LimitRequest::default()).await;

        let mine = fleet.list_for_user(7).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "solanagram-fwd-7-alpha_group-to-bob");
        assert_eq!(fleet.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_rules_writes_file_and_signals_without_restart() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Listener);
        let name = fleet.create(&spec(WorkerKind::Listener), &LimitRequest::default()).await.name;

        let rules = vec![ElaborationRule {
            id: 1,
            elaboration_type: ElaborationType::Redirect,
            is_active: true,
            config: serde_json::json!({"target_channel_id": "-100"}),
        }];
        let outcome = fleet.update_rules(&name, &rules).await;
        assert!(outcome.ok, "{outcome:?}");

        let c = runtime.container(&name).await.unwrap();
        assert_eq!(c.signals, vec!["SIGUSR1"]);
        assert_eq!(c.restarts, 1);
        let written: Vec<ElaborationRule> =
            serde_json::from_str(&runtime.file(&name, "/app/config/elaborations.json").await.unwrap())
                .unwrap();
        assert_eq!(written, rules);
    }

    #[tokio::test]
    async fn update_rules_rejected_for_forwarders_and_missing_workers() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        assert!(!manager(&runtime, WorkerKind::Forwarder).update_rules("x", &[]).await.ok);
        assert!(!manager(&runtime, WorkerKind::Listener).update_rules("x", &[]).await.ok);
    }

    #[tokio::test]
    async fn logs_tail_and_missing_worker() {
        let runtime = MockRuntime::with_images(IMAGES).await;
        let fleet = manager(&runtime, WorkerKind::Logger);
        let name = fleet.create(&spec(WorkerKind::Logger), &LimitRequest::default()).await.name;
        runtime.set_logs(&name, "one\ntwo\nthree").await;

        let outcome = fleet.logs(&name, 2).await;
        assert!(outcome.ok);
        assert_eq!(outcome.message, "two\nthree");
        assert!(!fleet.logs("ghost", 10).await.ok);
    }

    #[tokio::test]
    async fn degraded_image_is_reported() {
        let runtime = MockRuntime::with_images(&["solanagram-forwarder:latest"]).await;
        runtime.make_unbuildable("solanagram-logger:latest").await;
        let fleet = manager(&runtime, WorkerKind::Logger);

        let outcome = fleet.create(&spec(WorkerKind::Logger), &LimitRequest::default()).await;
        assert!(outcome.ok);
        assert!(outcome.message.contains("degraded"));
        let c = runtime.container(&outcome.name).await.unwrap();
        assert_eq!(c.spec.image, "solanagram-forwarder:latest");
    }
}
