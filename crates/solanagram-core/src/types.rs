// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the control plane and the worker runtime.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SolanagramError;

/// The four kinds of worker the fleet runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WorkerKind {
    Forwarder,
    Logger,
    Listener,
    Extractor,
}

impl WorkerKind {
    pub const ALL: [WorkerKind; 4] = [
        WorkerKind::Forwarder,
        WorkerKind::Logger,
        WorkerKind::Listener,
        WorkerKind::Extractor,
    ];

    /// Whether this kind persists every inbound message.
    pub fn persists_messages(self) -> bool {
        !matches!(self, WorkerKind::Forwarder)
    }

    /// Whether this kind runs the elaboration pipeline.
    pub fn runs_elaborations(self) -> bool {
        matches!(self, WorkerKind::Listener | WorkerKind::Extractor)
    }
}

/// Lifecycle status of a worker as reported by the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Created,
    Running,
    Stopped,
    NotFound,
    Error,
}

impl WorkerState {
    /// Maps a container runtime status string (`running`, `exited`, ...) to a state.
    pub fn from_runtime_status(status: &str) -> Self {
        match status {
            "created" => WorkerState::Created,
            "running" | "restarting" => WorkerState::Running,
            "exited" | "paused" | "dead" | "removing" => WorkerState::Stopped,
            _ => WorkerState::Error,
        }
    }
}

/// The source channel a worker subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChannel {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type", default = "default_chat_type")]
    pub chat_type: String,
}

fn default_chat_type() -> String {
    "channel".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    User,
    Group,
    Channel,
}

/// Where a forwarder (or a redirect elaboration) delivers messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardTarget {
    #[serde(rename = "type")]
    pub target_type: TargetType,
    /// Numeric chat id or `@username`.
    pub id: String,
    pub name: String,
}

/// Messaging-service credentials. Echoed into the worker for local use.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub phone: String,
    pub api_id: i32,
    pub api_hash: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("phone", &"[REDACTED]")
            .field("api_id", &self.api_id)
            .field("api_hash", &"[REDACTED]")
            .finish()
    }
}

/// How the messaging session reaches the worker.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionSource {
    /// Serialized session passed as an environment variable.
    String(String),
    /// Session file on the control-plane host, copied into the worker.
    File(PathBuf),
}

impl std::fmt::Debug for SessionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionSource::String(_) => f.write_str("SessionSource::String([REDACTED])"),
            SessionSource::File(path) => write!(f, "SessionSource::File({})", path.display()),
        }
    }
}

/// Identity and provisioning intent for one worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub kind: WorkerKind,
    pub user_id: i64,
    /// Sequence or processor id, only when several workers share user + source.
    pub disambiguator: Option<String>,
    pub source: SourceChannel,
    pub target: Option<ForwardTarget>,
    /// Listener/processor row id on the control-plane side, if any.
    pub processor_id: Option<i64>,
    pub credentials: Credentials,
    pub session: SessionSource,
}

/// Requested resource overrides; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitRequest {
    #[serde(default)]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub cpu_limit: Option<f64>,
}

/// Effective resource limits applied to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub memory_bytes: i64,
    pub memory_swap_bytes: i64,
    /// CPU share in billionths of one core.
    pub nano_cpus: i64,
    pub pids_limit: i64,
}

impl ResourceLimits {
    pub fn cpu_fraction(&self) -> f64 {
        self.nano_cpus as f64 / 1e9
    }
}

/// Runtime identity of a worker. Never cached by the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerHandle {
    pub id: String,
    pub name: String,
    pub state: WorkerState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// JSON document written to the worker at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfigDocument {
    pub kind: WorkerKind,
    pub user_id: i64,
    pub worker_name: String,
    /// Listening session id; part of the persistence idempotency key.
    pub session_id: String,
    pub source: SourceChannel,
    #[serde(default)]
    pub processor_id: Option<i64>,
    #[serde(default)]
    pub target: Option<ForwardTarget>,
    pub credentials: Credentials,
    /// In-worker path of the session file, when one was transferred.
    #[serde(default)]
    pub session_file: Option<String>,
}

impl WorkerConfigDocument {
    /// Key the worker's elaboration rules are stored under: the listener id,
    /// or the source channel when the worker was created without one.
    pub fn rule_owner(&self) -> i64 {
        self.processor_id.unwrap_or(self.source.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ElaborationType {
    Extractor,
    Redirect,
}

/// One search-and-extract instruction of an extractor elaboration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub rule_name: String,
    pub search_text: String,
    pub extract_length: usize,
}

/// Typed view of an elaboration's config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElaborationAction {
    Extractor { rules: Vec<ExtractionRule> },
    Redirect { target_channel_id: String },
}

#[derive(Deserialize)]
struct ExtractorConfig {
    rules: Vec<ExtractionRule>,
}

#[derive(Deserialize)]
struct RedirectConfig {
    target_channel_id: serde_json::Value,
}

/// An ordered, independent unit of per-message work.
///
/// The config stays as raw JSON so one malformed rule only fails itself
/// when it is applied, instead of poisoning the whole list on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElaborationRule {
    pub id: i64,
    pub elaboration_type: ElaborationType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_active() -> bool {
    true
}

impl ElaborationRule {
    pub fn action(&self) -> Result<ElaborationAction, SolanagramError> {
        match self.elaboration_type {
            ElaborationType::Extractor => {
                let cfg: ExtractorConfig = serde_json::from_value(self.config.clone())
                    .map_err(|e| {
                        SolanagramError::Config(format!("rule {}: bad extractor config: {e}", self.id))
                    })?;
                Ok(ElaborationAction::Extractor { rules: cfg.rules })
            }
            ElaborationType::Redirect => {
                let cfg: RedirectConfig = serde_json::from_value(self.config.clone())
                    .map_err(|e| {
                        SolanagramError::Config(format!("rule {}: bad redirect config: {e}", self.id))
                    })?;
                let target_channel_id = match cfg.target_channel_id {
                    serde_json::Value::String(s) if !s.trim().is_empty() => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    other => {
                        return Err(SolanagramError::Config(format!(
                            "rule {}: invalid redirect target {other}",
                            self.id
                        )));
                    }
                };
                Ok(ElaborationAction::Redirect { target_channel_id })
            }
        }
    }
}

/// One inbound message as delivered by the messaging service.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub channel_id: i64,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub raw: serde_json::Value,
}

/// A persisted inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedMessage {
    pub channel_id: i64,
    pub message_id: i64,
    pub session_id: String,
    pub sender_id: Option<i64>,
    pub text: String,
    pub metadata: Option<String>,
    pub received_at: String,
}

/// One (rule, match occurrence) extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedValue {
    pub saved_message_id: i64,
    pub rule_name: String,
    pub search_text: String,
    pub extracted_text: String,
    pub position: i64,
    pub extracted_at: String,
}

/// Progress counters a worker maintains in its counter artifact.
///
/// Missing fields deserialize as zero so older artifacts stay readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressCounters {
    pub messages_processed: u64,
    pub messages_forwarded: u64,
    pub messages_failed: u64,
    pub duplicates_skipped: u64,
    pub last_message_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_status_mapping() {
        assert_eq!(WorkerState::from_runtime_status("running"), WorkerState::Running);
        assert_eq!(WorkerState::from_runtime_status("exited"), WorkerState::Stopped);
        assert_eq!(WorkerState::from_runtime_status("created"), WorkerState::Created);
        assert_eq!(WorkerState::from_runtime_status("bogus"), WorkerState::Error);
    }

    #[test]
    fn extractor_rule_parses_config() {
        let rule: ElaborationRule = serde_json::from_value(serde_json::json!({
            "id": 4,
            "elaboration_type": "extractor",
            "config": {"rules": [{"rule_name": "ca", "search_text": "CA:", "extract_length": 44}]}
        }))
        .unwrap();
        assert!(rule.is_active);
        match rule.action().unwrap() {
            ElaborationAction::Extractor { rules } => {
                assert_eq!(rules.len(), 1);
                assert_eq!(rules[0].extract_length, 44);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn redirect_accepts_numeric_and_string_targets() {
        let numeric = ElaborationRule {
            id: 1,
            elaboration_type: ElaborationType::Redirect,
            is_active: true,
            config: serde_json::json!({"target_channel_id": -1001234}),
        };
        assert_eq!(
            numeric.action().unwrap(),
            ElaborationAction::Redirect { target_channel_id: "-1001234".into() }
        );

        let broken = ElaborationRule {
            config: serde_json::json!({"target_channel_id": null}),
            ..numeric
        };
        assert!(broken.action().is_err());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials {
            phone: "+15550001".into(),
            api_id: 42,
            api_hash: "deadbeef".into(),
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(!rendered.contains("+15550001"));
    }
}
