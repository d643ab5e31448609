// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};
use solanagram_core::WorkerKind;

/// Top-level configuration shared by the control plane and the workers.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SolanagramConfig {
    /// Control-plane settings (runtime network, build context, log retention).
    #[serde(default)]
    pub control: ControlConfig,

    /// Per-kind worker policies.
    #[serde(default)]
    pub kinds: KindsConfig,

    /// Orphan reaper schedule.
    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Settings read by the worker process itself.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Relational store settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Control-plane configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Container network workers join. `None` uses the runtime default.
    #[serde(default)]
    pub network: Option<String>,

    /// Host directory with one build context per kind (`<dir>/<kind>/Dockerfile`).
    #[serde(default = "default_build_context")]
    pub build_context: String,

    /// Host path mounted at `/app/data` inside every worker (shared store).
    #[serde(default)]
    pub data_volume: Option<String>,

    /// Grace period between the stop signal and forced kill.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,

    /// Per-file size cap of the runtime's json-file log driver.
    #[serde(default = "default_log_max_size")]
    pub log_max_size: String,

    /// Number of rotated log files kept per worker.
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Security options applied to every worker.
    #[serde(default = "default_security_opt")]
    pub security_opt: Vec<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: None,
            build_context: default_build_context(),
            data_volume: None,
            stop_timeout_secs: default_stop_timeout_secs(),
            log_max_size: default_log_max_size(),
            log_max_files: default_log_max_files(),
            security_opt: default_security_opt(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_build_context() -> String {
    "./docker".to_string()
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_log_max_size() -> String {
    "10m".to_string()
}

fn default_log_max_files() -> u32 {
    3
}

fn default_security_opt() -> Vec<String> {
    vec!["no-new-privileges:true".to_string()]
}

/// Policy table for one worker kind.
///
/// The defaults differ per kind, so there are no field-level serde defaults:
/// the figment defaults layer supplies every key.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KindPolicyConfig {
    /// Image tag workers of this kind run.
    pub image: String,

    /// Compatible image used when `image` is missing and cannot be built.
    #[serde(default)]
    pub fallback_image: Option<String>,

    /// Whether a failed build may degrade to `fallback_image`.
    pub optional: bool,

    /// First component of every worker name of this kind.
    pub name_prefix: String,

    pub default_memory: String,
    pub max_memory: String,

    /// Fractions of one core.
    pub default_cpu: f64,
    pub max_cpu: f64,

    /// memory+swap = memory * swap_multiplier.
    pub swap_multiplier: u32,

    pub pids_limit: i64,

    /// Reap workers older than the threshold regardless of their state.
    pub reap_any_state: bool,
}

impl KindPolicyConfig {
    pub fn forwarder() -> Self {
        Self {
            image: "solanagram-forwarder:latest".to_string(),
            fallback_image: None,
            optional: false,
            name_prefix: "solanagram-fwd".to_string(),
            default_memory: "256m".to_string(),
            max_memory: "512m".to_string(),
            default_cpu: 0.5,
            max_cpu: 1.0,
            swap_multiplier: 2,
            pids_limit: 100,
            reap_any_state: false,
        }
    }

    pub fn logger() -> Self {
        Self {
            image: "solanagram-logger:latest".to_string(),
            fallback_image: Some("solanagram-forwarder:latest".to_string()),
            optional: true,
            name_prefix: "solanagram-log".to_string(),
            default_memory: "128m".to_string(),
            max_memory: "256m".to_string(),
            default_cpu: 0.25,
            max_cpu: 0.5,
            swap_multiplier: 2,
            pids_limit: 64,
            reap_any_state: true,
        }
    }

    pub fn listener() -> Self {
        Self {
            image: "solanagram-listener:latest".to_string(),
            fallback_image: Some("solanagram-forwarder:latest".to_string()),
            optional: true,
            name_prefix: "solanagram-lst".to_string(),
            default_memory: "256m".to_string(),
            max_memory: "512m".to_string(),
            default_cpu: 0.5,
            max_cpu: 1.0,
            swap_multiplier: 2,
            pids_limit: 100,
            reap_any_state: false,
        }
    }

    pub fn extractor() -> Self {
        Self {
            image: "solanagram-extractor:latest".to_string(),
            fallback_image: Some("solanagram-listener:latest".to_string()),
            optional: true,
            name_prefix: "solanagram-ext".to_string(),
            ..Self::listener()
        }
    }
}

/// Policies for every worker kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KindsConfig {
    #[serde(default = "KindPolicyConfig::forwarder")]
    pub forwarder: KindPolicyConfig,
    #[serde(default = "KindPolicyConfig::logger")]
    pub logger: KindPolicyConfig,
    #[serde(default = "KindPolicyConfig::listener")]
    pub listener: KindPolicyConfig,
    #[serde(default = "KindPolicyConfig::extractor")]
    pub extractor: KindPolicyConfig,
}

impl Default for KindsConfig {
    fn default() -> Self {
        Self {
            forwarder: KindPolicyConfig::forwarder(),
            logger: KindPolicyConfig::logger(),
            listener: KindPolicyConfig::listener(),
            extractor: KindPolicyConfig::extractor(),
        }
    }
}

impl KindsConfig {
    pub fn get(&self, kind: WorkerKind) -> &KindPolicyConfig {
        match kind {
            WorkerKind::Forwarder => &self.forwarder,
            WorkerKind::Logger => &self.logger,
            WorkerKind::Listener => &self.listener,
            WorkerKind::Extractor => &self.extractor,
        }
    }
}

/// Orphan reaper schedule.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReaperConfig {
    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_age_threshold_hours")]
    pub age_threshold_hours: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reaper_interval_secs(),
            age_threshold_hours: default_age_threshold_hours(),
        }
    }
}

fn default_reaper_interval_secs() -> u64 {
    3600
}

fn default_age_threshold_hours() -> u64 {
    24
}

/// Settings read by the worker process.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// In-worker path of the JSON config document.
    #[serde(default = "default_config_path")]
    pub config_path: String,

    /// In-worker path of the JSON elaboration rule array.
    #[serde(default = "default_rules_path")]
    pub rules_path: String,

    /// In-worker path of the progress counter artifact.
    #[serde(default = "default_counters_path")]
    pub counters_path: String,

    /// In-worker directory session files are copied into.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,

    /// How often the main loop checks the reload flag.
    #[serde(default = "default_reload_poll_ms")]
    pub reload_poll_ms: u64,

    /// How long a freshly provisioned worker waits for its config document
    /// before giving up.
    #[serde(default = "default_config_wait_secs")]
    pub config_wait_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub forward_retry: ForwardRetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            rules_path: default_rules_path(),
            counters_path: default_counters_path(),
            session_dir: default_session_dir(),
            reload_poll_ms: default_reload_poll_ms(),
            config_wait_secs: default_config_wait_secs(),
            log_level: default_log_level(),
            reconnect: ReconnectConfig::default(),
            forward_retry: ForwardRetryConfig::default(),
        }
    }
}

fn default_config_path() -> String {
    "/app/config/worker.json".to_string()
}

fn default_rules_path() -> String {
    "/app/config/elaborations.json".to_string()
}

fn default_counters_path() -> String {
    "/app/data/stats.json".to_string()
}

fn default_session_dir() -> String {
    "/app/sessions".to_string()
}

fn default_reload_poll_ms() -> u64 {
    1000
}

fn default_config_wait_secs() -> u64 {
    120
}

/// Connection-level reconnect policy (linear backoff).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    #[serde(default = "default_reconnect_base_delay_secs")]
    pub base_delay_secs: u64,

    #[serde(default = "default_reconnect_max_delay_secs")]
    pub max_delay_secs: u64,

    #[serde(default = "default_reconnect_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_reconnect_base_delay_secs(),
            max_delay_secs: default_reconnect_max_delay_secs(),
            max_attempts: default_reconnect_max_attempts(),
        }
    }
}

fn default_reconnect_base_delay_secs() -> u64 {
    5
}

fn default_reconnect_max_delay_secs() -> u64 {
    60
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

/// Per-message forward retry policy (exponential backoff).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardRetryConfig {
    #[serde(default = "default_forward_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_forward_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for ForwardRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_forward_max_attempts(),
            base_delay_ms: default_forward_base_delay_ms(),
        }
    }
}

fn default_forward_max_attempts() -> u32 {
    3
}

fn default_forward_base_delay_ms() -> u64 {
    1000
}

/// Relational store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("solanagram").join("solanagram.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("solanagram.db"))
        .to_string_lossy()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_are_distinct() {
        let kinds = KindsConfig::default();
        assert_eq!(kinds.get(WorkerKind::Forwarder).name_prefix, "solanagram-fwd");
        assert_eq!(kinds.get(WorkerKind::Logger).max_cpu, 0.5);
        assert!(kinds.get(WorkerKind::Logger).reap_any_state);
        assert!(!kinds.get(WorkerKind::Forwarder).optional);
        assert_eq!(kinds.get(WorkerKind::Extractor).max_memory, "512m");
    }

    #[test]
    fn retry_policies_stay_separate() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.reconnect.max_attempts, 10);
        assert_eq!(worker.forward_retry.max_attempts, 3);
    }
}
