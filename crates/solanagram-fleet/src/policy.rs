// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-kind policy: image, naming prefix, default and ceiling limits.

use solanagram_config::model::{KindPolicyConfig, KindsConfig};
use solanagram_core::units::{format_memory_size, parse_memory_size};
use solanagram_core::{SolanagramError, WorkerKind};

use crate::limits::{MIN_CPU, MIN_MEMORY};

/// Everything that differs between worker kinds.
///
/// Memory values are parsed once at construction so a bad policy is rejected
/// before the first runtime call.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerKindPolicy {
    pub kind: WorkerKind,
    pub image: String,
    pub fallback_image: Option<String>,
    /// Whether a failed image build may degrade to `fallback_image`.
    pub optional: bool,
    pub name_prefix: String,
    pub default_memory: i64,
    pub max_memory: i64,
    pub default_cpu: f64,
    pub max_cpu: f64,
    pub swap_multiplier: i64,
    pub pids_limit: i64,
    /// Reap old workers even while running.
    pub reap_any_state: bool,
}

impl WorkerKindPolicy {
    pub fn from_config(kind: WorkerKind, cfg: &KindPolicyConfig) -> Result<Self, SolanagramError> {
        let max_memory = parse_memory_size(&cfg.max_memory)?;
        if max_memory < MIN_MEMORY {
            return Err(SolanagramError::Config(format!(
                "kinds.{kind}.max_memory {} is below the {} floor",
                cfg.max_memory,
                format_memory_size(MIN_MEMORY)
            )));
        }
        if cfg.max_cpu.is_nan() || cfg.max_cpu < MIN_CPU {
            return Err(SolanagramError::Config(format!(
                "kinds.{kind}.max_cpu {} is below the {MIN_CPU} floor",
                cfg.max_cpu
            )));
        }
        Ok(Self {
            kind,
            image: cfg.image.clone(),
            fallback_image: cfg.fallback_image.clone(),
            optional: cfg.optional,
            name_prefix: cfg.name_prefix.clone(),
            default_memory: parse_memory_size(&cfg.default_memory)?,
            max_memory,
            default_cpu: cfg.default_cpu,
            max_cpu: cfg.max_cpu,
            swap_multiplier: i64::from(cfg.swap_multiplier.max(1)),
            pids_limit: cfg.pids_limit,
            reap_any_state: cfg.reap_any_state,
        })
    }

    /// The compiled-in policy for `kind`.
    pub fn builtin(kind: WorkerKind) -> Result<Self, SolanagramError> {
        Self::from_config(kind, KindsConfig::default().get(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_policies_parse() {
        for kind in WorkerKind::ALL {
            let policy = WorkerKindPolicy::builtin(kind).unwrap();
            assert_eq!(policy.kind, kind);
            assert!(policy.default_memory <= policy.max_memory);
        }
    }

    #[test]
    fn logger_is_lighter_than_forwarder() {
        let logger = WorkerKindPolicy::builtin(WorkerKind::Logger).unwrap();
        let forwarder = WorkerKindPolicy::builtin(WorkerKind::Forwarder).unwrap();
        assert!(logger.max_memory < forwarder.max_memory);
        assert!(logger.max_cpu < forwarder.max_cpu);
        assert!(logger.reap_any_state);
        assert!(!forwarder.optional);
    }

    #[test]
    fn malformed_memory_is_a_config_error() {
        let mut cfg = KindPolicyConfig::listener();
        cfg.max_memory = "12 parsecs".to_string();
        let err = WorkerKindPolicy::from_config(WorkerKind::Listener, &cfg).unwrap_err();
        assert!(matches!(err, SolanagramError::Config(_)));
    }

    #[test]
    fn ceilings_below_the_floors_are_rejected() {
        let mut cfg = KindPolicyConfig::logger();
        cfg.max_memory = "2m".to_string();
        let err = WorkerKindPolicy::from_config(WorkerKind::Logger, &cfg).unwrap_err();
        assert!(err.to_string().contains("max_memory"));

        let mut cfg = KindPolicyConfig::logger();
        cfg.max_cpu = 0.005;
        let err = WorkerKindPolicy::from_config(WorkerKind::Logger, &cfg).unwrap_err();
        assert!(err.to_string().contains("max_cpu"));
    }
}
