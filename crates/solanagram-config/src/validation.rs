// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use solanagram_core::WorkerKind;
use solanagram_core::units::parse_memory_size;
use tracing::warn;

use crate::diagnostic::ConfigError;
use crate::model::SolanagramConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every error instead of failing fast. A kind whose default exceeds
/// its ceiling is only warned about: the limit normalizer clamps it anyway.
pub fn validate_config(config: &SolanagramConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for kind in WorkerKind::ALL {
        let policy = config.kinds.get(kind);
        let section = format!("kinds.{kind}");

        let default_mem = check_memory(&mut errors, &section, "default_memory", &policy.default_memory);
        let max_mem = check_memory(&mut errors, &section, "max_memory", &policy.max_memory);
        if let (Some(default_mem), Some(max_mem)) = (default_mem, max_mem)
            && default_mem > max_mem
        {
            warn!(kind = %kind, "default_memory exceeds max_memory; the ceiling will be applied");
        }

        for (field, value) in [("default_cpu", policy.default_cpu), ("max_cpu", policy.max_cpu)] {
            if !(value > 0.0 && value <= 1.0) {
                errors.push(ConfigError::Validation {
                    message: format!("{section}.{field} must be in (0, 1], got {value}"),
                });
            }
        }

        if policy.swap_multiplier < 1 {
            errors.push(ConfigError::Validation {
                message: format!("{section}.swap_multiplier must be at least 1"),
            });
        }

        if policy.image.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{section}.image must not be empty"),
            });
        }

        if policy.optional && policy.fallback_image.is_none() {
            warn!(kind = %kind, "optional kind has no fallback_image; a failed build will be fatal");
        }
    }

    if parse_memory_size(&config.control.log_max_size).is_err() {
        errors.push(ConfigError::Validation {
            message: format!(
                "control.log_max_size `{}` is not a valid size",
                config.control.log_max_size
            ),
        });
    }

    for (field, value) in [
        ("worker.config_path", &config.worker.config_path),
        ("worker.rules_path", &config.worker.rules_path),
        ("worker.counters_path", &config.worker.counters_path),
        ("storage.database_path", &config.storage.database_path),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{field} must not be empty"),
            });
        }
    }

    if config.worker.reload_poll_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.reload_poll_ms must be greater than 0".to_string(),
        });
    }

    if config.worker.reconnect.base_delay_secs > config.worker.reconnect.max_delay_secs {
        errors.push(ConfigError::Validation {
            message: "worker.reconnect.base_delay_secs must not exceed max_delay_secs".to_string(),
        });
    }

    if config.worker.forward_retry.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "worker.forward_retry.max_attempts must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn check_memory(
    errors: &mut Vec<ConfigError>,
    section: &str,
    field: &str,
    value: &str,
) -> Option<i64> {
    match parse_memory_size(value) {
        Ok(bytes) if bytes > 0 => Some(bytes),
        _ => {
            errors.push(ConfigError::Validation {
                message: format!("{section}.{field} `{value}` is not a valid memory size"),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = SolanagramConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn malformed_memory_fails_validation() {
        let mut config = SolanagramConfig::default();
        config.kinds.logger.max_memory = "lots".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("kinds.logger.max_memory"));
    }

    #[test]
    fn cpu_out_of_range_fails_validation() {
        let mut config = SolanagramConfig::default();
        config.kinds.forwarder.max_cpu = 1.5;
        config.kinds.listener.default_cpu = 0.0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn default_above_ceiling_is_not_an_error() {
        let mut config = SolanagramConfig::default();
        config.kinds.forwarder.default_memory = "2g".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_multiple_errors() {
        let mut config = SolanagramConfig::default();
        config.worker.rules_path = " ".to_string();
        config.worker.reload_poll_ms = 0;
        config.worker.forward_retry.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
