// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./solanagram.toml` > `~/.config/solanagram/solanagram.toml`
//! > `/etc/solanagram/solanagram.toml`, with `SOLANAGRAM_` environment overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SolanagramConfig;

/// Config files consulted by [`load_config`], lowest priority first.
pub fn search_path() -> Vec<PathBuf> {
    let mut files = vec![PathBuf::from("/etc/solanagram/solanagram.toml")];
    if let Some(dir) = dirs::config_dir() {
        files.push(dir.join("solanagram").join("solanagram.toml"));
    }
    files.push(PathBuf::from("solanagram.toml"));
    files
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier): compiled defaults, every file of
/// [`search_path`] in order, then `SOLANAGRAM_*` environment variables.
pub fn load_config() -> Result<SolanagramConfig, figment::Error> {
    search_path()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(SolanagramConfig::default())),
            |figment, file| figment.merge(Toml::file(file)),
        )
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string on top of the defaults (no env, no files).
pub fn load_config_from_str(toml_content: &str) -> Result<SolanagramConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SolanagramConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SolanagramConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SolanagramConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Section prefixes, longest first so nested sections win over their parents.
const SECTION_PREFIXES: &[(&str, &str)] = &[
    ("worker_forward_retry_", "worker.forward_retry."),
    ("worker_reconnect_", "worker.reconnect."),
    ("kinds_forwarder_", "kinds.forwarder."),
    ("kinds_logger_", "kinds.logger."),
    ("kinds_listener_", "kinds.listener."),
    ("kinds_extractor_", "kinds.extractor."),
    ("control_", "control."),
    ("reaper_", "reaper."),
    ("worker_", "worker."),
    ("storage_", "storage."),
];

/// Maps a lowercased, prefix-stripped env key to its dotted config path.
///
/// Uses an explicit table rather than `Env::split("_")` because field names
/// contain underscores: `SOLANAGRAM_STORAGE_DATABASE_PATH` must become
/// `storage.database_path`, not `storage.database.path`.
pub fn map_env_key(key: &str) -> String {
    for (prefix, dotted) in SECTION_PREFIXES {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{dotted}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("SOLANAGRAM_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_sections_map_before_parents() {
        assert_eq!(
            map_env_key("worker_reconnect_max_attempts"),
            "worker.reconnect.max_attempts"
        );
        assert_eq!(
            map_env_key("worker_forward_retry_base_delay_ms"),
            "worker.forward_retry.base_delay_ms"
        );
        assert_eq!(map_env_key("worker_rules_path"), "worker.rules_path");
        assert_eq!(
            map_env_key("storage_database_path"),
            "storage.database_path"
        );
        assert_eq!(
            map_env_key("kinds_logger_max_memory"),
            "kinds.logger.max_memory"
        );
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[reaper]\nage_threshold_hours = 12\n")?;
            jail.set_env("SOLANAGRAM_REAPER_AGE_THRESHOLD_HOURS", "6");
            jail.set_env("SOLANAGRAM_STORAGE_DATABASE_PATH", "/tmp/fleet.db");

            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.reaper.age_threshold_hours, 6);
            assert_eq!(config.storage.database_path, "/tmp/fleet.db");
            Ok(())
        });
    }

    #[test]
    fn worker_env_overrides_reach_config_fields() {
        use solanagram_core::worker_env;

        figment::Jail::expect_with(|jail| {
            jail.create_file("worker.toml", "")?;
            jail.set_env(worker_env::CONFIG_PATH, "/w/config.json");
            jail.set_env(worker_env::RULES_PATH, "/w/rules.json");
            jail.set_env(worker_env::COUNTERS_PATH, "/app/data/w1/stats.json");
            jail.set_env(worker_env::DATABASE_PATH, "/app/data/solanagram.db");

            let config = load_config_from_path(Path::new("worker.toml"))?;
            assert_eq!(config.worker.config_path, "/w/config.json");
            assert_eq!(config.worker.rules_path, "/w/rules.json");
            assert_eq!(config.worker.counters_path, "/app/data/w1/stats.json");
            assert_eq!(config.storage.database_path, "/app/data/solanagram.db");
            Ok(())
        });
    }
}
