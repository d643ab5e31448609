// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Solanagram control plane and workers.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `SOLANAGRAM_*` environment variable overrides, and
//! miette diagnostics with typo suggestions.
//!
//! Retry and backoff constants, per-kind resource ceilings and image names are
//! policy, so they live here rather than in the crates that apply them.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, ConfigSource, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SolanagramConfig;

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<SolanagramConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        loader::search_path()
            .into_iter()
            .filter_map(|file| {
                let content = std::fs::read_to_string(&file).ok()?;
                let name = std::fs::canonicalize(&file).unwrap_or(file);
                Some(ConfigSource::new(name.display().to_string(), content))
            })
            .collect()
    })
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(
    path: &std::path::Path,
) -> Result<SolanagramConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![ConfigSource::new(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<SolanagramConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![ConfigSource::new("<inline>", toml_content)]
    })
}

/// Validates a loaded config, or turns the load failure into diagnostics.
/// `sources` is only read on failure.
#[allow(clippy::result_large_err)]
fn checked(
    loaded: Result<SolanagramConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<ConfigSource>,
) -> Result<SolanagramConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::diagnose(err, &sources())),
    }
}
