// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment variables the control plane sets on every worker.
//!
//! The `SG_*` keys describe the worker and are read directly. The
//! `SOLANAGRAM_*` keys are ordinary configuration overrides picked up by the
//! worker's config loader, so they must name existing config fields.

pub const KIND: &str = "SG_KIND";
pub const WORKER_NAME: &str = "SG_WORKER_NAME";
pub const USER_ID: &str = "SG_USER_ID";
pub const SOURCE_ID: &str = "SG_SOURCE_ID";
pub const SOURCE_TITLE: &str = "SG_SOURCE_TITLE";
pub const TARGET_ID: &str = "SG_TARGET_ID";
pub const PROCESSOR_ID: &str = "SG_PROCESSOR_ID";
pub const PHONE: &str = "SG_PHONE";
pub const API_ID: &str = "SG_API_ID";
pub const API_HASH: &str = "SG_API_HASH";
/// Serialized session, when the session travels as a string.
pub const SESSION_STRING: &str = "SG_SESSION_STRING";
/// In-worker path the session file will be copied to.
pub const SESSION_FILE: &str = "SG_SESSION_FILE";

/// Overrides `worker.config_path`.
pub const CONFIG_PATH: &str = "SOLANAGRAM_WORKER_CONFIG_PATH";
/// Overrides `worker.rules_path`.
pub const RULES_PATH: &str = "SOLANAGRAM_WORKER_RULES_PATH";
/// Overrides `worker.counters_path`.
pub const COUNTERS_PATH: &str = "SOLANAGRAM_WORKER_COUNTERS_PATH";
/// Overrides `storage.database_path`.
pub const DATABASE_PATH: &str = "SOLANAGRAM_STORAGE_DATABASE_PATH";

/// Signal that asks a worker to reload its elaboration rules.
pub const RELOAD_SIGNAL: &str = "SIGUSR1";
