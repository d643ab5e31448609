// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-only row types. Shared entities live in `solanagram_core::types`.

/// Outcome counters of one elaboration rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStats {
    pub rule_id: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub updated_at: String,
}
