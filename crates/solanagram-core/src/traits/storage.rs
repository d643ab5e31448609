// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relational store capability used by the worker runtime.

use async_trait::async_trait;

use crate::error::SolanagramError;
use crate::types::{ElaborationRule, ExtractedValue, SavedMessage};

/// Result of an idempotent message insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The (channel, message, session) key already existed; carries its row id.
    Duplicate(i64),
}

impl InsertOutcome {
    pub fn row_id(self) -> i64 {
        match self {
            InsertOutcome::Inserted(id) | InsertOutcome::Duplicate(id) => id,
        }
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Inserts a message, treating a conflict on the idempotency key as a no-op.
    async fn insert_saved_message(
        &self,
        message: &SavedMessage,
    ) -> Result<InsertOutcome, SolanagramError>;

    async fn insert_extracted_values(
        &self,
        values: &[ExtractedValue],
    ) -> Result<(), SolanagramError>;

    /// Makes the stored rule records of `listener_id` match `rules`.
    /// Counters of rules that survive are kept.
    async fn sync_rules(
        &self,
        listener_id: i64,
        rules: &[ElaborationRule],
    ) -> Result<(), SolanagramError>;

    /// Bumps the success or error counter of an elaboration rule.
    async fn record_rule_outcome(
        &self,
        rule_id: i64,
        error: Option<&str>,
    ) -> Result<(), SolanagramError>;
}
