// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `MessageStore` capability.

use async_trait::async_trait;
use solanagram_config::model::StorageConfig;
use solanagram_core::traits::InsertOutcome;
use solanagram_core::types::{ElaborationRule, ExtractedValue, SavedMessage};
use solanagram_core::{MessageStore, SolanagramError};
use tracing::debug;

use crate::database::Database;
use crate::models::RuleStats;
use crate::queries;

/// SQLite-backed store wrapping a [`Database`] handle.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub async fn open(config: &StorageConfig) -> Result<Self, SolanagramError> {
        let db = Database::open_with_config(config).await?;
        debug!(path = %config.database_path, "SQLite store opened");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn replace_rules_for_listener(
        &self,
        listener_id: i64,
        rules: &[ElaborationRule],
    ) -> Result<(), SolanagramError> {
        queries::rules::replace_rules_for_listener(&self.db, listener_id, rules).await
    }

    pub async fn rules_for_listener(
        &self,
        listener_id: i64,
    ) -> Result<Vec<ElaborationRule>, SolanagramError> {
        queries::rules::rules_for_listener(&self.db, listener_id).await
    }

    pub async fn rule_stats(&self, rule_id: i64) -> Result<Option<RuleStats>, SolanagramError> {
        queries::rules::rule_stats(&self.db, rule_id).await
    }

    pub async fn count_messages_for_session(
        &self,
        session_id: &str,
    ) -> Result<i64, SolanagramError> {
        queries::messages::count_messages_for_session(&self.db, session_id).await
    }

    pub async fn extracted_values_for_message(
        &self,
        saved_message_id: i64,
    ) -> Result<Vec<ExtractedValue>, SolanagramError> {
        queries::extracted::extracted_values_for_message(&self.db, saved_message_id).await
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), SolanagramError> {
        self.db.close().await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_saved_message(
        &self,
        message: &SavedMessage,
    ) -> Result<InsertOutcome, SolanagramError> {
        queries::messages::insert_saved_message(&self.db, message).await
    }

    async fn insert_extracted_values(
        &self,
        values: &[ExtractedValue],
    ) -> Result<(), SolanagramError> {
        queries::extracted::insert_extracted_values(&self.db, values).await
    }

    async fn sync_rules(
        &self,
        listener_id: i64,
        rules: &[ElaborationRule],
    ) -> Result<(), SolanagramError> {
        queries::rules::replace_rules_for_listener(&self.db, listener_id, rules).await
    }

    async fn record_rule_outcome(
        &self,
        rule_id: i64,
        error: Option<&str>,
    ) -> Result<(), SolanagramError> {
        queries::rules::record_rule_outcome(&self.db, rule_id, error).await
    }
}
