// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory message store honoring the (channel, message, session) key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use solanagram_core::traits::{InsertOutcome, MessageStore};
use solanagram_core::{ElaborationRule, ExtractedValue, SavedMessage, SolanagramError};

#[derive(Default)]
struct MemoryStoreState {
    messages: Vec<SavedMessage>,
    keys: HashMap<(i64, i64, String), i64>,
    extracted: Vec<ExtractedValue>,
    rules: HashMap<i64, Vec<ElaborationRule>>,
    /// rule id -> (successes, errors, last error)
    outcomes: HashMap<i64, (u32, u32, Option<String>)>,
    fail_inserts: u32,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryStoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` message inserts with a storage error.
    pub async fn fail_next_inserts(&self, n: u32) {
        self.state.lock().await.fail_inserts = n;
    }

    pub async fn messages(&self) -> Vec<SavedMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn extracted(&self) -> Vec<ExtractedValue> {
        self.state.lock().await.extracted.clone()
    }

    /// Rule records last synced for a listener.
    pub async fn rules(&self, listener_id: i64) -> Vec<ElaborationRule> {
        self.state
            .lock()
            .await
            .rules
            .get(&listener_id)
            .cloned()
            .unwrap_or_default()
    }

    /// `(successes, errors, last_error)` recorded for a rule.
    pub async fn outcome(&self, rule_id: i64) -> (u32, u32, Option<String>) {
        self.state
            .lock()
            .await
            .outcomes
            .get(&rule_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_saved_message(
        &self,
        message: &SavedMessage,
    ) -> Result<InsertOutcome, SolanagramError> {
        let mut state = self.state.lock().await;
        if state.fail_inserts > 0 {
            state.fail_inserts -= 1;
            return Err(SolanagramError::Storage {
                source: "injected insert failure".into(),
            });
        }
        let key = (
            message.channel_id,
            message.message_id,
            message.session_id.clone(),
        );
        if let Some(id) = state.keys.get(&key) {
            return Ok(InsertOutcome::Duplicate(*id));
        }
        state.messages.push(message.clone());
        let id = state.messages.len() as i64;
        state.keys.insert(key, id);
        Ok(InsertOutcome::Inserted(id))
    }

    async fn insert_extracted_values(
        &self,
        values: &[ExtractedValue],
    ) -> Result<(), SolanagramError> {
        self.state.lock().await.extracted.extend_from_slice(values);
        Ok(())
    }

    async fn sync_rules(
        &self,
        listener_id: i64,
        rules: &[ElaborationRule],
    ) -> Result<(), SolanagramError> {
        self.state.lock().await.rules.insert(listener_id, rules.to_vec());
        Ok(())
    }

    async fn record_rule_outcome(
        &self,
        rule_id: i64,
        error: Option<&str>,
    ) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        let entry = state.outcomes.entry(rule_id).or_default();
        match error {
            None => entry.0 += 1,
            Some(message) => {
                entry.1 += 1;
                entry.2 = Some(message.to_string());
            }
        }
        Ok(())
    }
}
