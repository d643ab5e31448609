// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message processing: persistence, elaborations and forwarding.
//!
//! Every error is contained at the message (or rule) level. One failing
//! rule never stops the rules after it, and one failing message never
//! stops the subscription.

use std::sync::Arc;

use chrono::Utc;
use regex::RegexBuilder;
use solanagram_core::traits::InsertOutcome;
use solanagram_core::{
    ElaborationAction, ElaborationRule, ExtractedValue, ExtractionRule, InboundEvent,
    MessageStore, MessagingService, SavedMessage, SolanagramError, WorkerKind,
};
use tracing::{debug, info, warn};

use crate::forward::{ForwardPolicy, forward_with_retry};

/// One anchor hit: where it was found and what followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub position: usize,
    pub text: String,
}

/// Finds every case-insensitive occurrence of `rule.search_text` and takes
/// up to `extract_length` characters after it, skipping leading whitespace.
/// Occurrences followed by nothing are not matches. `position` is the byte
/// offset of the anchor.
pub fn extract(text: &str, rule: &ExtractionRule) -> Vec<Extraction> {
    if rule.search_text.is_empty() || rule.extract_length == 0 {
        return Vec::new();
    }
    let Ok(anchor) = RegexBuilder::new(&regex::escape(&rule.search_text))
        .case_insensitive(true)
        .build()
    else {
        return Vec::new();
    };

    anchor
        .find_iter(text)
        .filter_map(|m| {
            let value: String = text[m.end()..]
                .trim_start()
                .chars()
                .take(rule.extract_length)
                .collect();
            let value = value.trim_end().to_string();
            (!value.is_empty()).then_some(Extraction {
                position: m.start(),
                text: value,
            })
        })
        .collect()
}

/// What happened to one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReport {
    /// Already persisted under this session; nothing else was done.
    pub duplicate: bool,
    pub forwarded: u32,
    /// Persistence or the kind's main forward failed.
    pub failed: bool,
    /// Ids of rules that failed on this message.
    pub rule_errors: Vec<i64>,
}

pub struct Pipeline {
    kind: WorkerKind,
    session_id: String,
    /// Forwarder destination.
    target: Option<String>,
    messaging: Arc<dyn MessagingService>,
    store: Arc<dyn MessageStore>,
    forward_policy: ForwardPolicy,
}

impl Pipeline {
    pub fn new(
        kind: WorkerKind,
        session_id: String,
        target: Option<String>,
        messaging: Arc<dyn MessagingService>,
        store: Arc<dyn MessageStore>,
        forward_policy: ForwardPolicy,
    ) -> Self {
        Self {
            kind,
            session_id,
            target,
            messaging,
            store,
            forward_policy,
        }
    }

    /// Runs the kind's behavior on one message with a fixed rule snapshot.
    pub async fn process(&self, event: &InboundEvent, rules: &[ElaborationRule]) -> MessageReport {
        let mut report = MessageReport::default();

        if self.kind == WorkerKind::Forwarder {
            self.forward_main(event, &mut report).await;
            return report;
        }

        let saved_id = match self.store.insert_saved_message(&self.saved_message(event)).await {
            Ok(InsertOutcome::Inserted(id)) => id,
            Ok(InsertOutcome::Duplicate(id)) => {
                debug!(message_id = event.message_id, row = id, "duplicate delivery skipped");
                report.duplicate = true;
                return report;
            }
            Err(e) => {
                warn!(message_id = event.message_id, error = %e, "failed to persist message");
                report.failed = true;
                return report;
            }
        };

        if !self.kind.runs_elaborations() {
            return report;
        }

        for rule in rules.iter().filter(|r| r.is_active) {
            let result = self.apply_rule(rule, event, saved_id, &mut report).await;
            let error = result.as_ref().err().map(ToString::to_string);
            if let Some(message) = &error {
                warn!(rule_id = rule.id, message_id = event.message_id, error = %message, "elaboration failed");
                report.rule_errors.push(rule.id);
            }
            if let Err(e) = self.store.record_rule_outcome(rule.id, error.as_deref()).await {
                warn!(rule_id = rule.id, error = %e, "failed to record rule outcome");
            }
        }
        report
    }

    async fn forward_main(&self, event: &InboundEvent, report: &mut MessageReport) {
        let Some(target) = self.target.as_deref() else {
            warn!("forwarder has no target, message dropped");
            report.failed = true;
            return;
        };
        match forward_with_retry(self.messaging.as_ref(), target, event, self.forward_policy).await {
            Ok(()) => report.forwarded += 1,
            Err(e) => {
                warn!(message_id = event.message_id, target, error = %e, "message dropped after retries");
                report.failed = true;
            }
        }
    }

    async fn apply_rule(
        &self,
        rule: &ElaborationRule,
        event: &InboundEvent,
        saved_id: i64,
        report: &mut MessageReport,
    ) -> Result<(), SolanagramError> {
        match rule.action()? {
            ElaborationAction::Extractor { rules } => {
                let now = Utc::now().to_rfc3339();
                let values: Vec<ExtractedValue> = rules
                    .iter()
                    .flat_map(|r| {
                        extract(&event.text, r).into_iter().map(|hit| ExtractedValue {
                            saved_message_id: saved_id,
                            rule_name: r.rule_name.clone(),
                            search_text: r.search_text.clone(),
                            extracted_text: hit.text,
                            position: hit.position as i64,
                            extracted_at: now.clone(),
                        })
                    })
                    .collect();
                if !values.is_empty() {
                    info!(rule_id = rule.id, count = values.len(), "values extracted");
                }
                self.store.insert_extracted_values(&values).await
            }
            ElaborationAction::Redirect { target_channel_id } => {
                forward_with_retry(
                    self.messaging.as_ref(),
                    &target_channel_id,
                    event,
                    self.forward_policy,
                )
                .await?;
                report.forwarded += 1;
                Ok(())
            }
        }
    }

    fn saved_message(&self, event: &InboundEvent) -> SavedMessage {
        SavedMessage {
            channel_id: event.channel_id,
            message_id: event.message_id,
            session_id: self.session_id.clone(),
            sender_id: event.sender_id,
            text: event.text.clone(),
            metadata: (!event.raw.is_null()).then(|| event.raw.to_string()),
            received_at: event.timestamp.to_rfc3339(),
        }
    }
}
