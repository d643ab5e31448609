// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock messaging service for deterministic worker tests.
//!
//! Connect, authorize and forward results can be scripted per call; inbound
//! events are pushed into the currently open subscription. Closing the
//! subscription ends the event stream, which the worker treats as a lost
//! connection.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;
use tokio::sync::{Mutex, mpsc};

use solanagram_core::traits::{EventStream, MessagingService};
use solanagram_core::{Credentials, InboundEvent, SessionSource, SolanagramError};

type EventResult = Result<InboundEvent, SolanagramError>;

#[derive(Default)]
struct MockMessagingState {
    connect_results: VecDeque<Result<(), SolanagramError>>,
    subscribe_results: VecDeque<Result<(), SolanagramError>>,
    forward_results: VecDeque<Result<(), SolanagramError>>,
    authorized: Option<bool>,
    pending: Vec<EventResult>,
    sender: Option<mpsc::UnboundedSender<EventResult>>,
    connects: u32,
    subscriptions: Vec<i64>,
    forward_attempts: u32,
    forwarded: Vec<(String, i64)>,
    disconnects: u32,
}

/// A scripted messaging service.
///
/// Unscripted calls succeed; the session is authorized unless
/// [`MockMessaging::set_authorized`] says otherwise.
#[derive(Clone, Default)]
pub struct MockMessaging {
    state: Arc<Mutex<MockMessagingState>>,
}

impl MockMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script_connect(&self, result: Result<(), SolanagramError>) {
        self.state.lock().await.connect_results.push_back(result);
    }

    pub async fn script_subscribe(&self, result: Result<(), SolanagramError>) {
        self.state.lock().await.subscribe_results.push_back(result);
    }

    pub async fn script_forward(&self, result: Result<(), SolanagramError>) {
        self.state.lock().await.forward_results.push_back(result);
    }

    pub async fn set_authorized(&self, authorized: bool) {
        self.state.lock().await.authorized = Some(authorized);
    }

    /// Deliver an event to the open subscription, or queue it for the next one.
    pub async fn push_event(&self, event: EventResult) {
        let mut state = self.state.lock().await;
        let event = match &state.sender {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };
        state.sender = None;
        state.pending.push(event);
    }

    /// End the open subscription's stream.
    pub async fn close_stream(&self) {
        self.state.lock().await.sender = None;
    }

    pub async fn connect_count(&self) -> u32 {
        self.state.lock().await.connects
    }

    pub async fn subscriptions(&self) -> Vec<i64> {
        self.state.lock().await.subscriptions.clone()
    }

    pub async fn forward_attempts(&self) -> u32 {
        self.state.lock().await.forward_attempts
    }

    /// Successful forwards as `(target, message_id)`.
    pub async fn forwarded(&self) -> Vec<(String, i64)> {
        self.state.lock().await.forwarded.clone()
    }

    pub async fn disconnect_count(&self) -> u32 {
        self.state.lock().await.disconnects
    }
}

/// Builds a plain text event for tests.
pub fn text_event(channel_id: i64, message_id: i64, text: &str) -> InboundEvent {
    InboundEvent {
        channel_id,
        message_id,
        sender_id: Some(1000),
        text: text.to_string(),
        timestamp: Utc::now(),
        raw: serde_json::json!({"message_id": message_id}),
    }
}

#[async_trait]
impl MessagingService for MockMessaging {
    async fn connect(
        &self,
        _credentials: &Credentials,
        _session: &SessionSource,
    ) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        state.connects += 1;
        state.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn is_authorized(&self) -> Result<bool, SolanagramError> {
        Ok(self.state.lock().await.authorized.unwrap_or(true))
    }

    async fn subscribe(&self, channel_id: i64) -> Result<EventStream, SolanagramError> {
        let mut state = self.state.lock().await;
        state.subscriptions.push(channel_id);
        state.subscribe_results.pop_front().unwrap_or(Ok(()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for event in state.pending.drain(..) {
            let _ = tx.send(event);
        }
        state.sender = Some(tx);

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn forward(&self, target: &str, event: &InboundEvent) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        state.forward_attempts += 1;
        let result = state.forward_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.forwarded.push((target.to_string(), event.message_id));
        }
        result
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.disconnects += 1;
        state.sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn creds() -> Credentials {
        Credentials {
            phone: "+1".into(),
            api_id: 1,
            api_hash: "h".into(),
        }
    }

    #[tokio::test]
    async fn queued_events_are_delivered_on_subscribe() {
        let messaging = MockMessaging::new();
        messaging.push_event(Ok(text_event(-1, 1, "early"))).await;
        messaging
            .connect(&creds(), &SessionSource::String("s".into()))
            .await
            .unwrap();

        let mut events = messaging.subscribe(-1).await.unwrap();
        messaging.push_event(Ok(text_event(-1, 2, "late"))).await;
        messaging.close_stream().await;

        let ids: Vec<i64> = events
            .by_ref()
            .map(|e| e.unwrap().message_id)
            .collect()
            .await;
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn scripted_forward_results_are_consumed_in_order() {
        let messaging = MockMessaging::new();
        messaging
            .script_forward(Err(SolanagramError::transient("reset")))
            .await;
        let event = text_event(-1, 5, "x");

        assert!(messaging.forward("@bob", &event).await.is_err());
        assert!(messaging.forward("@bob", &event).await.is_ok());
        assert_eq!(messaging.forward_attempts().await, 2);
        assert_eq!(messaging.forwarded().await, vec![("@bob".to_string(), 5)]);
    }
}
