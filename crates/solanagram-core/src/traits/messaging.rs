// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging service capability consumed by the worker runtime.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::SolanagramError;
use crate::types::{Credentials, InboundEvent, SessionSource};

/// Inbound events for one subscribed channel. The stream ending means the
/// session was lost and the supervisor should reconnect.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<InboundEvent, SolanagramError>> + Send>>;

/// Adapter for the external real-time messaging service.
///
/// Errors are classified through [`SolanagramError`]: `RateLimited` carries
/// the provider's mandatory wait, `Transient` covers connection-level
/// failures, and `AuthRequired` means the session must be recreated.
#[async_trait]
pub trait MessagingService: Send + Sync + 'static {
    /// Opens a session with the given credentials.
    async fn connect(
        &self,
        credentials: &Credentials,
        session: &SessionSource,
    ) -> Result<(), SolanagramError>;

    /// Whether the open session is pre-authorized.
    async fn is_authorized(&self) -> Result<bool, SolanagramError>;

    async fn subscribe(&self, channel_id: i64) -> Result<EventStream, SolanagramError>;

    /// Forwards a received message to `target` (numeric id or `@username`).
    async fn forward(&self, target: &str, event: &InboundEvent) -> Result<(), SolanagramError>;

    async fn disconnect(&self);
}
