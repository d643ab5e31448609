// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker's main loop: connect, authorize, subscribe, listen and
//! reconnect under the supervisor's decisions.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use solanagram_core::{MessagingService, SessionSource, SolanagramError, WorkerConfigDocument};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::counters::CounterArtifact;
use crate::pipeline::Pipeline;
use crate::reload::RuleSet;
use crate::supervisor::{ConnectionState, Decision, Supervisor};

/// Why the runtime stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Shutdown was requested; the in-flight message was finished.
    Shutdown,
    /// The supervisor gave up or hit a fatal error.
    Terminated(String),
}

pub struct WorkerRuntime {
    document: WorkerConfigDocument,
    session: SessionSource,
    messaging: Arc<dyn MessagingService>,
    pipeline: Pipeline,
    rules: RuleSet,
    counters: CounterArtifact,
    supervisor: Supervisor,
}

impl WorkerRuntime {
    pub fn new(
        document: WorkerConfigDocument,
        session: SessionSource,
        messaging: Arc<dyn MessagingService>,
        pipeline: Pipeline,
        rules: RuleSet,
        counters: CounterArtifact,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            document,
            session,
            messaging,
            pipeline,
            rules,
            counters,
            supervisor,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn counters(&self) -> &CounterArtifact {
        &self.counters
    }

    /// Runs until cancelled or terminated by the supervisor.
    pub async fn run(&mut self, cancel: CancellationToken) -> Exit {
        info!(
            worker = %self.document.worker_name,
            kind = %self.document.kind,
            channel_id = self.document.source.id,
            "worker runtime starting"
        );
        loop {
            if cancel.is_cancelled() {
                return self.shutdown().await;
            }

            let failure = match self.session_cycle(&cancel).await {
                Ok(()) => return self.shutdown().await,
                Err(e) => e,
            };
            self.messaging.disconnect().await;

            let delay = match self.supervisor.on_failure(&failure) {
                Decision::Retry(delay) => delay,
                Decision::Terminate(reason) => return Exit::Terminated(reason),
            };
            if !sleep_or_cancel(delay, &cancel).await {
                return self.shutdown().await;
            }
        }
    }

    /// One connect → authorize → subscribe → listen cycle. `Ok` means
    /// shutdown was requested; `Err` is the failure that ended the session.
    async fn session_cycle(&mut self, cancel: &CancellationToken) -> Result<(), SolanagramError> {
        self.supervisor.transition(ConnectionState::Connecting);
        self.messaging
            .connect(&self.document.credentials, &self.session)
            .await?;

        self.supervisor.transition(ConnectionState::Authorizing);
        if !self.messaging.is_authorized().await? {
            return Err(SolanagramError::AuthRequired(
                "session is not authorized; recreate the worker with an authorized session"
                    .to_string(),
            ));
        }

        let mut events = self.messaging.subscribe(self.document.source.id).await?;
        self.supervisor.on_listening();
        info!(channel_id = self.document.source.id, "listening");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = events.next() => next,
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(e),
                None => return Err(SolanagramError::transient("event stream ended")),
            };

            // Not raced against cancellation: a message that started is finished.
            let rules = self.rules.load_full();
            let report = self.pipeline.process(&event, &rules).await;
            self.counters.record(&report);
            self.counters.flush().await;
        }
    }

    async fn shutdown(&mut self) -> Exit {
        // A failed session was already disconnected before its backoff.
        let open = !matches!(
            self.supervisor.state(),
            ConnectionState::Disconnected | ConnectionState::Reconnecting | ConnectionState::Terminated
        );
        if open {
            self.messaging.disconnect().await;
        }
        self.supervisor.transition(ConnectionState::Disconnected);
        self.counters.flush().await;
        info!(
            processed = self.counters.counters().messages_processed,
            "worker runtime stopped"
        );
        Exit::Shutdown
    }
}

/// Sleeps for `delay`; `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = cancel.cancelled() => {
            warn!("shutdown requested during backoff");
            false
        }
    }
}

