// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection supervisor: the reconnect/backoff state machine.
//!
//! The decision logic is pure ([`Supervisor::on_failure`]); the runtime
//! owns the sleeps. Transient failures back off linearly up to a cap and
//! count against the attempt budget. A provider rate limit is waited out
//! exactly and never counts.

use std::time::Duration;

use solanagram_config::model::ReconnectConfig;
use solanagram_core::SolanagramError;
use tracing::{debug, error, warn};

/// Lifecycle states of a worker's messaging connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authorizing,
    Listening,
    Reconnecting,
    Terminated,
}

/// Linear reconnect backoff with a delay cap and an attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self {
            base_delay: Duration::from_secs(cfg.base_delay_secs),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
            max_attempts: cfg.max_attempts,
        }
    }

    /// `base * attempt`, capped at `max_delay`. `attempt` starts at 1.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.max(1))
            .min(self.max_delay)
    }
}

/// What the runtime should do after a connection-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sleep this long, then reconnect.
    Retry(Duration),
    /// Give up; the worker exits with this reason.
    Terminate(String),
}

#[derive(Debug)]
pub struct Supervisor {
    policy: ReconnectPolicy,
    attempts: u32,
    state: ConnectionState,
}

impl Supervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive counted failures since the last successful subscribe.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "connection state");
            self.state = next;
        }
    }

    /// Listening again: the attempt budget starts over.
    pub fn on_listening(&mut self) {
        self.attempts = 0;
        self.transition(ConnectionState::Listening);
    }

    pub fn on_failure(&mut self, err: &SolanagramError) -> Decision {
        if err.is_fatal() {
            error!(error = %err, "fatal connection error");
            self.transition(ConnectionState::Terminated);
            return Decision::Terminate(err.to_string());
        }

        if let SolanagramError::RateLimited { wait } = err {
            warn!(wait_ms = wait.as_millis() as u64, "rate limited by provider");
            self.transition(ConnectionState::Reconnecting);
            return Decision::Retry(*wait);
        }

        self.attempts += 1;
        if self.attempts > self.policy.max_attempts {
            error!(attempts = self.attempts - 1, error = %err, "reconnect attempts exhausted");
            self.transition(ConnectionState::Terminated);
            return Decision::Terminate(format!(
                "gave up after {} reconnect attempts: {err}",
                self.policy.max_attempts
            ));
        }

        let delay = self.policy.delay_for(self.attempts);
        warn!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "connection lost, reconnecting"
        );
        self.transition(ConnectionState::Reconnecting);
        Decision::Retry(delay)
    }
}
