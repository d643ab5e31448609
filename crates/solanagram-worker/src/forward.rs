// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message forward with exponential backoff.

use std::time::Duration;

use solanagram_config::model::ForwardRetryConfig;
use solanagram_core::{InboundEvent, MessagingService, SolanagramError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl ForwardPolicy {
    pub fn from_config(cfg: &ForwardRetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
        }
    }

    /// Delay after the `attempt`-th failure: `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Forwards `event` to `target`.
///
/// Transient errors consume an attempt and back off exponentially. A rate
/// limit is slept out and retried for free. Any other error, or running out
/// of attempts, returns the last error; the caller drops the message.
pub async fn forward_with_retry(
    messaging: &dyn MessagingService,
    target: &str,
    event: &InboundEvent,
    policy: ForwardPolicy,
) -> Result<(), SolanagramError> {
    let mut attempt = 0;
    loop {
        let err = match messaging.forward(target, event).await {
            Ok(()) => {
                debug!(target, message_id = event.message_id, "forwarded");
                return Ok(());
            }
            Err(e) => e,
        };

        match err {
            SolanagramError::RateLimited { wait } => {
                warn!(
                    target,
                    wait_ms = wait.as_millis() as u64,
                    "forward rate limited, waiting"
                );
                tokio::time::sleep(wait).await;
            }
            SolanagramError::Transient { .. } => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    target,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "forward failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            other => return Err(other),
        }
    }
}
