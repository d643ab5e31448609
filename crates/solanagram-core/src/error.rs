// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy shared by the control plane and the worker runtime.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across Solanagram crates.
#[derive(Debug, Error)]
pub enum SolanagramError {
    /// Malformed limits or configuration, rejected before any runtime call.
    #[error("configuration error: {0}")]
    Config(String),

    /// A worker with this name already exists and is running.
    #[error("worker {name} already running")]
    AlreadyExists { name: String },

    /// Target worker (or image) is absent.
    #[error("worker {name} not found")]
    NotFound { name: String },

    /// The container runtime or messaging backend is unreachable or rejected the call.
    #[error("runtime unavailable: {message}")]
    RuntimeUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The messaging session is not authorized. Never retried.
    #[error("authorization required: {0}")]
    AuthRequired(String),

    /// Network or connection hiccup, retried per the backoff policy.
    #[error("transient failure: {message}")]
    Transient {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider demands a wait before the next request.
    #[error("rate limited, retry after {wait:?}")]
    RateLimited { wait: Duration },

    /// Relational store failures (connection, query, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SolanagramError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            message: message.into(),
            source: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Errors a worker may recover from by waiting and trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// Errors that must terminate a worker process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthRequired(_) | Self::Config(_))
    }
}
