// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Solanagram worker fleet.
//!
//! This crate provides the error taxonomy, the domain types shared by the
//! control plane and the worker runtime, and the capability traits for the
//! three external collaborators: the container runtime, the messaging
//! service, and the relational store.

pub mod error;
pub mod traits;
pub mod types;
pub mod units;
pub mod worker_env;

pub use error::SolanagramError;
pub use traits::{ContainerRuntime, MessageStore, MessagingService};
pub use types::{
    Credentials, ElaborationAction, ElaborationRule, ElaborationType, ExtractedValue,
    ExtractionRule, ForwardTarget, InboundEvent, LimitRequest, ProgressCounters, ResourceLimits,
    SavedMessage,
    SessionSource, SourceChannel, TargetType, WorkerConfigDocument, WorkerHandle, WorkerKind,
    WorkerSpec, WorkerState,
};
