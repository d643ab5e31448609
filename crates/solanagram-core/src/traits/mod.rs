// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits for the external collaborators.
//!
//! All traits use `#[async_trait]` so they can be held as trait objects.

pub mod messaging;
pub mod runtime;
pub mod storage;

pub use messaging::{EventStream, MessagingService};
pub use runtime::{ContainerRuntime, ContainerSpec, ExecOutput, ListFilter, StatsSnapshot};
pub use storage::{InsertOutcome, MessageStore};
