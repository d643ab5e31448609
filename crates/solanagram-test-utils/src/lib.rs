// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Solanagram.
//!
//! Provides in-memory stand-ins for the external collaborators so fleet and
//! worker tests run without Docker or a messaging account.
//!
//! # Components
//!
//! - [`MockRuntime`] - container runtime with a tiny in-container filesystem
//!   and per-operation failure injection
//! - [`MockMessaging`] - messaging service with scripted connect/forward
//!   results and injectable inbound events
//! - [`MemoryStore`] - message store keeping rows in memory

pub mod mock_messaging;
pub mod mock_runtime;
pub mod mock_store;

pub use mock_messaging::{MockMessaging, text_event};
pub use mock_runtime::{MockContainer, MockRuntime};
pub use mock_store::MemoryStore;
