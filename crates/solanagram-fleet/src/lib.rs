// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control plane for the Solanagram worker fleet.
//!
//! One [`FleetManager`] per worker kind, parameterized by a
//! [`WorkerKindPolicy`]. The manager normalizes resource requests, makes
//! sure the kind's image exists, provisions workers in two phases
//! (create+start, then inject config and restart) and turns every runtime
//! failure into an [`Outcome`] instead of an error.

pub mod docker;
pub mod image;
pub mod inject;
pub mod limits;
pub mod manager;
pub mod monitor;
pub mod naming;
pub mod policy;
pub mod reaper;

pub use docker::DockerRuntime;
pub use image::{ResolvedImage, resolve_image};
pub use limits::{NormalizedLimits, normalize_limits};
pub use manager::{FleetManager, FleetSettings, Outcome};
pub use monitor::{ResourceUsage, WorkerStatus};
pub use naming::worker_name;
pub use policy::WorkerKindPolicy;
pub use reaper::ReapReport;

/// Label keys every managed worker carries.
pub mod labels {
    pub const MANAGED: &str = "solanagram.managed";
    pub const KIND: &str = "solanagram.kind";
    pub const USER_ID: &str = "solanagram.user_id";
    pub const SOURCE_ID: &str = "solanagram.source_id";
}
