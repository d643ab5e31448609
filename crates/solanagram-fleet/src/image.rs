// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker image resolution: use, build, or degrade to a compatible image.

use std::path::Path;

use solanagram_core::traits::ContainerRuntime;
use solanagram_core::SolanagramError;
use tracing::{info, warn};

use crate::policy::WorkerKindPolicy;

/// The image tag workers of a kind will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub tag: String,
    /// Set when the kind's own image could not be built and a compatible
    /// image is used instead.
    pub degraded: bool,
}

/// Makes sure a runnable image exists for `policy.kind`.
///
/// Builds from `<build_root>/<kind>` when the image is missing. For optional
/// kinds a failed build falls back to `policy.fallback_image`. Safe to call
/// repeatedly: an existing image short-circuits everything.
pub async fn resolve_image(
    runtime: &dyn ContainerRuntime,
    policy: &WorkerKindPolicy,
    build_root: &Path,
) -> Result<ResolvedImage, SolanagramError> {
    if runtime.image_exists(&policy.image).await? {
        return Ok(ResolvedImage {
            tag: policy.image.clone(),
            degraded: false,
        });
    }

    let context = build_root.join(policy.kind.to_string());
    info!(image = %policy.image, context = %context.display(), "building worker image");
    let build_err = match runtime.build_image(&policy.image, &context).await {
        Ok(()) => {
            return Ok(ResolvedImage {
                tag: policy.image.clone(),
                degraded: false,
            });
        }
        Err(e) => e,
    };

    let fallback = match (&policy.fallback_image, policy.optional) {
        (Some(fallback), true) => fallback,
        _ => return Err(build_err),
    };

    if !runtime.image_exists(fallback).await? {
        return Err(SolanagramError::runtime(format!(
            "image {} failed to build ({build_err}) and fallback {fallback} is missing",
            policy.image
        )));
    }

    warn!(
        kind = %policy.kind,
        image = %policy.image,
        fallback = %fallback,
        error = %build_err,
        "image build failed, running degraded on fallback image"
    );
    Ok(ResolvedImage {
        tag: fallback.clone(),
        degraded: true,
    })
}
