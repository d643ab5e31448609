// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic worker names.
//!
//! `{prefix}-{user_id}[-{disambiguator}]-{source}[-to-{target}]`, lowercased.
//! Existing deployments find their workers by these names, so the format
//! must not drift.

use std::sync::LazyLock;

use regex::Regex;
use solanagram_core::{ForwardTarget, WorkerSpec};

static UNSAFE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static pattern compiles"));

/// Collapses every run of characters outside `[A-Za-z0-9_-]` to one underscore
/// and trims leading/trailing underscores.
pub fn sanitize_component(raw: &str) -> String {
    UNSAFE_RUN
        .replace_all(raw, "_")
        .trim_matches('_')
        .to_string()
}

fn target_component(target: &ForwardTarget) -> String {
    let name = sanitize_component(&target.name);
    if name.is_empty() {
        sanitize_component(&target.id)
    } else {
        name
    }
}

/// Derives the runtime name of the worker described by `spec`.
///
/// A source title with no usable characters falls back to the numeric
/// channel id so two such workers of one user still differ.
pub fn worker_name(prefix: &str, spec: &WorkerSpec) -> String {
    let mut name = format!("{prefix}-{}", spec.user_id);
    if let Some(disambiguator) = &spec.disambiguator {
        let d = sanitize_component(disambiguator);
        if !d.is_empty() {
            name.push('-');
            name.push_str(&d);
        }
    }

    let source = sanitize_component(&spec.source.title);
    name.push('-');
    if source.is_empty() {
        name.push_str(&spec.source.id.unsigned_abs().to_string());
    } else {
        name.push_str(&source);
    }

    if let Some(target) = &spec.target {
        let t = target_component(target);
        if !t.is_empty() {
            name.push_str("-to-");
            name.push_str(&t);
        }
    }

    name.to_lowercase()
}
