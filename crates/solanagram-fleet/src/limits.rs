// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resource limit normalization.
//!
//! Requests are downgraded to the kind's ceiling, never rejected for being
//! too large. Only unparseable input (bad memory strings, non-finite CPU)
//! is an error.

use solanagram_core::units::{format_memory_size, parse_memory_size};
use solanagram_core::{LimitRequest, ResourceLimits, SolanagramError};
use tracing::warn;

use crate::policy::WorkerKindPolicy;

/// Smallest CPU share handed out. A zero share means "unlimited" to the runtime.
pub const MIN_CPU: f64 = 0.01;

/// Smallest memory limit handed out. Zero means "unlimited" to the runtime.
pub const MIN_MEMORY: i64 = 4 * 1024 * 1024;

/// Effective limits plus a note for every value that was adjusted.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLimits {
    pub limits: ResourceLimits,
    pub downgrades: Vec<String>,
}

pub fn normalize_limits(
    policy: &WorkerKindPolicy,
    request: &LimitRequest,
) -> Result<NormalizedLimits, SolanagramError> {
    let mut downgrades = Vec::new();

    // The ceiling wins over the floor when a policy sets it lower.
    let memory_ceiling = policy.max_memory;
    let memory_floor = MIN_MEMORY.min(memory_ceiling);
    let requested_memory = match &request.memory_limit {
        Some(raw) => parse_memory_size(raw)?,
        None => policy.default_memory,
    };
    let memory = if requested_memory > memory_ceiling {
        downgrades.push(format!(
            "memory {} exceeds ceiling {}, using ceiling",
            format_memory_size(requested_memory),
            format_memory_size(memory_ceiling)
        ));
        memory_ceiling
    } else if requested_memory < memory_floor {
        downgrades.push(format!(
            "memory {} below floor {}, using floor",
            format_memory_size(requested_memory),
            format_memory_size(memory_floor)
        ));
        memory_floor
    } else {
        requested_memory
    };

    let cpu_ceiling = policy.max_cpu;
    let cpu_floor = MIN_CPU.min(cpu_ceiling);
    let requested_cpu = request.cpu_limit.unwrap_or(policy.default_cpu);
    if !requested_cpu.is_finite() {
        return Err(SolanagramError::Config(format!(
            "cpu limit must be a finite number, got {requested_cpu}"
        )));
    }
    let cpu = if requested_cpu > cpu_ceiling {
        downgrades.push(format!(
            "cpu {requested_cpu} exceeds ceiling {cpu_ceiling}, using ceiling"
        ));
        cpu_ceiling
    } else if requested_cpu < cpu_floor {
        downgrades.push(format!("cpu {requested_cpu} below floor {cpu_floor}, using floor"));
        cpu_floor
    } else {
        requested_cpu
    };

    for note in &downgrades {
        warn!(kind = %policy.kind, "{note}");
    }

    Ok(NormalizedLimits {
        limits: ResourceLimits {
            memory_bytes: memory,
            memory_swap_bytes: memory.saturating_mul(policy.swap_multiplier),
            nano_cpus: (cpu * 1e9).round() as i64,
            pids_limit: policy.pids_limit,
        },
        downgrades,
    })
}
