// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable memory sizes (`256m`, `1g`, `512k`, `1048576`).

use crate::error::SolanagramError;

/// Parses `<integer><unit>` where unit is one of `b`, `k`, `m`, `g`
/// (case-insensitive). A missing unit means bytes.
pub fn parse_memory_size(input: &str) -> Result<i64, SolanagramError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SolanagramError::Config("empty memory size".into()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let (digits, multiplier) = match lower.chars().last() {
        Some('b') => (&lower[..lower.len() - 1], 1i64),
        Some('k') => (&lower[..lower.len() - 1], 1024),
        Some('m') => (&lower[..lower.len() - 1], 1024 * 1024),
        Some('g') => (&lower[..lower.len() - 1], 1024 * 1024 * 1024),
        _ => (lower.as_str(), 1),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SolanagramError::Config(format!(
            "invalid memory size `{input}`: expected <integer>[b|k|m|g]"
        )));
    }

    let value: i64 = digits.parse().map_err(|_| {
        SolanagramError::Config(format!("memory size `{input}` is out of range"))
    })?;
    value.checked_mul(multiplier).ok_or_else(|| {
        SolanagramError::Config(format!("memory size `{input}` is out of range"))
    })
}

/// Renders bytes in the largest whole unit (`268435456` -> `256m`).
pub fn format_memory_size(bytes: i64) -> String {
    const UNITS: [(i64, &str); 3] = [(1 << 30, "g"), (1 << 20, "m"), (1 << 10, "k")];
    for (size, suffix) in UNITS {
        if bytes >= size && bytes % size == 0 {
            return format!("{}{suffix}", bytes / size);
        }
    }
    format!("{bytes}b")
}
