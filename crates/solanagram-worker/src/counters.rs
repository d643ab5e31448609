// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress counter artifact read by the control plane's status monitor.

use std::path::PathBuf;

use chrono::Utc;
use solanagram_core::ProgressCounters;
use tracing::debug;

use crate::pipeline::MessageReport;

/// Owns the worker's counters and writes them out after every message.
pub struct CounterArtifact {
    path: PathBuf,
    counters: ProgressCounters,
}

impl CounterArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            counters: ProgressCounters::default(),
        }
    }

    pub fn counters(&self) -> &ProgressCounters {
        &self.counters
    }

    pub fn record(&mut self, report: &MessageReport) {
        let c = &mut self.counters;
        c.messages_processed += 1;
        c.messages_forwarded += u64::from(report.forwarded);
        if report.duplicate {
            c.duplicates_skipped += 1;
        }
        if report.failed {
            c.messages_failed += 1;
        }
        c.last_message_at = Some(Utc::now().to_rfc3339());
    }

    /// Writes a temp file next to the artifact and renames it over, so a
    /// reader never sees a half-written document. Failures are only logged.
    pub async fn flush(&self) {
        let Ok(body) = serde_json::to_vec(&self.counters) else {
            return;
        };
        if let Some(dir) = self.path.parent()
            && let Err(e) = tokio::fs::create_dir_all(dir).await
        {
            debug!(path = %dir.display(), error = %e, "counter directory unavailable");
            return;
        }
        let tmp = self.path.with_extension("json.tmp");
        let written = async {
            tokio::fs::write(&tmp, &body).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;
        if let Err(e) = written {
            debug!(path = %self.path.display(), error = %e, "counter artifact not written");
        }
    }
}
