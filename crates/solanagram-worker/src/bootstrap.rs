// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker startup: locating the injected config document and the session.

use std::path::{Path, PathBuf};
use std::time::Duration;

use solanagram_core::{SessionSource, SolanagramError, WorkerConfigDocument, worker_env};
use tokio::time::Instant;
use tracing::{debug, info};

const DOCUMENT_POLL: Duration = Duration::from_millis(500);

/// Waits up to `wait` for the config document to appear, then parses it.
///
/// A freshly provisioned worker starts before the control plane writes its
/// document and is restarted once it has. A document that never shows up,
/// or does not parse, is a fatal configuration error.
pub async fn wait_for_document(
    path: &Path,
    wait: Duration,
) -> Result<WorkerConfigDocument, SolanagramError> {
    let deadline = Instant::now() + wait;
    loop {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                return serde_json::from_str(&raw).map_err(|e| {
                    SolanagramError::Config(format!(
                        "invalid config document {}: {e}",
                        path.display()
                    ))
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if Instant::now() >= deadline {
                    return Err(SolanagramError::Config(format!(
                        "config document {} not found after {}s",
                        path.display(),
                        wait.as_secs()
                    )));
                }
                debug!(path = %path.display(), "waiting for config document");
                tokio::time::sleep(DOCUMENT_POLL).await;
            }
            Err(e) => {
                return Err(SolanagramError::Config(format!(
                    "cannot read config document {}: {e}",
                    path.display()
                )));
            }
        }
    }
}

/// Chooses the session: a transferred file named by the document, else the
/// environment's file or string session.
pub fn session_source(
    document: &WorkerConfigDocument,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SessionSource, SolanagramError> {
    if let Some(file) = &document.session_file {
        info!(path = %file, "using transferred session file");
        return Ok(SessionSource::File(PathBuf::from(file)));
    }
    if let Some(file) = env(worker_env::SESSION_FILE).filter(|f| !f.is_empty()) {
        return Ok(SessionSource::File(PathBuf::from(file)));
    }
    match env(worker_env::SESSION_STRING).filter(|s| !s.is_empty()) {
        Some(session) => Ok(SessionSource::String(session)),
        None => Err(SolanagramError::AuthRequired(
            "no session string or session file provided".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solanagram_core::{Credentials, SourceChannel, WorkerKind};

    fn document(session_file: Option<&str>) -> WorkerConfigDocument {
        WorkerConfigDocument {
            kind: WorkerKind::Listener,
            user_id: 7,
            worker_name: "solanagram-lst-7-alpha".into(),
            session_id: "sess".into(),
            source: SourceChannel {
                id: -100,
                title: "Alpha".into(),
                chat_type: "channel".into(),
            },
            processor_id: Some(3),
            target: None,
            credentials: Credentials {
                phone: "+1".into(),
                api_id: 1,
                api_hash: "h".into(),
            },
            session_file: session_file.map(String::from),
        }
    }

    #[test]
    fn document_session_file_wins() {
        let source = session_source(&document(Some("/app/sessions/w.session")), |_| {
            Some("ignored".into())
        })
        .unwrap();
        assert_eq!(source, SessionSource::File("/app/sessions/w.session".into()));
    }

    #[test]
    fn env_string_session_and_missing_session() {
        let source = session_source(&document(None), |k| {
            (k == worker_env::SESSION_STRING).then(|| "abc".to_string())
        })
        .unwrap();
        assert_eq!(source, SessionSource::String("abc".into()));

        let err = session_source(&document(None), |_| None).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn document_written_while_waiting_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.json");
        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            std::fs::write(&writer_path, serde_json::to_string(&document(None)).unwrap()).unwrap();
        });

        let doc = wait_for_document(&path, Duration::from_secs(120)).await.unwrap();
        assert_eq!(doc.processor_id, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn absent_document_times_out_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = wait_for_document(&dir.path().join("none.json"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn garbage_document_fails_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.json");
        std::fs::write(&path, "{").unwrap();
        assert!(wait_for_document(&path, Duration::from_secs(60)).await.is_err());
    }
}
