// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Control-plane-to-worker configuration channel.
//!
//! Small JSON documents go in through the exec channel as a base64 payload
//! decoded by the worker's shell; session files go in as a tar archive.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use solanagram_core::SolanagramError;

/// Shell command that writes `bytes` to `path` inside the worker.
pub fn write_file_command(path: &str, bytes: &[u8]) -> Vec<String> {
    let dir = Path::new(path)
        .parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "/".to_string());
    let payload = STANDARD.encode(bytes);
    vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("mkdir -p '{dir}' && echo '{payload}' | base64 -d > '{path}'"),
    ]
}

pub fn read_file_command(path: &str) -> Vec<String> {
    vec!["cat".to_string(), path.to_string()]
}

/// Tar archive holding one file, owner-readable only.
pub fn single_file_archive(file_name: &str, bytes: &[u8]) -> Result<Vec<u8>, SolanagramError> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o600);
    header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);
    header.set_cksum();
    builder
        .append_data(&mut header, file_name, bytes)
        .map_err(|e| SolanagramError::Internal(format!("failed to archive {file_name}: {e}")))?;
    builder
        .into_inner()
        .map_err(|e| SolanagramError::Internal(format!("failed to finish archive: {e}")))
}

/// Tar archive of a whole directory, used as an image build context.
pub fn directory_archive(dir: &Path) -> Result<Vec<u8>, SolanagramError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(".", dir).map_err(|e| {
        SolanagramError::Config(format!("cannot read build context {}: {e}", dir.display()))
    })?;
    builder
        .into_inner()
        .map_err(|e| SolanagramError::Internal(format!("failed to finish archive: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn write_command_embeds_decodable_payload() {
        let cmd = write_file_command("/app/config/worker.json", br#"{"k":"it's"}"#);
        assert_eq!(cmd[0], "sh");
        let script = &cmd[2];
        assert!(script.starts_with("mkdir -p '/app/config' && echo '"));
        let payload = script
            .split('\'')
            .nth(3)
            .unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), br#"{"k":"it's"}"#);
    }

    #[test]
    fn single_file_archive_round_trips() {
        let bytes = single_file_archive("u.session", b"abc").unwrap();
        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some("u.session"));
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "abc");
    }

    #[test]
    fn directory_archive_includes_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        let bytes = directory_archive(dir.path()).unwrap();
        let mut archive = tar::Archive::new(bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert!(names.iter().any(|n| n.ends_with("Dockerfile")));
    }

    #[test]
    fn missing_build_context_is_a_config_error() {
        let err = directory_archive(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, SolanagramError::Config(_)));
    }
}
