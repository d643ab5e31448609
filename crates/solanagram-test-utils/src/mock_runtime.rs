// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock container runtime for deterministic fleet tests.
//!
//! `MockRuntime` keeps containers in memory, emulates the handful of shell
//! commands the fleet manager runs inside a worker (`mkdir -p`, a base64
//! write, `cat`), unpacks archives into a per-container file map and lets
//! tests fail the next call of any operation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use solanagram_core::traits::{ContainerRuntime, ContainerSpec, ExecOutput, ListFilter, StatsSnapshot};
use solanagram_core::{SolanagramError, WorkerHandle, WorkerState};

/// One simulated container.
#[derive(Debug, Clone)]
pub struct MockContainer {
    pub spec: ContainerSpec,
    pub handle: WorkerHandle,
    /// In-container files by absolute path.
    pub files: HashMap<String, Vec<u8>>,
    pub stats: StatsSnapshot,
    pub signals: Vec<String>,
    pub restarts: u32,
    pub logs: String,
}

#[derive(Default)]
struct MockState {
    containers: BTreeMap<String, MockContainer>,
    images: HashSet<String>,
    unbuildable: HashSet<String>,
    built: Vec<String>,
    fail_next: HashMap<String, u32>,
    calls: Vec<String>,
    next_id: u64,
}

/// In-memory container runtime.
#[derive(Clone, Default)]
pub struct MockRuntime {
    state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime where the given image tags already exist.
    pub async fn with_images(images: &[&str]) -> Self {
        let runtime = Self::new();
        for image in images {
            runtime.add_image(image).await;
        }
        runtime
    }

    pub async fn add_image(&self, tag: &str) {
        self.state.lock().await.images.insert(tag.to_string());
    }

    /// Make builds of `tag` fail.
    pub async fn make_unbuildable(&self, tag: &str) {
        self.state.lock().await.unbuildable.insert(tag.to_string());
    }

    /// Fail the next call of `op` (e.g. `"exec"`, `"restart"`) with `RuntimeUnavailable`.
    pub async fn fail_next(&self, op: &str) {
        *self
            .state
            .lock()
            .await
            .fail_next
            .entry(op.to_string())
            .or_default() += 1;
    }

    /// Seed a container directly, bypassing create/start.
    pub async fn insert_container(
        &self,
        name: &str,
        state: WorkerState,
        created_at: DateTime<Utc>,
        labels: HashMap<String, String>,
    ) {
        let mut guard = self.state.lock().await;
        guard.next_id += 1;
        let id = format!("mock-{:04}", guard.next_id);
        let spec = ContainerSpec {
            name: name.to_string(),
            image: "seeded:latest".to_string(),
            env: Vec::new(),
            labels: labels.clone(),
            network: None,
            binds: Vec::new(),
            limits: solanagram_core::ResourceLimits {
                memory_bytes: 0,
                memory_swap_bytes: 0,
                nano_cpus: 0,
                pids_limit: 0,
            },
            security_opt: Vec::new(),
            log_max_size: "10m".to_string(),
            log_max_files: 3,
            restart_policy: "unless-stopped".to_string(),
        };
        guard.containers.insert(
            name.to_string(),
            MockContainer {
                spec,
                handle: WorkerHandle {
                    id,
                    name: name.to_string(),
                    state,
                    created_at,
                    labels,
                },
                files: HashMap::new(),
                stats: StatsSnapshot::default(),
                signals: Vec::new(),
                restarts: 0,
                logs: String::new(),
            },
        );
    }

    pub async fn container(&self, name: &str) -> Option<MockContainer> {
        self.state.lock().await.containers.get(name).cloned()
    }

    pub async fn container_names(&self) -> Vec<String> {
        self.state.lock().await.containers.keys().cloned().collect()
    }

    /// Contents of an in-container file as UTF-8.
    pub async fn file(&self, name: &str, path: &str) -> Option<String> {
        let guard = self.state.lock().await;
        let bytes = guard.containers.get(name)?.files.get(path)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    pub async fn write_file(&self, name: &str, path: &str, content: &str) {
        if let Some(c) = self.state.lock().await.containers.get_mut(name) {
            c.files.insert(path.to_string(), content.as_bytes().to_vec());
        }
    }

    pub async fn set_stats(&self, name: &str, stats: StatsSnapshot) {
        if let Some(c) = self.state.lock().await.containers.get_mut(name) {
            c.stats = stats;
        }
    }

    pub async fn set_logs(&self, name: &str, logs: &str) {
        if let Some(c) = self.state.lock().await.containers.get_mut(name) {
            c.logs = logs.to_string();
        }
    }

    /// Every call made so far, as `op:name`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn built_images(&self) -> Vec<String> {
        self.state.lock().await.built.clone()
    }

    /// Record the call and consume a pending injected failure for `op`.
    fn enter(state: &mut MockState, op: &str, target: &str) -> Result<(), SolanagramError> {
        state.calls.push(format!("{op}:{target}"));
        if let Some(n) = state.fail_next.get_mut(op)
            && *n > 0
        {
            *n -= 1;
            return Err(SolanagramError::runtime(format!("injected {op} failure")));
        }
        Ok(())
    }

    fn container_mut<'a>(
        state: &'a mut MockState,
        name: &str,
    ) -> Result<&'a mut MockContainer, SolanagramError> {
        state
            .containers
            .get_mut(name)
            .ok_or_else(|| SolanagramError::NotFound {
                name: name.to_string(),
            })
    }
}

fn unquote(token: &str) -> &str {
    token.trim_matches('\'').trim_matches('"')
}

/// Runs the subset of shell the fleet manager issues inside a worker.
fn run_shell(container: &mut MockContainer, script: &str) -> ExecOutput {
    let mut output = String::new();
    for part in script.split(" && ") {
        let tokens: Vec<&str> = part.split_whitespace().map(unquote).collect();
        match tokens.as_slice() {
            ["mkdir", "-p", _] => {}
            ["echo", payload, "|", "base64", "-d", ">", path] => match STANDARD.decode(payload) {
                Ok(bytes) => {
                    container.files.insert((*path).to_string(), bytes);
                }
                Err(_) => {
                    return ExecOutput {
                        exit_code: 1,
                        output: "base64: invalid input".to_string(),
                    };
                }
            },
            ["cat", path] => match container.files.get(*path) {
                Some(bytes) => output.push_str(&String::from_utf8_lossy(bytes)),
                None => {
                    return ExecOutput {
                        exit_code: 1,
                        output: format!("cat: {path}: No such file or directory"),
                    };
                }
            },
            _ => {
                return ExecOutput {
                    exit_code: 127,
                    output: format!("sh: unsupported command: {part}"),
                };
            }
        }
    }
    ExecOutput {
        exit_code: 0,
        output,
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn image_exists(&self, tag: &str) -> Result<bool, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "image_exists", tag)?;
        Ok(state.images.contains(tag))
    }

    async fn build_image(&self, tag: &str, _context: &Path) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "build_image", tag)?;
        if state.unbuildable.contains(tag) {
            return Err(SolanagramError::runtime(format!("build of {tag} failed")));
        }
        state.images.insert(tag.to_string());
        state.built.push(tag.to_string());
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "create", &spec.name)?;
        if state.containers.contains_key(&spec.name) {
            return Err(SolanagramError::runtime(format!(
                "conflict: container name {} is already in use",
                spec.name
            )));
        }
        if !state.images.contains(&spec.image) {
            return Err(SolanagramError::NotFound {
                name: spec.image.clone(),
            });
        }
        state.next_id += 1;
        let id = format!("mock-{:04}", state.next_id);
        state.containers.insert(
            spec.name.clone(),
            MockContainer {
                spec: spec.clone(),
                handle: WorkerHandle {
                    id: id.clone(),
                    name: spec.name.clone(),
                    state: WorkerState::Created,
                    created_at: Utc::now(),
                    labels: spec.labels.clone(),
                },
                files: HashMap::new(),
                stats: StatsSnapshot::default(),
                signals: Vec::new(),
                restarts: 0,
                logs: String::new(),
            },
        );
        Ok(id)
    }

    async fn start(&self, name: &str) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "start", name)?;
        Self::container_mut(&mut state, name)?.handle.state = WorkerState::Running;
        Ok(())
    }

    async fn stop(&self, name: &str, _grace: Duration) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "stop", name)?;
        Self::container_mut(&mut state, name)?.handle.state = WorkerState::Stopped;
        Ok(())
    }

    async fn restart(&self, name: &str, _grace: Duration) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "restart", name)?;
        let container = Self::container_mut(&mut state, name)?;
        container.handle.state = WorkerState::Running;
        container.restarts += 1;
        Ok(())
    }

    async fn remove(&self, name: &str, force: bool) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "remove", name)?;
        let container = Self::container_mut(&mut state, name)?;
        if container.handle.state == WorkerState::Running && !force {
            return Err(SolanagramError::runtime(format!(
                "cannot remove running container {name}"
            )));
        }
        state.containers.remove(name);
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<Option<WorkerHandle>, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "inspect", name)?;
        Ok(state.containers.get(name).map(|c| c.handle.clone()))
    }

    async fn exec(&self, name: &str, cmd: Vec<String>) -> Result<ExecOutput, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "exec", name)?;
        let container = Self::container_mut(&mut state, name)?;
        if container.handle.state != WorkerState::Running {
            return Err(SolanagramError::runtime(format!(
                "container {name} is not running"
            )));
        }
        let argv: Vec<&str> = cmd.iter().map(String::as_str).collect();
        Ok(match argv.as_slice() {
            ["sh", "-c", script] => run_shell(container, script),
            ["cat", path] => run_shell(container, &format!("cat {path}")),
            _ => ExecOutput::default(),
        })
    }

    async fn put_archive(
        &self,
        name: &str,
        path: &str,
        tar_bytes: Vec<u8>,
    ) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "put_archive", name)?;
        let container = Self::container_mut(&mut state, name)?;
        let mut archive = tar::Archive::new(tar_bytes.as_slice());
        let entries = archive
            .entries()
            .map_err(|e| SolanagramError::runtime(format!("bad archive: {e}")))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| SolanagramError::runtime(format!("bad archive: {e}")))?;
            let entry_path = entry
                .path()
                .map_err(|e| SolanagramError::runtime(format!("bad archive: {e}")))?
                .display()
                .to_string();
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| SolanagramError::runtime(format!("bad archive: {e}")))?;
            let full = format!("{}/{}", path.trim_end_matches('/'), entry_path);
            container.files.insert(full, content);
        }
        Ok(())
    }

    async fn stats(&self, name: &str) -> Result<StatsSnapshot, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "stats", name)?;
        Ok(Self::container_mut(&mut state, name)?.stats)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<WorkerHandle>, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "list", "*")?;
        Ok(state
            .containers
            .values()
            .filter(|c| filter.matches(&c.handle))
            .map(|c| c.handle.clone())
            .collect())
    }

    async fn signal(&self, name: &str, signal: &str) -> Result<(), SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "signal", name)?;
        let container = Self::container_mut(&mut state, name)?;
        if container.handle.state != WorkerState::Running {
            return Err(SolanagramError::runtime(format!(
                "container {name} is not running"
            )));
        }
        container.signals.push(signal.to_string());
        Ok(())
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SolanagramError> {
        let mut state = self.state.lock().await;
        Self::enter(&mut state, "logs", name)?;
        let logs = &Self::container_mut(&mut state, name)?.logs;
        let lines: Vec<&str> = logs.lines().collect();
        let start = lines.len().saturating_sub(tail);
        Ok(lines[start..].join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solanagram_core::ResourceLimits;

    fn spec(name: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "img:latest".to_string(),
            env: vec![("SG_KIND".to_string(), "forwarder".to_string())],
            labels: HashMap::new(),
            network: None,
            binds: Vec::new(),
            limits: ResourceLimits {
                memory_bytes: 1,
                memory_swap_bytes: 2,
                nano_cpus: 3,
                pids_limit: 4,
            },
            security_opt: Vec::new(),
            log_max_size: "10m".to_string(),
            log_max_files: 3,
            restart_policy: "unless-stopped".to_string(),
        }
    }

    #[tokio::test]
    async fn lifecycle_and_shell_emulation() {
        let runtime = MockRuntime::with_images(&["img:latest"]).await;
        runtime.create(&spec("w1")).await.unwrap();
        runtime.start("w1").await.unwrap();

        let payload = STANDARD.encode(b"{\"a\":1}");
        let script = format!("mkdir -p '/app/config' && echo '{payload}' | base64 -d > '/app/config/w.json'");
        let out = runtime
            .exec("w1", vec!["sh".into(), "-c".into(), script])
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(runtime.file("w1", "/app/config/w.json").await.unwrap(), "{\"a\":1}");

        let cat = runtime
            .exec("w1", vec!["cat".into(), "/app/config/w.json".into()])
            .await
            .unwrap();
        assert_eq!(cat.output, "{\"a\":1}");

        let missing = runtime
            .exec("w1", vec!["cat".into(), "/nope".into()])
            .await
            .unwrap();
        assert_eq!(missing.exit_code, 1);
    }

    #[tokio::test]
    async fn injected_failure_hits_only_the_next_call() {
        let runtime = MockRuntime::with_images(&["img:latest"]).await;
        runtime.fail_next("create").await;
        assert!(runtime.create(&spec("w1")).await.is_err());
        assert!(runtime.create(&spec("w1")).await.is_ok());
    }

    #[tokio::test]
    async fn missing_container_is_not_found() {
        let runtime = MockRuntime::new();
        assert!(runtime.start("ghost").await.unwrap_err().is_not_found());
        assert!(runtime.inspect("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn archive_is_unpacked_under_path() {
        let runtime = MockRuntime::with_images(&["img:latest"]).await;
        runtime.create(&spec("w1")).await.unwrap();

        let mut builder = tar::Builder::new(Vec::new());
        let data = b"session-bytes";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o600);
        header.set_cksum();
        builder
            .append_data(&mut header, "user.session", &data[..])
            .unwrap();
        let bytes = builder.into_inner().unwrap();

        runtime.put_archive("w1", "/app/sessions", bytes).await.unwrap();
        assert_eq!(
            runtime.file("w1", "/app/sessions/user.session").await.unwrap(),
            "session-bytes"
        );
    }
}
