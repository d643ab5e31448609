// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Docker Engine backend for [`ContainerRuntime`], over bollard.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StatsOptions,
    StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::BuildImageOptions;
use bollard::models::{
    ContainerInspectResponse, ContainerSummary, HostConfig, HostConfigLogConfig, RestartPolicy,
    RestartPolicyNameEnum,
};
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use solanagram_core::traits::{ContainerRuntime, ContainerSpec, ExecOutput, ListFilter, StatsSnapshot};
use solanagram_core::{SolanagramError, WorkerHandle, WorkerState};
use tracing::debug;

use crate::inject::directory_archive;

/// Container runtime backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using `DOCKER_HOST` or the platform's default socket.
    pub fn connect() -> Result<Self, SolanagramError> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            SolanagramError::RuntimeUnavailable {
                message: "cannot connect to the docker daemon".to_string(),
                source: Some(Box::new(e)),
            }
        })?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Classifies a bollard error; a 404 names the missing object.
fn map_err(name: &str, err: bollard::errors::Error) -> SolanagramError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => SolanagramError::NotFound {
            name: name.to_string(),
        },
        other => SolanagramError::RuntimeUnavailable {
            message: format!("docker call for {name} failed"),
            source: Some(Box::new(other)),
        },
    }
}

fn restart_policy_name(policy: &str) -> RestartPolicyNameEnum {
    match policy {
        "no" => RestartPolicyNameEnum::NO,
        "always" => RestartPolicyNameEnum::ALWAYS,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        _ => RestartPolicyNameEnum::UNLESS_STOPPED,
    }
}

fn host_config(spec: &ContainerSpec) -> HostConfig {
    HostConfig {
        memory: Some(spec.limits.memory_bytes),
        memory_swap: Some(spec.limits.memory_swap_bytes),
        nano_cpus: Some(spec.limits.nano_cpus),
        pids_limit: Some(spec.limits.pids_limit),
        security_opt: Some(spec.security_opt.clone()),
        log_config: Some(HostConfigLogConfig {
            typ: Some("json-file".to_string()),
            config: Some(HashMap::from([
                ("max-size".to_string(), spec.log_max_size.clone()),
                ("max-file".to_string(), spec.log_max_files.to_string()),
            ])),
        }),
        restart_policy: Some(RestartPolicy {
            name: Some(restart_policy_name(&spec.restart_policy)),
            maximum_retry_count: None,
        }),
        network_mode: spec.network.clone(),
        binds: (!spec.binds.is_empty()).then(|| spec.binds.clone()),
        ..Default::default()
    }
}

fn env_pairs(env: &[(String, String)]) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

fn handle_from_inspect(name: &str, info: ContainerInspectResponse) -> WorkerHandle {
    let state = info
        .state
        .and_then(|s| s.status)
        .map(|s| WorkerState::from_runtime_status(&s.to_string()))
        .unwrap_or(WorkerState::Error);
    let created_at = info
        .created
        .as_deref()
        .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
        .map(|c| c.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    WorkerHandle {
        id: info.id.unwrap_or_default(),
        name: info
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_else(|| name.to_string()),
        state,
        created_at,
        labels: info.config.and_then(|c| c.labels).unwrap_or_default(),
    }
}

fn handle_from_summary(summary: ContainerSummary) -> WorkerHandle {
    let name = summary
        .names
        .as_ref()
        .and_then(|n| n.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    WorkerHandle {
        id: summary.id.unwrap_or_default(),
        name,
        state: summary
            .state
            .as_deref()
            .map(WorkerState::from_runtime_status)
            .unwrap_or(WorkerState::Error),
        created_at: summary
            .created
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now),
        labels: summary.labels.unwrap_or_default(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn image_exists(&self, tag: &str) -> Result<bool, SolanagramError> {
        match self.docker.inspect_image(tag).await {
            Ok(_) => Ok(true),
            Err(e) => match map_err(tag, e) {
                SolanagramError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn build_image(&self, tag: &str, context: &Path) -> Result<(), SolanagramError> {
        let archive = directory_archive(context)?;
        let options = BuildImageOptions {
            t: tag.to_string(),
            dockerfile: "Dockerfile".to_string(),
            rm: true,
            ..Default::default()
        };
        let mut progress = self.docker.build_image(options, None, Some(archive.into()));
        while let Some(step) = progress.next().await {
            let info = step.map_err(|e| map_err(tag, e))?;
            if let Some(error) = info.error {
                return Err(SolanagramError::runtime(format!("build of {tag} failed: {error}")));
            }
            if let Some(line) = info.stream {
                let line = line.trim();
                if !line.is_empty() {
                    debug!(image = %tag, "{line}");
                }
            }
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String, SolanagramError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env_pairs(&spec.env)),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config(spec)),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| map_err(&spec.name, e))?;
        for warning in &created.warnings {
            debug!(worker = %spec.name, "{warning}");
        }
        Ok(created.id)
    }

    async fn start(&self, name: &str) -> Result<(), SolanagramError> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_err(name, e))
    }

    async fn stop(&self, name: &str, grace: Duration) -> Result<(), SolanagramError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker.stop_container(name, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_err(name, e)),
        }
    }

    async fn restart(&self, name: &str, grace: Duration) -> Result<(), SolanagramError> {
        let options = RestartContainerOptions {
            t: grace.as_secs() as isize,
        };
        self.docker
            .restart_container(name, Some(options))
            .await
            .map_err(|e| map_err(name, e))
    }

    async fn remove(&self, name: &str, force: bool) -> Result<(), SolanagramError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| map_err(name, e))
    }

    async fn inspect(&self, name: &str) -> Result<Option<WorkerHandle>, SolanagramError> {
        match self.docker.inspect_container(name, None).await {
            Ok(info) => Ok(Some(handle_from_inspect(name, info))),
            Err(e) => match map_err(name, e) {
                SolanagramError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn exec(&self, name: &str, cmd: Vec<String>) -> Result<ExecOutput, SolanagramError> {
        let options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(name, options)
            .await
            .map_err(|e| map_err(name, e))?;

        let mut output = String::new();
        if let StartExecResults::Attached { output: mut stream, .. } = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| map_err(name, e))?
        {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| map_err(name, e))?;
                output.push_str(&chunk.to_string());
            }
        }

        let inspected = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| map_err(name, e))?;
        Ok(ExecOutput {
            exit_code: inspected.exit_code.unwrap_or(-1),
            output,
        })
    }

    async fn put_archive(
        &self,
        name: &str,
        path: &str,
        tar: Vec<u8>,
    ) -> Result<(), SolanagramError> {
        // The destination directory must exist before the upload.
        let mkdir = self
            .exec(name, vec!["mkdir".to_string(), "-p".to_string(), path.to_string()])
            .await?;
        if !mkdir.success() {
            return Err(SolanagramError::runtime(format!(
                "cannot create {path} in {name}: {}",
                mkdir.output.trim()
            )));
        }
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(name, Some(options), tar.into())
            .await
            .map_err(|e| map_err(name, e))
    }

    async fn stats(&self, name: &str) -> Result<StatsSnapshot, SolanagramError> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker.stats(name, Some(options));
        let stats = match stream.next().await {
            Some(s) => s.map_err(|e| map_err(name, e))?,
            None => return Err(SolanagramError::runtime(format!("no stats for {name}"))),
        };
        Ok(StatsSnapshot {
            memory_usage: stats.memory_stats.usage.unwrap_or(0),
            memory_limit: stats.memory_stats.limit.unwrap_or(0),
            cpu_total: stats.cpu_stats.cpu_usage.total_usage,
            precpu_total: stats.precpu_stats.cpu_usage.total_usage,
            system_total: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
            presystem_total: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
        })
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<WorkerHandle>, SolanagramError> {
        let mut filters = HashMap::new();
        if !filter.labels.is_empty() {
            filters.insert(
                "label".to_string(),
                filter
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>(),
            );
        }
        if let Some(prefix) = &filter.name_prefix {
            filters.insert("name".to_string(), vec![prefix.clone()]);
        }
        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| map_err("containers", e))?;
        // The daemon's name filter is a substring match; re-apply the exact rules.
        Ok(summaries
            .into_iter()
            .map(handle_from_summary)
            .filter(|h| filter.matches(h))
            .collect())
    }

    async fn signal(&self, name: &str, signal: &str) -> Result<(), SolanagramError> {
        self.docker
            .kill_container(name, Some(KillContainerOptions { signal }))
            .await
            .map_err(|e| map_err(name, e))
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SolanagramError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.logs(name, Some(options));
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_err(name, e))?;
            text.push_str(&chunk.to_string());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solanagram_core::ResourceLimits;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            name: "solanagram-fwd-7-alpha".to_string(),
            image: "solanagram-forwarder:latest".to_string(),
            env: vec![("SG_KIND".to_string(), "forwarder".to_string())],
            labels: HashMap::new(),
            network: Some("solanagram".to_string()),
            binds: Vec::new(),
            limits: ResourceLimits {
                memory_bytes: 256 * 1024 * 1024,
                memory_swap_bytes: 512 * 1024 * 1024,
                nano_cpus: 500_000_000,
                pids_limit: 100,
            },
            security_opt: vec!["no-new-privileges:true".to_string()],
            log_max_size: "10m".to_string(),
            log_max_files: 3,
            restart_policy: "unless-stopped".to_string(),
        }
    }

    #[test]
    fn host_config_carries_limits_and_log_rotation() {
        let hc = host_config(&spec());
        assert_eq!(hc.memory, Some(256 * 1024 * 1024));
        assert_eq!(hc.memory_swap, Some(512 * 1024 * 1024));
        assert_eq!(hc.nano_cpus, Some(500_000_000));
        assert_eq!(hc.pids_limit, Some(100));
        assert_eq!(hc.network_mode.as_deref(), Some("solanagram"));
        assert!(hc.binds.is_none());
        let log = hc.log_config.unwrap();
        assert_eq!(log.typ.as_deref(), Some("json-file"));
        assert_eq!(log.config.unwrap().get("max-file").map(String::as_str), Some("3"));
        assert_eq!(
            hc.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED)
        );
    }

    #[test]
    fn env_is_rendered_as_key_value() {
        assert_eq!(env_pairs(&spec().env), vec!["SG_KIND=forwarder".to_string()]);
    }

    #[test]
    fn not_found_is_classified() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        };
        assert!(map_err("ghost", err).is_not_found());

        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(!map_err("ghost", err).is_not_found());
    }

    #[test]
    fn summary_strips_leading_slash_and_maps_state() {
        let summary = ContainerSummary {
            id: Some("abc".to_string()),
            names: Some(vec!["/solanagram-log-1-x".to_string()]),
            state: Some("exited".to_string()),
            created: Some(1_700_000_000),
            ..Default::default()
        };
        let handle = handle_from_summary(summary);
        assert_eq!(handle.name, "solanagram-log-1-x");
        assert_eq!(handle.state, WorkerState::Stopped);
        assert_eq!(handle.created_at.timestamp(), 1_700_000_000);
    }
}
