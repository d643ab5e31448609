// SPDX-FileCopyrightText: 2026 Solanagram Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference fleet scenarios, run against the default configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use solanagram_config::SolanagramConfig;
use solanagram_core::{
    Credentials, ForwardTarget, LimitRequest, SessionSource, SourceChannel, TargetType,
    WorkerKind, WorkerSpec, WorkerState,
};
use solanagram_fleet::{FleetManager, labels};
use solanagram_test_utils::MockRuntime;

fn forwarder_manager(runtime: &MockRuntime) -> FleetManager {
    FleetManager::from_config(
        Arc::new(runtime.clone()),
        WorkerKind::Forwarder,
        &SolanagramConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn forwarder_to_bob_with_default_limits() {
    let runtime = MockRuntime::with_images(&["solanagram-forwarder:latest"]).await;
    let fleet = forwarder_manager(&runtime);
    let spec = WorkerSpec {
        kind: WorkerKind::Forwarder,
        user_id: 7,
        disambiguator: None,
        source: SourceChannel {
            id: -1001234,
            title: "Alpha Group".into(),
            chat_type: "supergroup".into(),
        },
        target: Some(ForwardTarget {
            target_type: TargetType::User,
            id: "@bob".into(),
            name: "bob".into(),
        }),
        processor_id: None,
        credentials: Credentials {
            phone: "+15550007".into(),
            api_id: 7,
            api_hash: "hash".into(),
        },
        session: SessionSource::String("session".into()),
    };

    let outcome = fleet.create(&spec, &LimitRequest::default()).await;
    assert!(outcome.ok, "{}", outcome.message);
    assert_eq!(outcome.name, "solanagram-fwd-7-alpha_group-to-bob");

    let container = runtime.container(&outcome.name).await.unwrap();
    assert_eq!(container.spec.limits.memory_bytes, 256 * 1024 * 1024);
    assert_eq!(container.spec.limits.cpu_fraction(), 0.5);

    let status = fleet.status(&outcome.name).await;
    assert_eq!(status.state, WorkerState::Running);
    assert!(status.running);
}

#[tokio::test]
async fn cleanup_removes_only_the_old_stopped_worker() {
    let runtime = MockRuntime::new();
    let forwarder_labels = HashMap::from([
        (labels::MANAGED.to_string(), "true".to_string()),
        (labels::KIND.to_string(), WorkerKind::Forwarder.to_string()),
    ]);
    runtime
        .insert_container(
            "solanagram-fwd-1-old",
            WorkerState::Stopped,
            Utc::now() - chrono::Duration::hours(30),
            forwarder_labels.clone(),
        )
        .await;
    runtime
        .insert_container(
            "solanagram-fwd-1-new",
            WorkerState::Running,
            Utc::now() - chrono::Duration::hours(1),
            forwarder_labels,
        )
        .await;

    let report = forwarder_manager(&runtime)
        .cleanup_orphans(Duration::from_secs(24 * 3600))
        .await;

    assert_eq!(report.removed, vec!["solanagram-fwd-1-old".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(
        runtime.container_names().await,
        vec!["solanagram-fwd-1-new".to_string()]
    );
}
