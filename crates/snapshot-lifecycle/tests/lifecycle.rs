/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! End-to-end scenarios across the three units, each run from a fresh
//! `SnapshotLifecycle` so nothing is shared except the mock cluster and the
//! state directory.

use async_trait::async_trait;
use serde_json::json;
use snapshot_lifecycle::{
    config, FilePollerConfigStore, FileTriggerControl, HttpSnapshotApi, LifecycleError,
    MetricDatum, MetricSink, NotificationOutcome, PollStatus, RepositoryEnsurer,
    RepositoryStatus, RuleState, SnapshotLifecycle, SnapshotState, StorageLocation,
};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, path_regex, query_param},
    Mock, MockServer, ResponseTemplate,
};

#[derive(Debug, Default)]
struct RecordingSink {
    data: Mutex<Vec<MetricDatum>>,
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn put_metric(&self, datum: &MetricDatum) -> snapshot_lifecycle::Result<()> {
        self.data.lock().unwrap().push(datum.clone());
        Ok(())
    }
}

fn lifecycle(state_dir: &Path, sink: Arc<RecordingSink>) -> SnapshotLifecycle {
    SnapshotLifecycle::new(
        Arc::new(FileTriggerControl::new(state_dir)),
        Arc::new(FilePollerConfigStore::new(state_dir)),
        sink,
    )
}

fn environment(server: &MockServer) -> HashMap<String, String> {
    let address = server.address();
    [
        (config::CLUSTER_HOST, address.ip().to_string()),
        (config::CLUSTER_PORT, address.port().to_string()),
        (config::PROTOCOL, "http".to_string()),
        (config::REPOSITORY, "logs-repo".to_string()),
        (config::BUCKET, "b1".to_string()),
        (config::REGION, "us-east-1".to_string()),
        (config::METRIC_NAME, "BackupCompleted".to_string()),
        (config::METRIC_NAMESPACE, "Search/Backups".to_string()),
        (config::RULE_NAME, "restore-poll".to_string()),
        (config::POLLER_FUNCTION, "restore-poller".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

async fn mount_existing_repository(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs-repo": {"type": "s3", "settings": {"bucket": "b1", "region": "us-east-1"}}
        })))
        .mount(server)
        .await;
}

async fn mount_restore(server: &MockServer, snapshot: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/_snapshot/logs-repo/{snapshot}/_restore")))
        .and(query_param("wait_for_completion", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn scenario_a_absent_repository_is_registered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"type": "repository_missing_exception"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;

    let env = environment(&server);
    let api = HttpSnapshotApi::new(&config::ClusterSettings::from_source(&env).unwrap()).unwrap();
    let status = RepositoryEnsurer::new(&api)
        .ensure("logs-repo", &StorageLocation::new("b1", "us-east-1"))
        .await
        .unwrap();
    assert_eq!(status, RepositoryStatus::Registered);
}

#[tokio::test]
async fn ensuring_twice_registers_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_existing_repository(&server).await;
    Mock::given(method("PUT"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let env = environment(&server);
    let api = HttpSnapshotApi::new(&config::ClusterSettings::from_source(&env).unwrap()).unwrap();
    let ensurer = RepositoryEnsurer::new(&api);
    let location = StorageLocation::new("b1", "us-east-1");

    assert_eq!(
        ensurer.ensure("logs-repo", &location).await.unwrap(),
        RepositoryStatus::Registered
    );
    assert_eq!(
        ensurer.ensure("logs-repo", &location).await.unwrap(),
        RepositoryStatus::AlreadyRegistered
    );
}

#[tokio::test]
async fn scenario_b_backup_with_existing_repository() {
    let server = MockServer::start().await;
    mount_existing_repository(&server).await;
    Mock::given(method("PUT"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/_snapshot/logs-repo/snapshot_[0-9a-f-]{36}$"))
        .and(query_param("wait_for_completion", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"accepted":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let started = lifecycle(dir.path(), Arc::default())
        .backup(&environment(&server))
        .await
        .unwrap();
    assert_eq!(started.to_string(), r#"Backup was successful: {"accepted":true}"#);
}

#[tokio::test]
async fn scenario_c_only_index_files_emit_metrics() {
    let server = MockServer::start().await;
    let env = environment(&server);
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let lifecycle = lifecycle(dir.path(), sink.clone());

    let outcome = lifecycle.notify(&env, "index-5").await.unwrap();
    assert_eq!(outcome, NotificationOutcome::BackupCompleted);
    {
        let data = sink.data.lock().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].value, 1.0);
        assert_eq!(data[0].name, "BackupCompleted");
        assert_eq!(data[0].namespace, "Search/Backups");
    }

    let outcome = lifecycle.notify(&env, "data-5").await.unwrap();
    assert!(outcome.to_string().contains("ignoring in favor of one prefixed with 'index-'"));
    assert_eq!(sink.data.lock().unwrap().len(), 1);

    // The observer never talks to the cluster
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn scenario_d_restore_then_poll_until_terminal() {
    let server = MockServer::start().await;
    mount_existing_repository(&server).await;
    mount_restore(&server, "snapshot_1").await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo/snapshot_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"snapshots": [{"state": "IN_PROGRESS"}]})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo/snapshot_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"snapshots": [{"state": "SUCCESS"}]})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let env = environment(&server);

    let outcome = lifecycle(dir.path(), Arc::default())
        .restore(&env, "snapshot_1")
        .await
        .unwrap();
    assert_eq!(outcome.to_string(), "Restore operation started");
    assert!(outcome.is_clean());

    // The poller only knows its own identity; everything else was pushed.
    let poller_env = HashMap::from([(
        config::POLLER_FUNCTION.to_string(),
        "restore-poller".to_string(),
    )]);

    let first = lifecycle(dir.path(), Arc::default()).poll(&poller_env).await.unwrap();
    assert_eq!(first.verdict, PollStatus::InProgress);
    assert_eq!(first.to_string(), "Restore operation still in progress");
    let rule = lifecycle(dir.path(), Arc::default())
        .rule("restore-poll")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rule.rule.state, RuleState::Enabled);

    let second = lifecycle(dir.path(), Arc::default()).poll(&poller_env).await.unwrap();
    assert_eq!(
        second.verdict,
        PollStatus::Completed {
            state: SnapshotState::Success
        }
    );
    assert_eq!(second.to_string(), "Restore operation completed with status: SUCCESS");
    let rule = lifecycle(dir.path(), Arc::default())
        .rule("restore-poll")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rule.rule.state, RuleState::Disabled);
    assert_eq!(rule.rule.schedule_expression, "rate(5 minutes)");
}

#[tokio::test]
async fn second_restore_takes_over_tracking() {
    let server = MockServer::start().await;
    mount_existing_repository(&server).await;
    mount_restore(&server, "snapshot_1").await;
    mount_restore(&server, "snapshot_2").await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo/snapshot_2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"snapshots": [{"state": "PARTIAL"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo/snapshot_1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let env = environment(&server);

    for snapshot in ["snapshot_1", "snapshot_2"] {
        let outcome = lifecycle(dir.path(), Arc::default())
            .restore(&env, snapshot)
            .await
            .unwrap();
        assert!(outcome.verdict.is_started());
    }

    let outcome = lifecycle(dir.path(), Arc::default()).poll(&env).await.unwrap();
    assert_eq!(
        outcome.verdict,
        PollStatus::Completed {
            state: SnapshotState::Partial
        }
    );
}

#[tokio::test]
async fn failed_poll_query_keeps_rule_armed() {
    let server = MockServer::start().await;
    mount_existing_repository(&server).await;
    mount_restore(&server, "snapshot_1").await;
    Mock::given(method("GET"))
        .and(path("/_snapshot/logs-repo/snapshot_1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("shard failure"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let env = environment(&server);
    lifecycle(dir.path(), Arc::default())
        .restore(&env, "snapshot_1")
        .await
        .unwrap();

    let err = lifecycle(dir.path(), Arc::default())
        .poll(&env)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Cluster { status: 500, .. }));

    let rule = lifecycle(dir.path(), Arc::default())
        .rule("restore-poll")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rule.rule.state, RuleState::Enabled);
}

#[tokio::test]
async fn restore_aborts_when_repository_cannot_be_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_snapshot/logs-repo"))
        .respond_with(ResponseTemplate::new(403).set_body_string("access denied"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let lifecycle = lifecycle(dir.path(), Arc::default());
    let err = lifecycle
        .restore(&environment(&server), "snapshot_1")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to create repository: access denied");
    assert!(lifecycle.rule("restore-poll").await.unwrap().is_none());
}
