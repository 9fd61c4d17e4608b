/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Restore trigger
//!
//! Starts an asynchronous restore of a caller-chosen snapshot and, once the
//! cluster accepted it, hands tracking over to the restore-status poller by
//! pushing its configuration and enabling its rule. Tracking setup is best
//! effort: the restore is already running on the cluster and is never rolled
//! back if the handoff fails.

use crate::{
    cluster::SnapshotApi,
    config::RestoreSettings,
    error::{LifecycleError, Result},
    outcome::Outcome,
    repository::RepositoryEnsurer,
    scheduler::{RuleState, ScheduleRule, TriggerControl},
    tracking::PollerConfigStore,
};
use serde::Deserialize;
use std::fmt;
use tracing::{error, info, warn};

/// Invocation payload of the restore trigger
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RestoreRequest {
    #[serde(rename = "snapshotId")]
    pub snapshot_id: String,
}

impl RestoreRequest {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LifecycleError::serialization(format!("Invalid restore request: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreVerdict {
    /// The cluster accepted the restore
    Started { snapshot_id: String },
    /// The cluster refused the restore; reported, not raised
    Rejected { status: u16, body: String },
}

impl RestoreVerdict {
    pub fn is_started(&self) -> bool {
        matches!(self, RestoreVerdict::Started { .. })
    }
}

impl fmt::Display for RestoreVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreVerdict::Started { .. } => f.write_str("Restore operation started"),
            RestoreVerdict::Rejected { body, .. } => {
                write!(f, "Failed to restore snapshot: {body}")
            }
        }
    }
}

/// Starts restores and arms the status poller
#[derive(Debug)]
pub struct RestoreInitiator<'a> {
    api: &'a dyn SnapshotApi,
    triggers: &'a dyn TriggerControl,
    store: &'a dyn PollerConfigStore,
    settings: &'a RestoreSettings,
}

impl<'a> RestoreInitiator<'a> {
    pub fn new(
        api: &'a dyn SnapshotApi,
        triggers: &'a dyn TriggerControl,
        store: &'a dyn PollerConfigStore,
        settings: &'a RestoreSettings,
    ) -> Self {
        Self {
            api,
            triggers,
            store,
            settings,
        }
    }

    /// Run one restore invocation for `snapshot_id`
    pub async fn run(&self, snapshot_id: &str) -> Result<Outcome<RestoreVerdict>> {
        if snapshot_id.is_empty() {
            return Err(LifecycleError::config("snapshotId must not be empty"));
        }

        info!(
            "Restoring snapshot '{}' to {} using protocol {}",
            snapshot_id, self.settings.cluster.host, self.settings.cluster.protocol
        );

        RepositoryEnsurer::new(self.api)
            .ensure(&self.settings.repository, &self.settings.location)
            .await?;

        let response = self
            .api
            .restore_snapshot(&self.settings.repository, snapshot_id)
            .await?;

        if !response.is_ok() {
            warn!(
                "Restore of '{}' rejected with status {}: {}",
                snapshot_id, response.status, response.body
            );
            return Ok(Outcome::new(RestoreVerdict::Rejected {
                status: response.status,
                body: response.body,
            }));
        }

        let mut outcome = Outcome::new(RestoreVerdict::Started {
            snapshot_id: snapshot_id.to_string(),
        });

        let poller = self.settings.poller_settings(snapshot_id);
        if let Err(err) = self
            .store
            .push(&self.settings.poller_function, &poller.to_values())
            .await
        {
            error!(
                "An error occurred when updating the configuration of {}: {}",
                self.settings.poller_function, err
            );
            outcome.warn("push_poller_config", err);
        }

        let rule = ScheduleRule::poller(&self.settings.rule_name, RuleState::Enabled);
        if let Err(err) = self.triggers.put_rule(&rule).await {
            error!(
                "An error occurred when enabling rule {}: {}",
                self.settings.rule_name, err
            );
            outcome.warn("arm_poller", err);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cluster::ClusterResponse,
        config::{ClusterSettings, StorageLocation, SNAPSHOT_ID},
        scheduler::RuleRecord,
    };
    use async_trait::async_trait;
    use std::{collections::BTreeMap, sync::Mutex};

    #[derive(Debug, Default)]
    struct FakeCluster {
        repository_exists: bool,
        restore_status: u16,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SnapshotApi for FakeCluster {
        async fn get_repository(&self, repository: &str) -> Result<ClusterResponse> {
            self.calls.lock().unwrap().push(format!("GET {repository}"));
            Ok(ClusterResponse::new(
                if self.repository_exists { 200 } else { 404 },
                "{}",
            ))
        }

        async fn put_repository(&self, repository: &str, _: &StorageLocation) -> Result<ClusterResponse> {
            self.calls.lock().unwrap().push(format!("PUT {repository}"));
            Ok(ClusterResponse::new(200, r#"{"acknowledged":true}"#))
        }

        async fn create_snapshot(&self, _: &str, _: &str) -> Result<ClusterResponse> {
            unreachable!("restore never creates snapshots")
        }

        async fn snapshot_status(&self, _: &str, _: &str) -> Result<ClusterResponse> {
            unreachable!("restore never polls")
        }

        async fn restore_snapshot(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("RESTORE {repository}/{snapshot}"));
            Ok(ClusterResponse::new(self.restore_status, r#"{"accepted":true}"#))
        }
    }

    #[derive(Debug, Default)]
    struct FakeTriggers {
        rules: Mutex<Vec<ScheduleRule>>,
        fail: bool,
    }

    #[async_trait]
    impl TriggerControl for FakeTriggers {
        async fn put_rule(&self, rule: &ScheduleRule) -> Result<()> {
            if self.fail {
                return Err(LifecycleError::transport("scheduler unavailable"));
            }
            self.rules.lock().unwrap().push(rule.clone());
            Ok(())
        }

        async fn rule(&self, _: &str) -> Result<Option<RuleRecord>> {
            Ok(None)
        }
    }

    #[derive(Debug, Default)]
    struct FakeStore {
        pushed: Mutex<Vec<(String, BTreeMap<String, String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl PollerConfigStore for FakeStore {
        async fn push(&self, function: &str, values: &BTreeMap<String, String>) -> Result<()> {
            if self.fail {
                return Err(LifecycleError::transport("function not found"));
            }
            self.pushed
                .lock()
                .unwrap()
                .push((function.to_string(), values.clone()));
            Ok(())
        }

        async fn load(&self, _: &str) -> Result<BTreeMap<String, String>> {
            unreachable!()
        }
    }

    fn settings() -> RestoreSettings {
        RestoreSettings {
            cluster: ClusterSettings::default(),
            repository: "logs-repo".to_string(),
            location: StorageLocation::new("b1", "us-east-1"),
            rule_name: "restore-poll".to_string(),
            poller_function: "restore-poller".to_string(),
        }
    }

    #[tokio::test]
    async fn test_started_restore_arms_poller() {
        for repository_exists in [true, false] {
            let cluster = FakeCluster {
                repository_exists,
                restore_status: 200,
                ..Default::default()
            };
            let triggers = FakeTriggers::default();
            let store = FakeStore::default();
            let settings = settings();

            let outcome = RestoreInitiator::new(&cluster, &triggers, &store, &settings)
                .run("snapshot_1")
                .await
                .unwrap();

            assert!(outcome.verdict.is_started());
            assert!(outcome.is_clean());
            assert_eq!(outcome.to_string(), "Restore operation started");

            let rules = triggers.rules.lock().unwrap();
            assert_eq!(*rules, vec![ScheduleRule::poller("restore-poll", RuleState::Enabled)]);

            let pushed = store.pushed.lock().unwrap();
            assert_eq!(pushed.len(), 1);
            assert_eq!(pushed[0].0, "restore-poller");
            assert_eq!(pushed[0].1[SNAPSHOT_ID], "snapshot_1");

            let calls = cluster.calls.lock().unwrap();
            assert_eq!(calls.last().unwrap(), "RESTORE logs-repo/snapshot_1");
            assert_eq!(calls.contains(&"PUT logs-repo".to_string()), !repository_exists);
        }
    }

    #[tokio::test]
    async fn test_rejected_restore_is_soft() {
        let cluster = FakeCluster {
            repository_exists: true,
            restore_status: 500,
            ..Default::default()
        };
        let triggers = FakeTriggers::default();
        let store = FakeStore::default();
        let settings = settings();

        let outcome = RestoreInitiator::new(&cluster, &triggers, &store, &settings)
            .run("snapshot_1")
            .await
            .unwrap();

        assert_eq!(
            outcome.verdict,
            RestoreVerdict::Rejected {
                status: 500,
                body: r#"{"accepted":true}"#.to_string()
            }
        );
        assert_eq!(
            outcome.to_string(),
            r#"Failed to restore snapshot: {"accepted":true}"#
        );
        assert!(triggers.rules.lock().unwrap().is_empty());
        assert!(store.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tracking_failures_do_not_change_verdict() {
        let cluster = FakeCluster {
            repository_exists: true,
            restore_status: 200,
            ..Default::default()
        };
        let triggers = FakeTriggers {
            fail: true,
            ..Default::default()
        };
        let store = FakeStore {
            fail: true,
            ..Default::default()
        };
        let settings = settings();

        let outcome = RestoreInitiator::new(&cluster, &triggers, &store, &settings)
            .run("snapshot_1")
            .await
            .unwrap();

        assert!(outcome.verdict.is_started());
        let effects: Vec<_> = outcome.warnings.iter().map(|w| w.effect.as_str()).collect();
        assert_eq!(effects, ["push_poller_config", "arm_poller"]);
    }

    #[tokio::test]
    async fn test_empty_snapshot_id_is_rejected_before_any_call() {
        let cluster = FakeCluster::default();
        let triggers = FakeTriggers::default();
        let store = FakeStore::default();
        let settings = settings();

        let err = RestoreInitiator::new(&cluster, &triggers, &store, &settings)
            .run("")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Config(_)));
        assert!(cluster.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_restore_request_parsing() {
        let request = RestoreRequest::parse(r#"{"snapshotId":"snapshot_1"}"#).unwrap();
        assert_eq!(request.snapshot_id, "snapshot_1");
        assert!(RestoreRequest::parse(r#"{"snapshot":"snapshot_1"}"#).is_err());
    }
}
