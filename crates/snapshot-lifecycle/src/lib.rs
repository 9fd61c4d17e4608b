/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! # Search Cluster Snapshot Lifecycle
//!
//! Backup and restore of a search cluster into object storage, run as three
//! independently triggered units that share no memory:
//!
//! - the backup trigger starts an asynchronous snapshot,
//! - the completion observer turns storage writes into a metric,
//! - the restore trigger starts a restore and arms the status poller, which
//!   disarms itself once the restore is over.
//!
//! Units talk to each other only through the cluster, the scheduler rule and
//! the poller's pushed configuration.

pub mod backup;
pub mod cluster;
pub mod config;
pub mod error;
pub mod metrics;
pub mod naming;
pub mod notification;
pub mod outcome;
mod persist;
pub mod poller;
pub mod repository;
pub mod restore;
pub mod scheduler;
pub mod tracking;

pub use backup::{BackupInitiator, BackupStarted};
pub use cluster::{ClusterResponse, HttpSnapshotApi, SnapshotApi, SnapshotState};
pub use config::{
    BackupSettings, ClusterSettings, ConfigSource, EnvSource, FileSource, MetricSettings,
    PollerSettings, Protocol, RestoreSettings, StorageLocation,
};
pub use error::{LifecycleError, Result};
pub use crate::metrics::{FileMetricSink, MetricDatum, MetricRecord, MetricSink};
pub use naming::SnapshotName;
pub use notification::{BackupCompletionObserver, NotificationOutcome, StorageEvent};
pub use outcome::{Outcome, Warning};
pub use poller::{PollStatus, RestorePoller};
pub use repository::{RepositoryEnsurer, RepositoryStatus};
pub use restore::{RestoreInitiator, RestoreRequest, RestoreVerdict};
pub use scheduler::{FileTriggerControl, RuleRecord, RuleState, ScheduleRule, TriggerControl};
pub use tracking::{FilePollerConfigStore, PollerConfigStore};

use std::{path::Path, sync::Arc};
use tracing::info;

/// Entry point running one unit per call against shared external state
#[derive(Debug, Clone)]
pub struct SnapshotLifecycle {
    inner: Arc<SnapshotLifecycleInner>,
}

#[derive(Debug)]
struct SnapshotLifecycleInner {
    triggers: Arc<dyn TriggerControl>,
    store: Arc<dyn PollerConfigStore>,
    sink: Arc<dyn MetricSink>,
}

impl SnapshotLifecycle {
    pub fn new(
        triggers: Arc<dyn TriggerControl>,
        store: Arc<dyn PollerConfigStore>,
        sink: Arc<dyn MetricSink>,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotLifecycleInner {
                triggers,
                store,
                sink,
            }),
        }
    }

    /// File-backed scheduler rules, poller configuration and metric samples
    /// under `state_dir`
    pub fn with_state_dir(state_dir: &Path) -> Self {
        info!("Using state directory {}", state_dir.display());
        Self::new(
            Arc::new(FileTriggerControl::new(state_dir)),
            Arc::new(FilePollerConfigStore::new(state_dir)),
            Arc::new(FileMetricSink::new(state_dir)),
        )
    }

    /// Backup trigger
    pub async fn backup(&self, source: &dyn ConfigSource) -> Result<BackupStarted> {
        let settings = BackupSettings::from_source(source)?;
        let api = HttpSnapshotApi::new(&settings.cluster)?;
        BackupInitiator::new(&api, &settings).run().await
    }

    /// Completion observer for a single written key
    pub async fn notify(&self, source: &dyn ConfigSource, key: &str) -> Result<NotificationOutcome> {
        let metric = MetricSettings::from_source(source)?;
        BackupCompletionObserver::new(self.inner.sink.as_ref(), &metric)
            .run(key)
            .await
    }

    /// Completion observer for a full storage notification
    pub async fn notify_event(
        &self,
        source: &dyn ConfigSource,
        event: &StorageEvent,
    ) -> Result<NotificationOutcome> {
        let metric = MetricSettings::from_source(source)?;
        BackupCompletionObserver::new(self.inner.sink.as_ref(), &metric)
            .run_event(event)
            .await
    }

    /// Restore trigger
    pub async fn restore(
        &self,
        source: &dyn ConfigSource,
        snapshot_id: &str,
    ) -> Result<Outcome<RestoreVerdict>> {
        let settings = RestoreSettings::from_source(source)?;
        let api = HttpSnapshotApi::new(&settings.cluster)?;
        RestoreInitiator::new(
            &api,
            self.inner.triggers.as_ref(),
            self.inner.store.as_ref(),
            &settings,
        )
        .run(snapshot_id)
        .await
    }

    /// One poller tick. Only the poller's identity comes from `source`; the
    /// rest is read from the configuration pushed by the restore trigger.
    pub async fn poll(&self, source: &dyn ConfigSource) -> Result<Outcome<PollStatus>> {
        let function = source.get(config::POLLER_FUNCTION).ok_or_else(|| {
            LifecycleError::config(format!("{} is not set", config::POLLER_FUNCTION))
        })?;
        let pushed = self.inner.store.load(&function).await?;
        let settings = PollerSettings::from_source(&pushed)?;
        let api = HttpSnapshotApi::new(&settings.cluster)?;

        RestorePoller::new(&api, self.inner.triggers.as_ref(), &settings)
            .run()
            .await
    }

    /// Current record of a scheduler rule
    pub async fn rule(&self, name: &str) -> Result<Option<RuleRecord>> {
        self.inner.triggers.rule(name).await
    }
}
