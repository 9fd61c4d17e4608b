/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Backup trigger
//!
//! Starts an asynchronous snapshot and returns as soon as the cluster accepts
//! it. Completion is observed separately through storage notifications, see
//! [`crate::notification`].

use crate::{
    cluster::SnapshotApi,
    config::BackupSettings,
    error::{LifecycleError, Result},
    naming::SnapshotName,
    repository::RepositoryEnsurer,
};
use std::fmt;
use tracing::{error, info};

/// Snapshot accepted by the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStarted {
    pub snapshot: SnapshotName,
    /// Body of the cluster's acceptance response
    pub response: String,
}

impl fmt::Display for BackupStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backup was successful: {}", self.response)
    }
}

/// Initiates snapshots of the whole cluster
#[derive(Debug)]
pub struct BackupInitiator<'a> {
    api: &'a dyn SnapshotApi,
    settings: &'a BackupSettings,
}

impl<'a> BackupInitiator<'a> {
    pub fn new(api: &'a dyn SnapshotApi, settings: &'a BackupSettings) -> Self {
        Self { api, settings }
    }

    /// Run one backup invocation under a freshly generated snapshot name
    pub async fn run(&self) -> Result<BackupStarted> {
        self.run_named(SnapshotName::generate()).await
    }

    /// Run one backup invocation under `snapshot`
    pub async fn run_named(&self, snapshot: SnapshotName) -> Result<BackupStarted> {
        info!(
            "Backing up cluster {} using protocol {}",
            self.settings.cluster.host, self.settings.cluster.protocol
        );

        RepositoryEnsurer::new(self.api)
            .ensure(&self.settings.repository, &self.settings.location)
            .await?;

        info!("Saving snapshot: {}", snapshot);
        let response = self
            .api
            .create_snapshot(&self.settings.repository, snapshot.as_str())
            .await?;

        if !response.is_ok() {
            error!(
                "Snapshot {} rejected with status {}",
                snapshot, response.status
            );
            return Err(LifecycleError::cluster(
                "Failed to backup cluster",
                response.status,
                response.body,
            ));
        }

        Ok(BackupStarted {
            snapshot,
            response: response.body,
        })
    }
}
