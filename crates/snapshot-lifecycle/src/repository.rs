/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Snapshot repository registration
//!
//! Both triggers need the repository to exist before they talk to the
//! cluster about snapshots. An existing registration is never modified, even
//! if it points somewhere other than the configured location.

use crate::{
    cluster::SnapshotApi,
    config::StorageLocation,
    error::{LifecycleError, Result},
};
use tracing::{info, warn};

/// What [`RepositoryEnsurer::ensure`] found or did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryStatus {
    AlreadyRegistered,
    Registered,
}

/// Makes sure a named repository is registered with the cluster
#[derive(Debug)]
pub struct RepositoryEnsurer<'a> {
    api: &'a dyn SnapshotApi,
}

impl<'a> RepositoryEnsurer<'a> {
    pub fn new(api: &'a dyn SnapshotApi) -> Self {
        Self { api }
    }

    /// Register `repository` against `location` unless the cluster already
    /// knows it.
    ///
    /// A transport failure on the existence probe is returned as is. Any HTTP
    /// status other than 200 counts as "absent" and leads to a registration
    /// attempt, which the cluster treats idempotently.
    pub async fn ensure(
        &self,
        repository: &str,
        location: &StorageLocation,
    ) -> Result<RepositoryStatus> {
        let probe = self.api.get_repository(repository).await?;
        if probe.is_ok() {
            info!("Backup repository '{}' already exists", repository);
            return Ok(RepositoryStatus::AlreadyRegistered);
        }

        if probe.status != 404 {
            warn!(
                "Repository probe for '{}' returned status {}, registering anyway",
                repository, probe.status
            );
        }
        info!(
            "Creating backup repository: {} (bucket {}, region {})",
            repository, location.bucket, location.region
        );

        let response = self.api.put_repository(repository, location).await?;
        if !response.is_ok() {
            return Err(LifecycleError::cluster(
                "Failed to create repository",
                response.status,
                response.body,
            ));
        }

        info!("Backup repository '{}' created successfully", repository);
        Ok(RepositoryStatus::Registered)
    }
}
