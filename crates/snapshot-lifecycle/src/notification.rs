/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Backup completion observer
//!
//! The cluster writes many objects while a snapshot is in progress and
//! finishes by writing the top-level `index-N` file of the repository. The
//! observer keys on that naming convention alone and never asks the cluster,
//! so a storage layout without the marker goes unnoticed.

use crate::{
    config::MetricSettings,
    error::{LifecycleError, Result},
    metrics::{MetricDatum, MetricSink},
};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

pub const COMPLETION_MARKER_PREFIX: &str = "index-";

/// Object-storage write notification
#[derive(Debug, Clone, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<StorageRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageRecord {
    pub s3: StorageEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageEntity {
    pub object: StorageObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub key: String,
}

impl StorageEvent {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LifecycleError::serialization(format!("Invalid storage event: {e}")))
    }

    /// Key of the first record; later records are not consulted
    pub fn object_key(&self) -> Result<&str> {
        self.records
            .first()
            .map(|record| record.s3.object.key.as_str())
            .ok_or_else(|| LifecycleError::serialization("Storage event carries no records"))
    }
}

/// Whether a written key is the completion marker
pub fn is_completion_marker(key: &str) -> bool {
    key.starts_with(COMPLETION_MARKER_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The marker was written and the metric emitted
    BackupCompleted,
    /// Any other object; expected for every data file of a snapshot
    Ignored { key: String },
}

impl fmt::Display for NotificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationOutcome::BackupCompleted => f.write_str("Success"),
            NotificationOutcome::Ignored { key } => write!(
                f,
                "Found file '{key}', ignoring in favor of one prefixed with '{COMPLETION_MARKER_PREFIX}'"
            ),
        }
    }
}

/// Turns completion markers into backup-completed metric samples
#[derive(Debug)]
pub struct BackupCompletionObserver<'a> {
    sink: &'a dyn MetricSink,
    metric: &'a MetricSettings,
}

impl<'a> BackupCompletionObserver<'a> {
    pub fn new(sink: &'a dyn MetricSink, metric: &'a MetricSettings) -> Self {
        Self { sink, metric }
    }

    /// Acknowledge one written object
    pub async fn run(&self, key: &str) -> Result<NotificationOutcome> {
        if !is_completion_marker(key) {
            debug!("Ignoring storage write of '{}'", key);
            return Ok(NotificationOutcome::Ignored {
                key: key.to_string(),
            });
        }

        info!("Backup was successful, updating metric");
        self.sink
            .put_metric(&MetricDatum::backup_completed(self.metric))
            .await?;

        Ok(NotificationOutcome::BackupCompleted)
    }

    /// Acknowledge the first object of a storage event
    pub async fn run_event(&self, event: &StorageEvent) -> Result<NotificationOutcome> {
        self.run(event.object_key()?).await
    }
}
