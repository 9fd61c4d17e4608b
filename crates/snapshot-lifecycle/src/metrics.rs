/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Metric sink for completed backups

use crate::{
    config::MetricSettings,
    error::{LifecycleError, Result},
    persist,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tracing::info;

const METRICS_FILE: &str = "metrics.json";

/// Unit attached to a metric datum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    Count,
}

/// A single metric sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub name: String,
    pub namespace: String,
    pub value: f64,
    pub unit: MetricUnit,
}

impl MetricDatum {
    /// The one-count sample emitted per completed backup
    pub fn backup_completed(settings: &MetricSettings) -> Self {
        Self {
            name: settings.name.clone(),
            namespace: settings.namespace.clone(),
            value: 1.0,
            unit: MetricUnit::Count,
        }
    }
}

/// Destination of metric samples
#[async_trait]
pub trait MetricSink: Send + Sync + fmt::Debug {
    async fn put_metric(&self, datum: &MetricDatum) -> Result<()>;
}

/// A sample as persisted by [`FileMetricSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(flatten)]
    pub datum: MetricDatum,
    pub recorded_at: DateTime<Utc>,
}

/// Appends samples to a JSON document in the state directory and mirrors
/// them to the process-wide `metrics` recorder, if one is installed.
#[derive(Debug, Clone)]
pub struct FileMetricSink {
    path: PathBuf,
}

impl FileMetricSink {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(METRICS_FILE),
        }
    }

    /// Every sample written so far, oldest first
    pub async fn records(&self) -> Result<Vec<MetricRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(LifecycleError::Io(err)),
        }
    }
}

#[async_trait]
impl MetricSink for FileMetricSink {
    async fn put_metric(&self, datum: &MetricDatum) -> Result<()> {
        let mut records = self
            .records()
            .await
            .map_err(|e| LifecycleError::sink(format!("Failed to read {}: {e}", self.path.display())))?;
        records.push(MetricRecord {
            datum: datum.clone(),
            recorded_at: Utc::now(),
        });
        persist::replace_file(&self.path, serde_json::to_vec_pretty(&records)?)
            .await
            .map_err(|e| LifecycleError::sink(format!("Failed to write {}: {e}", self.path.display())))?;

        match datum.unit {
            MetricUnit::Count => {
                ::metrics::counter!(datum.name.clone(), "namespace" => datum.namespace.clone())
                    .increment(datum.value as u64);
            }
        }

        info!(
            "Successfully updated metric {}/{} by {}",
            datum.namespace, datum.name, datum.value
        );
        Ok(())
    }
}
