/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Search cluster snapshot API
//!
//! [`SnapshotApi`] is the seam between the lifecycle units and the cluster's
//! REST interface. Implementations return `Err` only when the cluster could
//! not be reached; any HTTP answer, successful or not, comes back as a
//! [`ClusterResponse`] so the caller decides what a status means.

use crate::{
    config::{ClusterSettings, StorageLocation},
    error::{LifecycleError, Result},
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Method, Url};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw answer from the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterResponse {
    pub status: u16,
    pub body: String,
}

impl ClusterResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The cluster signals acceptance with a plain 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Snapshot operations used by the lifecycle units
#[async_trait]
pub trait SnapshotApi: Send + Sync + fmt::Debug {
    /// `GET /_snapshot/{repository}`
    async fn get_repository(&self, repository: &str) -> Result<ClusterResponse>;

    /// `PUT /_snapshot/{repository}` with an s3 repository definition
    async fn put_repository(
        &self,
        repository: &str,
        location: &StorageLocation,
    ) -> Result<ClusterResponse>;

    /// `PUT /_snapshot/{repository}/{snapshot}?wait_for_completion=false`
    async fn create_snapshot(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse>;

    /// `GET /_snapshot/{repository}/{snapshot}`
    async fn snapshot_status(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse>;

    /// `POST /_snapshot/{repository}/{snapshot}/_restore?wait_for_completion=false`
    async fn restore_snapshot(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse>;
}

/// Repository registration body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub settings: StorageLocation,
}

impl RepositoryDefinition {
    pub fn s3(location: &StorageLocation) -> Self {
        Self {
            kind: "s3".to_string(),
            settings: location.clone(),
        }
    }
}

/// Lifecycle state reported by the cluster for a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    InProgress,
    Success,
    Partial,
    Failed,
    Other(String),
}

impl SnapshotState {
    pub fn parse(state: &str) -> Self {
        match state {
            "IN_PROGRESS" => SnapshotState::InProgress,
            "SUCCESS" => SnapshotState::Success,
            "PARTIAL" => SnapshotState::Partial,
            "FAILED" => SnapshotState::Failed,
            other => SnapshotState::Other(other.to_string()),
        }
    }

    /// Everything except `IN_PROGRESS` ends the restore
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SnapshotState::InProgress)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SnapshotState::InProgress => "IN_PROGRESS",
            SnapshotState::Success => "SUCCESS",
            SnapshotState::Partial => "PARTIAL",
            SnapshotState::Failed => "FAILED",
            SnapshotState::Other(state) => state,
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotStatusBody {
    snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    state: String,
}

/// Read the state of the first snapshot in a status response
pub fn parse_snapshot_state(body: &str) -> Result<SnapshotState> {
    let status: SnapshotStatusBody = serde_json::from_str(body)
        .map_err(|e| LifecycleError::serialization(format!("Invalid snapshot status response: {e}")))?;

    status
        .snapshots
        .first()
        .map(|entry| SnapshotState::parse(&entry.state))
        .ok_or_else(|| LifecycleError::serialization("Snapshot status response lists no snapshots"))
}

/// [`SnapshotApi`] over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpSnapshotApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpSnapshotApi {
    pub fn new(settings: &ClusterSettings) -> Result<Self> {
        let base = Url::parse(&settings.base_url())
            .map_err(|e| LifecycleError::config(format!("Invalid cluster address: {e}")))?;

        if settings.accept_invalid_certs {
            warn!(
                "Certificate validation disabled for cluster {}",
                settings.host
            );
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LifecycleError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base, client })
    }

    fn url(&self, segments: &[&str], no_wait: bool) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LifecycleError::config(format!("Invalid cluster address: {}", self.base)))?
            .clear()
            .extend(segments);

        if no_wait {
            url.query_pairs_mut()
                .append_pair("wait_for_completion", "false");
        }

        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<String>) -> Result<ClusterResponse> {
        debug!("Making {} request to: {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("Cluster responded with status {}", status);
        Ok(ClusterResponse { status, body })
    }
}

#[async_trait]
impl SnapshotApi for HttpSnapshotApi {
    async fn get_repository(&self, repository: &str) -> Result<ClusterResponse> {
        let url = self.url(&["_snapshot", repository], false)?;
        self.send(Method::GET, url, None).await
    }

    async fn put_repository(
        &self,
        repository: &str,
        location: &StorageLocation,
    ) -> Result<ClusterResponse> {
        let url = self.url(&["_snapshot", repository], false)?;
        let body = serde_json::to_string(&RepositoryDefinition::s3(location))?;
        self.send(Method::PUT, url, Some(body)).await
    }

    async fn create_snapshot(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse> {
        let url = self.url(&["_snapshot", repository, snapshot], true)?;
        self.send(Method::PUT, url, None).await
    }

    async fn snapshot_status(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse> {
        let url = self.url(&["_snapshot", repository, snapshot], false)?;
        self.send(Method::GET, url, None).await
    }

    async fn restore_snapshot(&self, repository: &str, snapshot: &str) -> Result<ClusterResponse> {
        let url = self.url(&["_snapshot", repository, snapshot, "_restore"], true)?;
        self.send(Method::POST, url, None).await
    }
}
