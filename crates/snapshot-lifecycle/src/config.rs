/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Configuration for the snapshot lifecycle units
//!
//! Every invocation builds its settings once from an explicit [`ConfigSource`]:
//! the process environment, a flat TOML file, or an in-memory map. Keys keep
//! the names used by the deployment so that a pushed poller configuration can
//! be read back through the same constructors.

use crate::error::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

pub const CLUSTER_HOST: &str = "ELASTICSEARCH_DNS";
pub const CLUSTER_PORT: &str = "ELASTICSEARCH_PORT";
pub const ACCEPT_INVALID_CERTS: &str = "ELASTICSEARCH_ACCEPT_INVALID_CERTS";
pub const PROTOCOL: &str = "PROTOCOL";
pub const REPOSITORY: &str = "REPOSITORY";
pub const BUCKET: &str = "BUCKET";
pub const BUCKET_REGION: &str = "S3_BUCKET_AWS_REGION";
pub const REGION: &str = "AWS_REGION";
pub const METRIC_NAME: &str = "CLOUDWATCH_METRIC_NAME";
pub const METRIC_NAMESPACE: &str = "CLOUDWATCH_METRIC_NAMESPACE";
pub const RULE_NAME: &str = "CLOUDWATCH_EVENT_RULE_NAME";
pub const POLLER_FUNCTION: &str = "NOTIFICATION_FUNCTION_NAME";
pub const SNAPSHOT_ID: &str = "SNAPSHOT_ID";
pub const STATE_DIR: &str = "SNAPSHOT_STATE_DIR";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 9200;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_STATE_DIR: &str = "snapshot-state";

/// A source of string configuration values
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads values from the process environment; empty variables count as unset
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).filter(|value| !value.is_empty()).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).filter(|value| !value.is_empty()).cloned()
    }
}

/// A flat TOML document whose top-level keys are configuration keys
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    values: HashMap<String, String>,
}

impl FileSource {
    /// Load a TOML file
    pub async fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from file: {}", path.display());

        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse TOML text. Scalars are stringified; tables and arrays are rejected.
    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut values = HashMap::with_capacity(table.len());

        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Float(f) => f.to_string(),
                other => {
                    return Err(LifecycleError::config(format!(
                        "{key} must be a scalar, found {}",
                        other.type_str()
                    )))
                }
            };
            values.insert(key, value);
        }

        debug!("Parsed {} configuration keys", values.len());
        Ok(Self { values })
    }
}

impl ConfigSource for FileSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|value| !value.is_empty()).cloned()
    }
}

fn required(source: &dyn ConfigSource, key: &str) -> Result<String> {
    source
        .get(key)
        .ok_or_else(|| LifecycleError::config(format!("{key} is not set")))
}

fn flag(source: &dyn ConfigSource, key: &str) -> Result<bool> {
    match source.get(key) {
        None => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(LifecycleError::config(format!(
                "{key} must be a boolean, found '{value}'"
            ))),
        },
    }
}

/// Scheme used to reach the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(LifecycleError::config(format!(
                "{PROTOCOL} must be 'http' or 'https', found '{other}'"
            ))),
        }
    }
}

/// Connection parameters for the search cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Skip TLS certificate validation for this client only.
    pub accept_invalid_certs: bool,
}

impl ClusterSettings {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        let port = match source.get(CLUSTER_PORT) {
            Some(port) => port.parse().map_err(|e| {
                LifecycleError::config(format!("Invalid {CLUSTER_PORT} '{port}': {e}"))
            })?,
            None => DEFAULT_PORT,
        };
        let protocol = match source.get(PROTOCOL) {
            Some(protocol) => protocol.parse()?,
            None => Protocol::default(),
        };

        Ok(Self {
            host: source.get(CLUSTER_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            protocol,
            accept_invalid_certs: flag(source, ACCEPT_INVALID_CERTS)?,
        })
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::Http,
            accept_invalid_certs: false,
        }
    }
}

/// Object-storage destination backing a snapshot repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub region: String,
}

impl StorageLocation {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            bucket: required(source, BUCKET)?,
            region: source
                .get(BUCKET_REGION)
                .or_else(|| source.get(REGION))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }
}

/// Settings of the backup trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSettings {
    pub cluster: ClusterSettings,
    pub repository: String,
    pub location: StorageLocation,
}

impl BackupSettings {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            cluster: ClusterSettings::from_source(source)?,
            repository: required(source, REPOSITORY)?,
            location: StorageLocation::from_source(source)?,
        })
    }
}

/// Fixed identity of the backup-completed metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSettings {
    pub name: String,
    pub namespace: String,
}

impl MetricSettings {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            name: required(source, METRIC_NAME)?,
            namespace: required(source, METRIC_NAMESPACE)?,
        })
    }
}

/// Settings of the restore trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSettings {
    pub cluster: ClusterSettings,
    pub repository: String,
    pub location: StorageLocation,
    pub rule_name: String,
    pub poller_function: String,
}

impl RestoreSettings {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            cluster: ClusterSettings::from_source(source)?,
            repository: required(source, REPOSITORY)?,
            location: StorageLocation::from_source(source)?,
            rule_name: required(source, RULE_NAME)?,
            poller_function: required(source, POLLER_FUNCTION)?,
        })
    }

    /// Configuration pushed to the poller once `snapshot_id` is being restored
    pub fn poller_settings(&self, snapshot_id: &str) -> PollerSettings {
        PollerSettings {
            cluster: self.cluster.clone(),
            repository: self.repository.clone(),
            rule_name: self.rule_name.clone(),
            snapshot_id: snapshot_id.to_string(),
        }
    }
}

/// Settings of the restore-status poller, normally read from its pushed store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerSettings {
    pub cluster: ClusterSettings,
    pub repository: String,
    pub rule_name: String,
    pub snapshot_id: String,
}

impl PollerSettings {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self> {
        Ok(Self {
            cluster: ClusterSettings::from_source(source)?,
            repository: required(source, REPOSITORY)?,
            rule_name: required(source, RULE_NAME)?,
            snapshot_id: required(source, SNAPSHOT_ID)?,
        })
    }

    /// Flatten into the key-value set written to the poller's store
    pub fn to_values(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (CLUSTER_HOST.to_string(), self.cluster.host.clone()),
            (CLUSTER_PORT.to_string(), self.cluster.port.to_string()),
            (
                ACCEPT_INVALID_CERTS.to_string(),
                self.cluster.accept_invalid_certs.to_string(),
            ),
            (PROTOCOL.to_string(), self.cluster.protocol.to_string()),
            (REPOSITORY.to_string(), self.repository.clone()),
            (RULE_NAME.to_string(), self.rule_name.clone()),
            (SNAPSHOT_ID.to_string(), self.snapshot_id.clone()),
        ])
    }
}

/// Directory holding the file-backed external state
pub fn state_dir(source: &dyn ConfigSource) -> PathBuf {
    source
        .get(STATE_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}
