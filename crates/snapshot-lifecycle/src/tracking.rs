/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Poller configuration store
//!
//! The poller is fired without arguments, so the restore trigger hands it the
//! snapshot to track by replacing the poller's stored configuration. The
//! store holds a single key-value set per poller: a second restore overwrites
//! the first and only the most recent snapshot is tracked.

use crate::{
    error::{LifecycleError, Result},
    persist,
};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};
use tracing::info;

/// Externally held configuration of poller functions
#[async_trait]
pub trait PollerConfigStore: Send + Sync + fmt::Debug {
    /// Replace the whole configuration of `function`
    async fn push(&self, function: &str, values: &BTreeMap<String, String>) -> Result<()>;

    /// Read the configuration of `function`
    async fn load(&self, function: &str) -> Result<BTreeMap<String, String>>;
}

/// One JSON document per poller function in the state directory
#[derive(Debug, Clone)]
pub struct FilePollerConfigStore {
    dir: PathBuf,
}

impl FilePollerConfigStore {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("functions"),
        }
    }

    fn path(&self, function: &str) -> Result<PathBuf> {
        if function.is_empty()
            || function.starts_with('.')
            || function.contains(['/', '\\'])
        {
            return Err(LifecycleError::config(format!(
                "Invalid poller function name '{function}'"
            )));
        }
        Ok(self.dir.join(format!("{function}.json")))
    }
}

#[async_trait]
impl PollerConfigStore for FilePollerConfigStore {
    async fn push(&self, function: &str, values: &BTreeMap<String, String>) -> Result<()> {
        let path = self.path(function)?;
        persist::replace_file(&path, serde_json::to_vec_pretty(values)?).await?;

        info!("Updated configuration of {} ({} keys)", function, values.len());
        Ok(())
    }

    async fn load(&self, function: &str) -> Result<BTreeMap<String, String>> {
        let path = self.path(function)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(LifecycleError::config(format!(
                    "No configuration has been pushed to {function}"
                )))
            }
            Err(err) => Err(LifecycleError::Io(err)),
        }
    }
}
