/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Scheduler control for the restore-status poller
//!
//! The poller runs on a named recurring rule owned by an external scheduler.
//! The restore trigger enables the rule and the poller disables it once the
//! restore reaches a terminal state. Rules are plain records; nothing in this
//! crate fires them.

use crate::{
    error::{LifecycleError, Result},
    persist,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Schedule expression of the poller rule
pub const POLL_SCHEDULE: &str = "rate(5 minutes)";

/// Interval described by [`POLL_SCHEDULE`]
pub const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

const RULES_FILE: &str = "rules.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleState {
    Enabled,
    Disabled,
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleState::Enabled => f.write_str("ENABLED"),
            RuleState::Disabled => f.write_str("DISABLED"),
        }
    }
}

/// Desired state of a named recurring rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRule {
    pub name: String,
    pub schedule_expression: String,
    pub state: RuleState,
}

impl ScheduleRule {
    /// The poller rule at its fixed five-minute rate
    pub fn poller(name: impl Into<String>, state: RuleState) -> Self {
        Self {
            name: name.into(),
            schedule_expression: POLL_SCHEDULE.to_string(),
            state,
        }
    }
}

/// A rule as last written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    #[serde(flatten)]
    pub rule: ScheduleRule,
    pub updated_at: DateTime<Utc>,
}

/// Write access to the external scheduler
#[async_trait]
pub trait TriggerControl: Send + Sync + fmt::Debug {
    /// Create or replace a rule; writing the current state again is a no-op
    /// for the scheduler.
    async fn put_rule(&self, rule: &ScheduleRule) -> Result<()>;

    /// Current record of a rule, if it was ever written
    async fn rule(&self, name: &str) -> Result<Option<RuleRecord>>;
}

/// Rules persisted as a JSON document in the state directory
#[derive(Debug, Clone)]
pub struct FileTriggerControl {
    path: PathBuf,
}

impl FileTriggerControl {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(RULES_FILE),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, RuleRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(LifecycleError::Io(err)),
        }
    }

    async fn store(&self, rules: &BTreeMap<String, RuleRecord>) -> Result<()> {
        persist::replace_file(&self.path, serde_json::to_vec_pretty(rules)?).await
    }
}

#[async_trait]
impl TriggerControl for FileTriggerControl {
    async fn put_rule(&self, rule: &ScheduleRule) -> Result<()> {
        let mut rules = self.load().await?;

        debug!(
            "Writing rule {} ({}) as {}",
            rule.name, rule.schedule_expression, rule.state
        );
        rules.insert(
            rule.name.clone(),
            RuleRecord {
                rule: rule.clone(),
                updated_at: Utc::now(),
            },
        );

        self.store(&rules).await?;
        info!("Rule {} is now {}", rule.name, rule.state);
        Ok(())
    }

    async fn rule(&self, name: &str) -> Result<Option<RuleRecord>> {
        Ok(self.load().await?.remove(name))
    }
}
