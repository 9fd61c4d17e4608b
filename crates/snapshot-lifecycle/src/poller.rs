/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Restore-status poller
//!
//! Fired by the scheduler while its rule is enabled. Each tick reads the
//! tracked snapshot's state once:
//!
//! ```text
//! Armed --tick(IN_PROGRESS)--> Armed
//! Armed --tick(other state)--> Disarmed
//! Armed --tick(query failed)--> Armed   (retried on the next tick)
//! ```

use crate::{
    cluster::{parse_snapshot_state, SnapshotApi, SnapshotState},
    config::PollerSettings,
    error::{LifecycleError, Result},
    outcome::Outcome,
    scheduler::{RuleState, ScheduleRule, TriggerControl},
};
use std::fmt;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    InProgress,
    Completed { state: SnapshotState },
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStatus::InProgress => f.write_str("Restore operation still in progress"),
            PollStatus::Completed { state } => {
                write!(f, "Restore operation completed with status: {state}")
            }
        }
    }
}

/// Reconciles one tracked restore against the cluster
#[derive(Debug)]
pub struct RestorePoller<'a> {
    api: &'a dyn SnapshotApi,
    triggers: &'a dyn TriggerControl,
    settings: &'a PollerSettings,
}

impl<'a> RestorePoller<'a> {
    pub fn new(
        api: &'a dyn SnapshotApi,
        triggers: &'a dyn TriggerControl,
        settings: &'a PollerSettings,
    ) -> Self {
        Self {
            api,
            triggers,
            settings,
        }
    }

    /// Run one tick. Errors leave the rule untouched.
    pub async fn run(&self) -> Result<Outcome<PollStatus>> {
        let snapshot_id = &self.settings.snapshot_id;
        info!(
            "Checking status of restore with snapshot '{}' to {}",
            snapshot_id, self.settings.cluster.host
        );

        let response = self
            .api
            .snapshot_status(&self.settings.repository, snapshot_id)
            .await?;
        if !response.is_ok() {
            return Err(LifecycleError::cluster(
                format!("Failed to get status of snapshot: {snapshot_id}"),
                response.status,
                response.body,
            ));
        }

        let state = parse_snapshot_state(&response.body)?;
        if !state.is_terminal() {
            info!("Restore operation still in progress");
            return Ok(Outcome::new(PollStatus::InProgress));
        }

        info!("Restore operation completed with status: {}", state);
        let mut outcome = Outcome::new(PollStatus::Completed { state });

        let rule = ScheduleRule::poller(&self.settings.rule_name, RuleState::Disabled);
        if let Err(err) = self.triggers.put_rule(&rule).await {
            error!(
                "An error occurred when disabling rule {}: {}",
                self.settings.rule_name, err
            );
            outcome.warn("disarm_poller", err);
        }

        Ok(outcome)
    }
}
