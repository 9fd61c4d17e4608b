/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Runs one unit per command against the configured source

use anyhow::{bail, Context, Result};
use snapshot_lifecycle::{
    config, ConfigSource, RestoreRequest, SnapshotLifecycle, StorageEvent,
};
use tracing::debug;

use super::{cli::Commands, read_input, Report};

impl Commands {
    pub async fn exec(
        self,
        lifecycle: &SnapshotLifecycle,
        source: &dyn ConfigSource,
    ) -> Result<Report> {
        match self {
            Commands::Backup => {
                let started = lifecycle.backup(source).await?;
                Ok(Report::success(started))
            }
            Commands::Notify { key, event } => {
                let outcome = match (key, event) {
                    (Some(key), _) => lifecycle.notify(source, &key).await?,
                    (None, Some(path)) => {
                        let content = read_input(&path)
                            .await
                            .with_context(|| format!("Failed to read {}", path.display()))?;
                        let event = StorageEvent::parse(&content)?;
                        debug!("Storage event carries {} records", event.records.len());
                        lifecycle.notify_event(source, &event).await?
                    }
                    (None, None) => bail!("Either --key or --event is required"),
                };
                Ok(Report::success(outcome))
            }
            Commands::Restore { snapshot_id, event } => {
                let snapshot_id = match (snapshot_id, event) {
                    (Some(snapshot_id), _) => snapshot_id,
                    (None, Some(path)) => {
                        let content = read_input(&path)
                            .await
                            .with_context(|| format!("Failed to read {}", path.display()))?;
                        RestoreRequest::parse(&content)?.snapshot_id
                    }
                    (None, None) => bail!("Either --snapshot-id or --event is required"),
                };

                let outcome = lifecycle.restore(source, &snapshot_id).await?;
                let report = Report::success(&outcome.verdict);
                let report = if outcome.verdict.is_started() {
                    report
                } else {
                    report.failed()
                };
                Ok(report.with_warnings(outcome.warnings))
            }
            Commands::Poll => {
                let outcome = lifecycle.poll(source).await?;
                Ok(Report::success(&outcome.verdict).with_warnings(outcome.warnings))
            }
            Commands::RuleStatus { name } => {
                let Some(name) = name.or_else(|| source.get(config::RULE_NAME)) else {
                    bail!("No rule name given and {} is not set", config::RULE_NAME);
                };

                Ok(match lifecycle.rule(&name).await? {
                    Some(record) => Report::success(format!(
                        "{} {} {} (updated {})",
                        record.rule.name,
                        record.rule.state,
                        record.rule.schedule_expression,
                        record.updated_at.to_rfc3339()
                    )),
                    None => Report::success(format!("Rule {name} has never been written")),
                })
            }
        }
    }
}
