/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "snapshot-ctl",
    version,
    about = "Run one invocation of the snapshot backup and restore units"
)]
pub struct Cli {
    /// Flat TOML configuration file (defaults to the process environment)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding scheduler rules and pushed poller configuration
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start an asynchronous snapshot of the whole cluster
    Backup,

    /// Handle one storage write notification
    Notify {
        /// Key of the object that was written
        #[arg(long, required_unless_present = "event", conflicts_with = "event")]
        key: Option<String>,

        /// Storage event document, `-` reads standard input
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
    },

    /// Start restoring a snapshot and arm the status poller
    Restore {
        /// Snapshot to restore
        #[arg(long, required_unless_present = "event", conflicts_with = "event")]
        snapshot_id: Option<String>,

        /// Restore request document `{"snapshotId": ".."}`, `-` reads standard input
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,
    },

    /// Run one tick of the restore-status poller
    Poll,

    /// Show the stored state of a scheduler rule
    RuleStatus {
        /// Rule name (defaults to CLOUDWATCH_EVENT_RULE_NAME)
        name: Option<String>,
    },
}
