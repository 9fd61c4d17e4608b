/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

use std::process::ExitCode;

use clap::Parser;
use snapshot_lifecycle::{config, ConfigSource, EnvSource, FileSource, SnapshotLifecycle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use modules::cli::Cli;

pub mod modules;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(report) => {
            for warning in &report.warnings {
                warn!("Secondary effect failed: {}", warning);
                eprintln!("warning: {warning}");
            }
            println!("{}", report.message);
            if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("Invocation failed: {:#}", err);
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<modules::Report> {
    let source: Box<dyn ConfigSource> = match &cli.config {
        Some(path) => Box::new(FileSource::load(path).await?),
        None => Box::new(EnvSource),
    };

    let state_dir = cli
        .state_dir
        .clone()
        .unwrap_or_else(|| config::state_dir(source.as_ref()));
    info!("Running {:?}", cli.command);

    let lifecycle = SnapshotLifecycle::with_state_dir(&state_dir);
    cli.command.exec(&lifecycle, source.as_ref()).await
}
