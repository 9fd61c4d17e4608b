/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

pub mod cli;
pub mod invocation;

use std::{fmt, path::Path};

use snapshot_lifecycle::Warning;
use tokio::io::AsyncReadExt;

/// What a single invocation printed, and whether it should exit successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub message: String,
    pub warnings: Vec<Warning>,
    pub success: bool,
}

impl Report {
    pub fn success(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            warnings: Vec::new(),
            success: true,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Read an event document from a file, or from standard input for `-`
pub async fn read_input(path: &Path) -> std::io::Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        tokio::io::stdin().read_to_string(&mut content).await?;
        Ok(content)
    } else {
        tokio::fs::read_to_string(path).await
    }
}
