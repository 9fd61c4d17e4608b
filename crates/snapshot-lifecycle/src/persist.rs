/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Whole-file replacement for the state directory documents

use crate::error::{LifecycleError, Result};
use std::{io::Write, path::Path};
use tempfile::NamedTempFile;

/// Replace `path` with `content`.
///
/// Each writer stages into its own uniquely named file next to `path`, so
/// overlapping invocations never share a staging file. The last rename wins.
pub(crate) async fn replace_file(path: &Path, content: Vec<u8>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await?;

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut staging = NamedTempFile::new_in(&dir)?;
        staging.write_all(&content)?;
        staging.as_file().sync_all()?;
        staging.persist(&path).map_err(|err| LifecycleError::Io(err.error))?;
        Ok(())
    })
    .await
    .map_err(|err| LifecycleError::Io(std::io::Error::other(err)))?
}
