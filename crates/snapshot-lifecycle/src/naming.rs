/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Snapshot naming
//!
//! A snapshot name is `snapshot_` followed by an opaque token: 128 bits drawn
//! from the thread-local CSPRNG of `rand`, printed as lowercase hex in
//! 8-4-4-4-12 groups. The token only borrows the grouping of a UUID; it
//! carries no version or variant bits and must not be parsed as one.
//! Uniqueness is probabilistic.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

pub const SNAPSHOT_PREFIX: &str = "snapshot_";

const GROUPS: [usize; 5] = [4, 2, 2, 2, 6];

/// Name of a snapshot created by the backup trigger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotName(String);

impl SnapshotName {
    /// Generate a fresh name from the thread RNG
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate a name from the given entropy source
    pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Self(format!("{SNAPSHOT_PREFIX}{}", format_token(&bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn format_token(bytes: &[u8; 16]) -> String {
    let mut token = String::with_capacity(36);
    let mut offset = 0;

    for (i, len) in GROUPS.iter().enumerate() {
        if i > 0 {
            token.push('-');
        }
        for byte in &bytes[offset..offset + len] {
            let _ = write!(token, "{byte:02x}");
        }
        offset += len;
    }

    token
}
