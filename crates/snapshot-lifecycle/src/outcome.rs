/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Primary verdicts with best-effort secondary effects
//!
//! Some units perform follow-up work after their primary action has already
//! taken effect on the cluster (pushing poller configuration, arming or
//! disarming the schedule). Failures there are collected as warnings next to
//! the verdict; they never turn a verdict into an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Secondary effect that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Which effect failed, e.g. `arm_poller`
    pub effect: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.effect, self.message)
    }
}

/// A verdict plus the warnings raised by its secondary effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub verdict: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(verdict: T) -> Self {
        Self {
            verdict,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, effect: impl Into<String>, message: impl fmt::Display) {
        self.warnings.push(Warning {
            effect: effect.into(),
            message: message.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl<T: fmt::Display> fmt::Display for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.verdict.fmt(f)
    }
}
