/*
 * SPDX-FileCopyrightText: 2024 A3Mailer Project
 *
 * SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-SEL
 */

//! Error types for snapshot lifecycle operations

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Snapshot lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The cluster or a cloud API could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// The cluster answered with a non-success status
    #[error("{message}: {body}")]
    Cluster {
        message: String,
        status: u16,
        body: String,
    },

    /// A required configuration value is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A document could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The metric sink rejected a datum
    #[error("Metric sink error: {0}")]
    Sink(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LifecycleError {
    /// Create a new transport error
    pub fn transport<T: Into<String>>(msg: T) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new cluster error from a response
    pub fn cluster<T: Into<String>>(message: T, status: u16, body: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
            status,
            body: body.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a new metric sink error
    pub fn sink<T: Into<String>>(msg: T) -> Self {
        Self::Sink(msg.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Cluster { .. } => "cluster",
            Self::Config(_) => "config",
            Self::Serialization(_) | Self::Json(_) => "serialization",
            Self::Sink(_) => "sink",
            Self::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for LifecycleError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<toml::de::Error> for LifecycleError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
