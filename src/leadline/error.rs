// SPDX-License-Identifier: MIT

//! Typed error handling for leadline-rs
//!
//! This module provides the top-level error hierarchy using thiserror.
//! Validation failures are not errors: they are ordinary outcomes of the
//! form state machine and never travel through this type.

use thiserror::Error;

use crate::botapi::error::TransportError;
use crate::leadline::storage::StorageError;

/// Top-level error type for leadline-rs
#[derive(Debug, Error)]
pub enum LeadlineError {
    /// Errors from the messaging transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Errors from the session/submission store
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration errors (missing env vars, invalid config)
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper for compatibility
    #[error("{0}")]
    Other(String),
}

impl LeadlineError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether retrying the same operation can plausibly succeed.
    ///
    /// Callers use this to distinguish "show a try-again prompt" from
    /// genuine bugs worth a loud log line.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(StorageError::Unavailable(_)) => true,
            Self::Transport(TransportError::Http(_)) => true,
            _ => false,
        }
    }
}

impl From<&str> for LeadlineError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for LeadlineError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
