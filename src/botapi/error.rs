// SPDX-License-Identifier: MIT

//! Typed errors for the Bot API transport layer.

use thiserror::Error;

/// Errors raised while talking to the messaging backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API answered with `ok: false`.
    #[error("bot API error from {method}: {message}")]
    Api { method: String, message: String },

    /// Transport misconfiguration (missing token, bad base URL).
    #[error("transport configuration error: {0}")]
    Config(String),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Malformed endpoint URL
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl TransportError {
    /// Create an API error
    pub fn api(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
