//! FeedLink error types.

use thiserror::Error;

/// Errors raised by FeedLink crates.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Channel not connected")]
    NotConnected,

    #[error("Identity unavailable")]
    IdentityUnavailable,

    #[error("Client disposed")]
    Disposed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedError {
    /// Transient errors are recovered locally (reconnect, retry on next poll).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::Channel(_) | FeedError::Http(_) | FeedError::Timeout(_) | FeedError::NotConnected
        ) || matches!(self, FeedError::Api { status, .. } if *status >= 500)
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
