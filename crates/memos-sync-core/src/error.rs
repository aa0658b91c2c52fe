//! Error types for memos-sync-core

use std::time::Duration;

use thiserror::Error;

/// Result type alias using memos-sync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in memos-sync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Settings are missing or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A vault path that is absolute or escapes the vault root
    #[error("Invalid vault path: {0}")]
    InvalidPath(String),

    /// Path not found in the vault
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote server answered with an error
    #[error("Remote error: {0}")]
    Remote(String),

    /// Remote fetch did not finish in time
    #[error("Remote fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether the error came from talking to the remote server.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Remote(_) | Self::Timeout(_))
    }
}
