// src/errors.rs

//! Crate-wide error types.
//!
//! - [`RemoteWatchError`] covers setup: config loading, validation, building
//!   HTTP clients. It is what `load_and_validate` and friends return.
//! - [`ObserveError`] only lives inside observation loops. Loops absorb it
//!   into their backoff/retry path and log it; it never reaches the caller of
//!   `register`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteWatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RemoteWatchError>;

/// Failure of a single request made by an observation loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserveError {
    /// Network failure, timeout, or a non-success HTTP status.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered but the body could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The server rejected our credentials (HTTP 401/403).
    #[error("unauthorized (HTTP {0})")]
    Unauthorized(u16),

    /// `stop()` was called while the request was outstanding.
    #[error("observation cancelled")]
    Cancelled,
}

impl ObserveError {
    /// Retrying with the same credentials can never succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ObserveError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ObserveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ObserveError::MalformedResponse(err.to_string())
        } else {
            ObserveError::Transport(err.to_string())
        }
    }
}

pub type ObserveResult<T> = std::result::Result<T, ObserveError>;
