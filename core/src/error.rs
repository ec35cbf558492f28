//! Error types for the Seafile API client.
//!
//! # Design
//! `Authentication` is kept apart from `Http` because a 400 carrying
//! `non_field_errors` from the token endpoint means "wrong credentials",
//! not "the server misbehaved". Both carry the status code, and
//! [`ApiError::is_http`] treats authentication failures as HTTP errors.
//!
//! `Transport` is only ever produced by a [`crate::Transport`]. The
//! dispatcher decides whether it reaches the caller (`try_*` methods) or is
//! logged and turned into an absent response.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The token endpoint rejected the supplied username/password.
    #[error("authentication failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    /// A response arrived with a status outside the caller's expected set.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The token handed out by the server does not have the known length.
    #[error("the length of seahub api auth token should be 40, got {0}")]
    InvalidToken(usize),

    /// DNS, connect, TLS or timeout failure. No response was received.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// A lookup found nothing at the requested location.
    #[error("{0}")]
    NotFound(String),

    /// Repo paths are absolute; `"docs/a.md"` is rejected.
    #[error("path must start with '/': {0}")]
    InvalidPath(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status code, if this error came from a completed response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. } | ApiError::Http { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        self.status().is_some()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
