//! Normalized error types for feed operations.
//!
//! Transport-agnostic errors that hide reqwest details. None of them is fatal:
//! a failed fetch leaves the loaded set, cursors, and exhaustion flags exactly
//! as they were.

use thiserror::Error;

/// Normalized error for feed fetch and publish operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The board server is unreachable, the request timed out, or the
    /// connection dropped mid-response.
    #[error("board server unavailable: {message}")]
    Transport { message: String },

    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response could not be decoded into feed items. The whole page is
    /// rejected; nothing from it is merged.
    #[error("malformed page: {message}")]
    MalformedPage { message: String },

    /// Request validation failed before anything was sent.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The session was closed.
    #[error("feed session closed")]
    Closed,
}

impl FeedError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            Self::MalformedPage { .. } | Self::InvalidArgument { .. } | Self::Closed => false,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPage {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
