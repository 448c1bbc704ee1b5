//! Error taxonomy shared by every layer of the client.

use thiserror::Error;

/// Result type used across the client.
pub type CardResult<T> = Result<T, CardError>;

/// Typed failure returned by every public card/session operation.
///
/// Each variant carries a short human-readable message; callers branch on the
/// variant, never on the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    /// An authorization predicate failed, or the server rejected the call
    /// for permission reasons.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The target id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflicting mutation on the same card is already in flight.
    #[error("busy: {0}")]
    Busy(String),

    /// Transport-level failure, including timeouts.
    #[error("network error: {0}")]
    Network(String),

    /// The payload failed shape/range checks before being sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Anything that could not be mapped to a more specific kind.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CardError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether retrying the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CardError::Busy(_) | CardError::Network(_))
    }
}
