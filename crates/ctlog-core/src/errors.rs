//! Unified error system for the CT log engine
//!
//! A single, flat error enum carrying the four kinds the design calls for:
//! validation, conflict, transient, and fatal. Kind determines how a caller
//! should react — surface to the client, retry locally, retry with backoff,
//! or stop signing entirely.

use serde::{Deserialize, Serialize};

/// Unified error type for all CT log operations.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum CtLogError {
    /// Malformed input, bad signature, or an invalid proof range. No local
    /// state changes; the caller should not retry without changing the
    /// request.
    #[error("validation: {message}")]
    Validation {
        /// Human-readable description of what was invalid.
        message: String,
    },

    /// A CAS lost, a leaf already has a sequence, or a sequence is already
    /// taken. Usually resolved locally by re-reading and retrying; surfaced
    /// to the submitter as "duplicate" where idempotency applies.
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable description of the conflicting state.
        message: String,
    },

    /// Network timeout, an unready lease, or a temporarily unavailable
    /// backend. Safe to retry with backoff, bounded by a deadline.
    #[error("transient: {message}")]
    Transient {
        /// Human-readable description of the transient condition.
        message: String,
    },

    /// Entry DB corruption, an unreadable signing key, or an invariant
    /// violation. The process must refuse to sign and stop.
    #[error("fatal: {message}")]
    Fatal {
        /// Human-readable description of the fatal condition.
        message: String,
    },
}

impl CtLogError {
    /// Construct a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Construct a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Construct a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Construct a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Whether the operation that produced this error is safe to retry.
    ///
    /// Only `Transient` errors are retryable; `Conflict` is resolved by
    /// re-reading state rather than blind retry, and `Validation`/`Fatal`
    /// never succeed on retry alone.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// The HTTP status class a frontend should map this error to, per the
    /// error propagation design: 4xx for validation/conflict, 5xx for
    /// transient/fatal.
    pub fn status_class(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Conflict { .. } => 409,
            Self::Transient { .. } => 503,
            Self::Fatal { .. } => 500,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CtLogError>;
