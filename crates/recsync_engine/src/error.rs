//! Error types for the sync engine.

use recsync_protocol::{ProtocolError, RecordId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Message shown when the remote session has expired.
pub const SESSION_TIMEOUT_MESSAGE: &str = "Your session is timed out";

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote rejected the session; the user must sign in again.
    #[error("session expired: {0}")]
    AuthExpired(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the run can be retried.
        retryable: bool,
    },

    /// A record listed by the remote no longer exists there.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// A wire document could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The local record store failed.
    #[error("store error: {0}")]
    Store(String),

    /// The revocation service failed to answer or to wipe.
    #[error("revocation error: {0}")]
    Revocation(String),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// How the caller should treat a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The session expired; prompt the user to sign in again.
    SessionExpired,
    /// A later run may succeed without user action.
    Recoverable,
    /// Retrying will not help.
    NonRecoverable,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Classifies the failure.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::AuthExpired(_) => FailureKind::SessionExpired,
            SyncError::Transport { retryable: true, .. } => FailureKind::Recoverable,
            _ => FailureKind::NonRecoverable,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.kind() == FailureKind::Recoverable
    }

    /// Returns true if this is a missing remote record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound(_))
    }

    /// Message suitable for showing to the user.
    ///
    /// Session expiry gets its own message so the user knows to sign in.
    pub fn user_message(&self) -> String {
        match self.kind() {
            FailureKind::SessionExpired => SESSION_TIMEOUT_MESSAGE.to_string(),
            _ => format!("Sync failed: {self}"),
        }
    }
}
