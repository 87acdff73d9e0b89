//! Session error taxonomy.

use thiserror::Error;

/// Errors surfaced by the session manager and its collaborators.
///
/// Everything except [`SessionError::InvariantViolation`] is recoverable: the
/// manager logs it and stays (or falls back to) disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The user dismissed the wallet selection flow.
    #[error("wallet selection cancelled by user")]
    UserCancelled,

    /// The cached backend could not be silently reconnected.
    #[error("failed to restore cached wallet: {0}")]
    RestoreFailed(String),

    /// A handle was obtained but querying its address or chain failed.
    #[error("wallet handshake failed: {0}")]
    HandshakeFailed(String),

    /// No registered wallet backend is available in this environment.
    #[error("no wallet backend available")]
    NoBackendAvailable,

    /// A selection flow is already open.
    #[error("a wallet selection is already in progress")]
    SelectionInProgress,

    /// A connect or restore is already in flight.
    #[error("a connection attempt is already in flight")]
    Busy,

    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    /// The session was torn down by a forced reload; only a fresh start can
    /// connect again.
    #[error("session terminated by reload; restart required")]
    Terminated,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Programmer error: an attempt to mutate session state outside the
    /// accepted transition, or to replace a live handle without detaching it.
    #[error("session invariant violated: {0}")]
    InvariantViolation(String),
}

impl SessionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::InvariantViolation(_))
    }

    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Map a handle-level failure into the handshake category.
    pub fn into_handshake(self) -> SessionError {
        match self {
            SessionError::InvariantViolation(_) | SessionError::HandshakeFailed(_) => self,
            other => SessionError::HandshakeFailed(other.to_string()),
        }
    }
}
