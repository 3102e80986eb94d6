//! Authentication errors for the domain layer.
//!
//! `AuthError` is the one error family allowed to cross the core boundary
//! with a user-visible effect: when it means the session is over, the
//! credential manager clears the credential and hands off to navigation.
//! Every other failure (transport, parse, listener) is absorbed internally.

use thiserror::Error;

/// Authentication errors raised by the credential manager and auth API.
///
/// `Clone` because a single-flight refresh hands the same result to every
/// concurrent caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The server rejected the presented bearer token.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// No identity reference is stored, so no new credential can be requested.
    #[error("No identity reference stored")]
    MissingIdentity,

    /// The refresh endpoint answered with a non-success status.
    #[error("Credential refresh rejected with status {status}")]
    RefreshRejected { status: u16 },

    /// The refresh endpoint answered 200 but the body was unusable.
    #[error("Malformed auth response: {0}")]
    MalformedResponse(String),

    /// The auth service is unreachable (network, timeout, DNS).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The user signed out.
    #[error("Signed out")]
    SignedOut,

    /// The secure credential store failed.
    #[error("Credential store error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Creates a service unavailable error with a message.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this error indicates the user should sign in again.
    ///
    /// Refresh is fail-closed, so transport-level failures count too.
    pub fn requires_reauthentication(&self) -> bool {
        !matches!(self, AuthError::Storage(_))
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}
