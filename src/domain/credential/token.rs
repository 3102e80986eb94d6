//! Bearer credential value types.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Opaque, short-lived bearer token presented on authenticated requests.
///
/// The raw value never appears in `Debug` output or logs; callers that
/// need it on the wire go through [`BearerToken::expose`].
#[derive(Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    /// Wraps a raw token string, rejecting empty values.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationError::empty_field("access_token"));
        }
        Ok(Self(SecretString::new(raw)))
    }

    /// Exposes the raw token for use on the wire.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Formats the `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

impl PartialEq for BearerToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for BearerToken {}

/// What the credential manager currently knows about the cached token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialValidity {
    /// Loaded from the store but not verified this run.
    #[default]
    Unknown,
    /// Accepted by the server (verified, or freshly issued by refresh).
    Valid,
    /// Rejected by the verification endpoint.
    Expired,
}

impl CredentialValidity {
    /// Returns true if the token may be served without another round trip.
    pub fn is_usable(&self) -> bool {
        !matches!(self, CredentialValidity::Expired)
    }
}
