//! Durable identity used to request new credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{SubjectId, ValidationError};

/// Role the subject signed in as (e.g. `member`, `trainer`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

impl Role {
    /// Creates a new Role, returning error if empty.
    pub fn new(role: impl Into<String>) -> Result<Self, ValidationError> {
        let role = role.into();
        if role.trim().is_empty() {
            return Err(ValidationError::empty_field("role"));
        }
        Ok(Self(role))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Role {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

/// The non-expiring `(subject id, role)` pair stored alongside the credential.
///
/// Presented to the refresh endpoint to mint a new bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityReference {
    pub subject_id: SubjectId,
    pub role: Role,
}

impl IdentityReference {
    /// Creates a new identity reference.
    pub fn new(subject_id: SubjectId, role: Role) -> Self {
        Self { subject_id, role }
    }
}
