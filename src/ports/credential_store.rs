//! Credential store port - the secure store holding the bearer token and the
//! identity reference.
//!
//! Token and identity are stored separately: the token is replaced on every
//! refresh while the identity lives until logout.

use async_trait::async_trait;

use crate::domain::credential::{BearerToken, IdentityReference};
use crate::domain::foundation::AuthError;

/// Errors that can occur in credential store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Failed to serialize credentials: {0}")]
    Serialization(String),

    #[error("Stored credentials are corrupt: {0}")]
    Corrupt(String),
}

impl From<CredentialStoreError> for AuthError {
    fn from(err: CredentialStoreError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// Port for persisting the credential across app launches.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the bearer token, `None` if signed out.
    async fn load_token(&self) -> Result<Option<BearerToken>, CredentialStoreError>;

    /// Replaces the stored bearer token.
    async fn save_token(&self, token: &BearerToken) -> Result<(), CredentialStoreError>;

    /// Removes the stored bearer token. Succeeds if none was stored.
    async fn clear_token(&self) -> Result<(), CredentialStoreError>;

    /// Loads the identity reference used for refresh.
    async fn load_identity(&self) -> Result<Option<IdentityReference>, CredentialStoreError>;

    /// Replaces the stored identity reference.
    async fn save_identity(&self, identity: &IdentityReference)
        -> Result<(), CredentialStoreError>;

    /// Removes the identity reference. Succeeds if none was stored.
    async fn clear_identity(&self) -> Result<(), CredentialStoreError>;
}
