//! In-Memory Credential Store Adapter
//!
//! Keeps the credential in memory. Useful for testing and for sessions that
//! must not touch disk.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::credential::{BearerToken, IdentityReference};
use crate::ports::{CredentialStore, CredentialStoreError};

/// In-memory storage for the credential
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    token: Arc<RwLock<Option<BearerToken>>>,
    identity: Arc<RwLock<Option<IdentityReference>>>,
}

impl InMemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a signed-in session
    pub fn signed_in(identity: IdentityReference, token: Option<BearerToken>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token)),
            identity: Arc::new(RwLock::new(Some(identity))),
        }
    }

    /// Whether any credential material is present
    pub async fn is_empty(&self) -> bool {
        self.token.read().await.is_none() && self.identity.read().await.is_none()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load_token(&self) -> Result<Option<BearerToken>, CredentialStoreError> {
        Ok(self.token.read().await.clone())
    }

    async fn save_token(&self, token: &BearerToken) -> Result<(), CredentialStoreError> {
        *self.token.write().await = Some(token.clone());
        Ok(())
    }

    async fn clear_token(&self) -> Result<(), CredentialStoreError> {
        *self.token.write().await = None;
        Ok(())
    }

    async fn load_identity(&self) -> Result<Option<IdentityReference>, CredentialStoreError> {
        Ok(self.identity.read().await.clone())
    }

    async fn save_identity(
        &self,
        identity: &IdentityReference,
    ) -> Result<(), CredentialStoreError> {
        *self.identity.write().await = Some(identity.clone());
        Ok(())
    }

    async fn clear_identity(&self) -> Result<(), CredentialStoreError> {
        *self.identity.write().await = None;
        Ok(())
    }
}
