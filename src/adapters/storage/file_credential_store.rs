//! File-based Credential Store Adapter
//!
//! Persists the bearer token and the identity reference in one YAML file.
//! Writes go to a sibling temp file which is then renamed over the target,
//! so a crash mid-write never leaves a truncated credential behind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::credential::{BearerToken, IdentityReference};
use crate::ports::{CredentialStore, CredentialStoreError};

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityReference>,
}

/// File-based storage for the credential.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the YAML file at `path`.
    ///
    /// # Example
    /// ```ignore
    /// let store = FileCredentialStore::new("~/.fitlive/credentials.yaml");
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StoredCredentials, CredentialStoreError> {
        let yaml = match fs::read_to_string(&self.path).await {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredCredentials::default())
            }
            Err(e) => return Err(CredentialStoreError::Io(e.to_string())),
        };

        if yaml.trim().is_empty() {
            return Ok(StoredCredentials::default());
        }

        serde_yaml::from_str(&yaml).map_err(|e| CredentialStoreError::Corrupt(e.to_string()))
    }

    async fn write(&self, stored: &StoredCredentials) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CredentialStoreError::Io(e.to_string()))?;
            }
        }

        let yaml = serde_yaml::to_string(stored)
            .map_err(|e| CredentialStoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml)
            .await
            .map_err(|e| CredentialStoreError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| CredentialStoreError::Io(e.to_string()))
    }

    async fn update<F>(&self, f: F) -> Result<(), CredentialStoreError>
    where
        F: FnOnce(&mut StoredCredentials) + Send,
    {
        let mut stored = self.read().await?;
        f(&mut stored);
        self.write(&stored).await
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_token(&self) -> Result<Option<BearerToken>, CredentialStoreError> {
        match self.read().await?.access_token {
            Some(raw) => BearerToken::new(raw)
                .map(Some)
                .map_err(|e| CredentialStoreError::Corrupt(e.to_string())),
            None => Ok(None),
        }
    }

    async fn save_token(&self, token: &BearerToken) -> Result<(), CredentialStoreError> {
        let raw = token.expose().to_string();
        self.update(move |s| s.access_token = Some(raw)).await
    }

    async fn clear_token(&self) -> Result<(), CredentialStoreError> {
        self.update(|s| s.access_token = None).await
    }

    async fn load_identity(&self) -> Result<Option<IdentityReference>, CredentialStoreError> {
        Ok(self.read().await?.identity)
    }

    async fn save_identity(
        &self,
        identity: &IdentityReference,
    ) -> Result<(), CredentialStoreError> {
        let identity = identity.clone();
        self.update(move |s| s.identity = Some(identity)).await
    }

    async fn clear_identity(&self) -> Result<(), CredentialStoreError> {
        self.update(|s| s.identity = None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::Role;
    use crate::domain::foundation::SubjectId;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("nested").join("credentials.yaml"))
    }

    fn identity() -> IdentityReference {
        IdentityReference::new(SubjectId::new("u1").unwrap(), Role::new("coach").unwrap())
    }

    #[tokio::test]
    async fn missing_file_loads_as_signed_out() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.load_token().await.unwrap().is_none());
        assert!(store.load_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_and_identity_persist_independently() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save_identity(&identity()).await.unwrap();
        store.save_token(&BearerToken::new("t1").unwrap()).await.unwrap();
        store.save_token(&BearerToken::new("t2").unwrap()).await.unwrap();

        let reopened = store_in(&dir);
        assert_eq!(reopened.load_token().await.unwrap().unwrap().expose(), "t2");
        assert_eq!(reopened.load_identity().await.unwrap(), Some(identity()));

        reopened.clear_token().await.unwrap();
        assert!(reopened.load_token().await.unwrap().is_none());
        assert_eq!(reopened.load_identity().await.unwrap(), Some(identity()));
    }

    #[tokio::test]
    async fn clearing_an_empty_store_succeeds() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.clear_token().await.unwrap();
        store.clear_identity().await.unwrap();
        assert!(store.load_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_file_is_reported_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.yaml");
        tokio::fs::write(&path, "access_token: [unclosed").await.unwrap();

        let store = FileCredentialStore::new(&path);
        let err = store.load_token().await.unwrap_err();
        assert!(matches!(err, CredentialStoreError::Corrupt(_)));
    }
}
