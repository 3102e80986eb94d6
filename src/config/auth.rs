//! Authentication configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::client::Environment;
use super::error::ValidationError;

/// Auth service and credential storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the REST auth service (`/auth/refresh`, `/auth/verify`)
    pub api_base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Where the credential file lives
    #[serde(default = "default_credential_path")]
    pub credential_path: PathBuf,
}

impl AuthConfig {
    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate authentication configuration
    ///
    /// In production, requires HTTPS for the auth API.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.api_base_url.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__API_BASE_URL"));
        }
        let url =
            reqwest::Url::parse(&self.api_base_url).map_err(|_| ValidationError::InvalidApiUrl)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidApiUrl);
        }
        if *environment == Environment::Production && url.scheme() != "https" {
            return Err(ValidationError::ApiMustBeHttps);
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            request_timeout_secs: default_request_timeout(),
            credential_path: default_credential_path(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10
}

fn default_credential_path() -> PathBuf {
    PathBuf::from(".fitlive/credentials.yaml")
}
