//! HTTP Auth API - reqwest implementation of the `AuthApi` port.
//!
//! # Endpoints
//!
//! ```text
//! POST {base}/auth/refresh   {"id": "...", "role": "..."}  -> 200 {"access_token": "..."}
//! GET  {base}/auth/verify    Authorization: Bearer <token> -> 200 | non-200
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::domain::credential::{BearerToken, IdentityReference};
use crate::domain::foundation::AuthError;
use crate::ports::AuthApi;

/// Body of `POST /auth/refresh`.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    id: &'a str,
    role: &'a str,
}

/// Success body of `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// `AuthApi` backed by the REST auth service.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    /// Creates a client for the service rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::service_unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn refresh_url(&self) -> String {
        format!("{}/auth/refresh", self.base_url)
    }

    fn verify_url(&self) -> String {
        format!("{}/auth/verify", self.base_url)
    }

    fn network_error(e: reqwest::Error) -> AuthError {
        if e.is_timeout() {
            AuthError::service_unavailable("request timed out")
        } else {
            AuthError::service_unavailable(e.to_string())
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn refresh(&self, identity: &IdentityReference) -> Result<BearerToken, AuthError> {
        let body = RefreshRequest {
            id: identity.subject_id.as_str(),
            role: identity.role.as_str(),
        };

        let response = self
            .client
            .post(self.refresh_url())
            .json(&body)
            .send()
            .await
            .map_err(Self::network_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

        BearerToken::new(parsed.access_token)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }

    async fn verify(&self, token: &BearerToken) -> Result<bool, AuthError> {
        let response = self
            .client
            .get(self.verify_url())
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .send()
            .await
            .map_err(Self::network_error)?;

        Ok(response.status() == StatusCode::OK)
    }
}
