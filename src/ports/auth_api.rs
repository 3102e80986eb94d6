//! Auth API port - the two REST calls the credential manager depends on.
//!
//! - `POST /auth/refresh` with `{id, role}` mints a new bearer token
//! - `GET /auth/verify` with `Authorization: Bearer <token>` checks one
//!
//! Implementations exist for HTTP (reqwest) and for tests (`MockAuthApi`).

use async_trait::async_trait;

use crate::domain::credential::{BearerToken, IdentityReference};
use crate::domain::foundation::AuthError;

/// Remote authority that issues and verifies bearer tokens.
///
/// # Contract
///
/// Implementations must:
/// - Make exactly one network round trip per call (no internal retry)
/// - Return `AuthError::RefreshRejected` for non-success refresh statuses
/// - Return `AuthError::ServiceUnavailable` for network/timeout failures
/// - Return `Ok(false)` from `verify` when the server answers non-200
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Requests a new bearer token for the stored identity.
    async fn refresh(&self, identity: &IdentityReference) -> Result<BearerToken, AuthError>;

    /// Asks the server whether `token` is still accepted.
    async fn verify(&self, token: &BearerToken) -> Result<bool, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credential::Role;
    use crate::domain::foundation::SubjectId;

    /// Issues `token-<subject>` and accepts anything starting with `token-`.
    struct EchoAuthApi;

    #[async_trait]
    impl AuthApi for EchoAuthApi {
        async fn refresh(&self, identity: &IdentityReference) -> Result<BearerToken, AuthError> {
            BearerToken::new(format!("token-{}", identity.subject_id))
                .map_err(|e| AuthError::MalformedResponse(e.to_string()))
        }

        async fn verify(&self, token: &BearerToken) -> Result<bool, AuthError> {
            Ok(token.expose().starts_with("token-"))
        }
    }

    #[tokio::test]
    async fn auth_api_refresh_then_verify() {
        let api = EchoAuthApi;
        let identity = IdentityReference::new(
            SubjectId::new("u1").unwrap(),
            Role::new("member").unwrap(),
        );

        let token = api.refresh(&identity).await.unwrap();
        assert_eq!(token.expose(), "token-u1");
        assert!(api.verify(&token).await.unwrap());
        assert!(!api.verify(&BearerToken::new("other").unwrap()).await.unwrap());
    }

    #[test]
    fn auth_api_trait_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn AuthApi) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn AuthApi>>();
    }
}
