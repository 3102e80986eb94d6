//! Live endpoint - builds the transport URL for a scope.
//!
//! ```text
//! SessionImplicit  {ws|wss}://{host}/{namespace}/ws/{feed}/{resource}
//! TokenInQuery     {ws|wss}://{host}/{namespace}/ws/{feed}/{resource}?token={token}
//! ```
//!
//! The endpoint carries a default mode plus per-namespace overrides, so one
//! supervisor can serve session-implicit feeds (`websocket_live`) next to
//! token-in-query feeds (`websocket`).

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::domain::credential::BearerToken;
use crate::domain::live::{LiveUrl, Scope};

/// How the live channel authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveAuthMode {
    /// The connection rides on the ambient session; no token in the URL.
    #[default]
    SessionImplicit,
    /// A bearer token is appended as `?token=`.
    TokenInQuery,
}

/// Errors building a live URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid live host '{0}'")]
    InvalidHost(String),

    #[error("Scope {0} has no resource id")]
    UnresolvedScope(String),

    #[error("Token-in-query mode requires a bearer token")]
    MissingToken,
}

/// Where live feeds are served and how to authenticate to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEndpoint {
    host: String,
    secure: bool,
    auth_mode: LiveAuthMode,
    namespace_modes: Vec<(String, LiveAuthMode)>,
}

impl LiveEndpoint {
    /// Creates an endpoint for `host` (`name` or `name:port`).
    pub fn new(
        host: impl Into<String>,
        secure: bool,
        auth_mode: LiveAuthMode,
    ) -> Result<Self, EndpointError> {
        let host = host.into();
        let trimmed = host.trim();
        if trimmed.is_empty() || trimmed.contains(['/', '?', '#', ' ']) {
            return Err(EndpointError::InvalidHost(host));
        }
        Url::parse(&format!("ws://{}/", trimmed))
            .map_err(|_| EndpointError::InvalidHost(host.clone()))?;

        Ok(Self {
            host: trimmed.to_string(),
            secure,
            auth_mode,
            namespace_modes: Vec::new(),
        })
    }

    /// Overrides the auth mode for every scope in `namespace`.
    pub fn with_namespace_mode(mut self, namespace: impl Into<String>, mode: LiveAuthMode) -> Self {
        let namespace = namespace.into();
        self.namespace_modes.retain(|(ns, _)| *ns != namespace);
        self.namespace_modes.push((namespace, mode));
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Mode used by namespaces without an override.
    pub fn auth_mode(&self) -> LiveAuthMode {
        self.auth_mode
    }

    /// Mode that applies to `scope`.
    pub fn auth_mode_for(&self, scope: &Scope) -> LiveAuthMode {
        self.namespace_modes
            .iter()
            .find(|(ns, _)| ns == scope.namespace())
            .map_or(self.auth_mode, |(_, mode)| *mode)
    }

    fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// Builds the URL for `scope`. `token` is required when the scope's mode
    /// is token-in-query and ignored otherwise.
    pub fn url_for(
        &self,
        scope: &Scope,
        token: Option<&BearerToken>,
    ) -> Result<LiveUrl, EndpointError> {
        let resource = scope
            .resource()
            .ok_or_else(|| EndpointError::UnresolvedScope(scope.to_string()))?;

        let mut url = Url::parse(&format!("{}://{}/", self.scheme(), self.host))
            .map_err(|_| EndpointError::InvalidHost(self.host.clone()))?;

        url.path_segments_mut()
            .map_err(|_| EndpointError::InvalidHost(self.host.clone()))?
            .clear()
            .extend([scope.namespace(), "ws", scope.feed(), resource.as_str()]);

        match self.auth_mode_for(scope) {
            LiveAuthMode::SessionImplicit => Ok(LiveUrl::new(url.to_string())),
            LiveAuthMode::TokenInQuery => {
                let token = token.ok_or(EndpointError::MissingToken)?;
                url.query_pairs_mut().append_pair("token", token.expose());

                // Mask the encoded form, which is what appears in the URL text.
                let encoded = url
                    .query()
                    .and_then(|q| q.strip_prefix("token="))
                    .unwrap_or_default()
                    .to_string();
                Ok(LiveUrl::with_secret(url.to_string(), &encoded))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ResourceId;

    fn gym_scope() -> Scope {
        Scope::new("websocket_live", "live", ResourceId::from(42)).unwrap()
    }

    #[test]
    fn session_implicit_url_has_no_query() {
        let endpoint =
            LiveEndpoint::new("api.fitlive.test", true, LiveAuthMode::SessionImplicit).unwrap();
        let url = endpoint.url_for(&gym_scope(), None).unwrap();
        assert_eq!(url.as_str(), "wss://api.fitlive.test/websocket_live/ws/live/42");
    }

    #[test]
    fn insecure_endpoint_uses_ws_and_keeps_port() {
        let endpoint =
            LiveEndpoint::new("127.0.0.1:8080", false, LiveAuthMode::SessionImplicit).unwrap();
        let url = endpoint.url_for(&gym_scope(), None).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8080/websocket_live/ws/live/42");
    }

    #[test]
    fn token_in_query_appends_and_masks_token() {
        let endpoint =
            LiveEndpoint::new("api.fitlive.test", true, LiveAuthMode::TokenInQuery).unwrap();
        let scope = Scope::new("websocket", "buddy", ResourceId::from(7)).unwrap();
        let token = BearerToken::new("a+b/c").unwrap();

        let url = endpoint.url_for(&scope, Some(&token)).unwrap();

        assert_eq!(
            url.as_str(),
            "wss://api.fitlive.test/websocket/ws/buddy/7?token=a%2Bb%2Fc"
        );
        assert_eq!(
            url.to_string(),
            "wss://api.fitlive.test/websocket/ws/buddy/7?token=***"
        );
    }

    #[test]
    fn token_in_query_without_token_is_rejected() {
        let endpoint = LiveEndpoint::new("h", true, LiveAuthMode::TokenInQuery).unwrap();
        assert_eq!(
            endpoint.url_for(&gym_scope(), None).unwrap_err(),
            EndpointError::MissingToken
        );
    }

    #[test]
    fn namespace_override_mixes_both_modes() {
        let endpoint = LiveEndpoint::new("h", true, LiveAuthMode::SessionImplicit)
            .unwrap()
            .with_namespace_mode("websocket", LiveAuthMode::TokenInQuery);
        let buddy = Scope::new("websocket", "buddy", ResourceId::from(7)).unwrap();
        let token = BearerToken::new("tok").unwrap();

        assert_eq!(endpoint.auth_mode_for(&gym_scope()), LiveAuthMode::SessionImplicit);
        assert_eq!(endpoint.auth_mode_for(&buddy), LiveAuthMode::TokenInQuery);
        assert_eq!(
            endpoint.url_for(&gym_scope(), Some(&token)).unwrap().as_str(),
            "wss://h/websocket_live/ws/live/42"
        );
        assert_eq!(
            endpoint.url_for(&buddy, Some(&token)).unwrap().as_str(),
            "wss://h/websocket/ws/buddy/7?token=tok"
        );
        assert_eq!(endpoint.url_for(&buddy, None), Err(EndpointError::MissingToken));
    }

    #[test]
    fn later_override_replaces_earlier_one() {
        let endpoint = LiveEndpoint::new("h", true, LiveAuthMode::SessionImplicit)
            .unwrap()
            .with_namespace_mode("websocket", LiveAuthMode::TokenInQuery)
            .with_namespace_mode("websocket", LiveAuthMode::SessionImplicit);
        let buddy = Scope::new("websocket", "buddy", ResourceId::from(7)).unwrap();

        assert_eq!(endpoint.auth_mode_for(&buddy), LiveAuthMode::SessionImplicit);
    }

    #[test]
    fn unresolved_scope_has_no_url() {
        let endpoint = LiveEndpoint::new("h", true, LiveAuthMode::SessionImplicit).unwrap();
        let scope = Scope::unresolved("websocket_live", "live").unwrap();
        assert!(matches!(
            endpoint.url_for(&scope, None),
            Err(EndpointError::UnresolvedScope(_))
        ));
    }

    #[test]
    fn bad_hosts_are_rejected() {
        for host in ["", "  ", "host/path", "host?x", "has space"] {
            assert!(
                LiveEndpoint::new(host, true, LiveAuthMode::SessionImplicit).is_err(),
                "{host:?} should be rejected"
            );
        }
    }

    #[test]
    fn auth_mode_deserializes_snake_case() {
        let mode: LiveAuthMode = serde_json::from_str("\"token_in_query\"").unwrap();
        assert_eq!(mode, LiveAuthMode::TokenInQuery);
        assert_eq!(LiveAuthMode::default(), LiveAuthMode::SessionImplicit);
    }
}
