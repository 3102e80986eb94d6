//! Live channel configuration

use serde::Deserialize;
use std::time::Duration;

use super::client::Environment;
use super::error::ValidationError;
use crate::application::live::{EndpointError, LiveAuthMode, LiveEndpoint, SupervisorConfig};
use crate::domain::live::ReconnectPolicy;

/// Live channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LiveConfig {
    /// Host serving the live feeds (`name` or `name:port`)
    pub host: String,

    /// Use `wss://` instead of `ws://`
    #[serde(default = "default_secure")]
    pub secure: bool,

    /// How the channel authenticates
    #[serde(default)]
    pub auth_mode: LiveAuthMode,

    /// Namespace whose feeds always carry `?token=`; empty disables
    #[serde(default = "default_token_namespace")]
    pub token_namespace: String,

    /// Seconds between keepalive frames
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial_ms: u64,

    /// Reconnect delay cap in milliseconds
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,

    /// Consecutive failed connects before giving up
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_max_attempts: u32,

    /// Fraction of each delay randomized away
    #[serde(default = "default_reconnect_jitter")]
    pub reconnect_jitter: f64,

    /// Handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl LiveConfig {
    /// Get the handshake timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Build the reconnect schedule
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::default()
            .with_initial_delay(Duration::from_millis(self.reconnect_initial_ms))
            .with_max_delay(Duration::from_millis(self.reconnect_max_ms))
            .with_max_attempts(self.reconnect_max_attempts)
            .with_jitter(self.reconnect_jitter)
    }

    /// Build the supervisor tuning
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_keepalive_interval(Duration::from_secs(self.keepalive_secs))
            .with_reconnect(self.reconnect_policy())
    }

    /// Build the URL endpoint
    pub fn endpoint(&self) -> Result<LiveEndpoint, EndpointError> {
        let endpoint = LiveEndpoint::new(&self.host, self.secure, self.auth_mode)?;
        if self.token_namespace.is_empty() {
            return Ok(endpoint);
        }
        Ok(endpoint.with_namespace_mode(&self.token_namespace, LiveAuthMode::TokenInQuery))
    }

    /// Validate live channel configuration
    ///
    /// In production, requires `wss://`.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.host.is_empty() {
            return Err(ValidationError::MissingRequired("LIVE__HOST"));
        }
        self.endpoint()
            .map_err(|_| ValidationError::InvalidLiveHost)?;
        if *environment == Environment::Production && !self.secure {
            return Err(ValidationError::LiveMustBeSecure);
        }
        if self.keepalive_secs == 0 || self.keepalive_secs > 300 {
            return Err(ValidationError::InvalidKeepalive);
        }
        if self.reconnect_initial_ms == 0 {
            return Err(ValidationError::InvalidReconnect("initial delay must be positive"));
        }
        if self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(ValidationError::InvalidReconnect("initial delay exceeds max delay"));
        }
        if !(0.0..=1.0).contains(&self.reconnect_jitter) {
            return Err(ValidationError::InvalidReconnect("jitter must be within 0..=1"));
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            secure: default_secure(),
            auth_mode: LiveAuthMode::default(),
            token_namespace: default_token_namespace(),
            keepalive_secs: default_keepalive(),
            reconnect_initial_ms: default_reconnect_initial(),
            reconnect_max_ms: default_reconnect_max(),
            reconnect_max_attempts: default_reconnect_attempts(),
            reconnect_jitter: default_reconnect_jitter(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_secure() -> bool {
    true
}

fn default_token_namespace() -> String {
    "websocket".to_string()
}

fn default_keepalive() -> u64 {
    25
}

fn default_reconnect_initial() -> u64 {
    500
}

fn default_reconnect_max() -> u64 {
    30_000
}

fn default_reconnect_attempts() -> u32 {
    8
}

fn default_reconnect_jitter() -> f64 {
    0.2
}

fn default_connect_timeout() -> u64 {
    10
}
