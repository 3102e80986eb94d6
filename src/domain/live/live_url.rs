//! Fully-built live-channel URL with a log-safe rendering.

use std::fmt;

/// A `ws://` / `wss://` URL ready to hand to a transport.
///
/// `Display` and `Debug` mask any embedded credential so URLs can be
/// logged freely; [`LiveUrl::as_str`] returns the real value.
#[derive(Clone, PartialEq, Eq)]
pub struct LiveUrl {
    url: String,
    masked: String,
}

impl LiveUrl {
    /// Wraps a URL that carries no secret.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            masked: url.clone(),
            url,
        }
    }

    /// Wraps a URL whose text contains `secret`, masking it in logs.
    pub fn with_secret(url: impl Into<String>, secret: &str) -> Self {
        let url = url.into();
        let masked = if secret.is_empty() {
            url.clone()
        } else {
            url.replace(secret, "***")
        };
        Self { url, masked }
    }

    /// The real URL, credential included.
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for LiveUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked)
    }
}

impl fmt::Debug for LiveUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LiveUrl({})", self.masked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_masked_in_display_and_debug() {
        let url = LiveUrl::with_secret("wss://h/websocket/ws/live/1?token=abc123", "abc123");
        assert_eq!(url.as_str(), "wss://h/websocket/ws/live/1?token=abc123");
        assert_eq!(url.to_string(), "wss://h/websocket/ws/live/1?token=***");
        assert!(!format!("{:?}", url).contains("abc123"));
    }

    #[test]
    fn plain_url_displays_verbatim() {
        let url = LiveUrl::new("wss://h/gym-live/ws/live/42");
        assert_eq!(url.to_string(), url.as_str());
    }
}
