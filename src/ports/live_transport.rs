//! Live transport port - the socket under one scope's live feed.
//!
//! The connection supervisor is the only caller. Consumers never see a
//! transport; they only register listeners.

use async_trait::async_trait;

use crate::domain::live::LiveUrl;

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The upgrade handshake was refused with 401.
    #[error("Live channel rejected credentials")]
    Unauthorized,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Connect timed out after {0}s")]
    Timeout(u64),

    #[error("Transport IO error: {0}")]
    Io(String),

    #[error("Transport already closed")]
    Closed,
}

/// One frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Text(String),
    Binary(Vec<u8>),
    /// The peer closed the connection.
    Close { code: Option<u16>, reason: String },
}

/// Opens transports.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, url: &LiveUrl) -> Result<Box<dyn TransportStream>, TransportError>;
}

/// An open, bidirectional text transport.
///
/// `recv` must be cancel safe: the supervisor races it against keepalive and
/// shutdown timers.
#[async_trait]
pub trait TransportStream: Send {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Next frame, or `None` once the stream has ended.
    async fn recv(&mut self) -> Option<Result<TransportFrame, TransportError>>;

    /// Closes the transport. Called at most once per stream by the supervisor.
    async fn close(&mut self) -> Result<(), TransportError>;
}
