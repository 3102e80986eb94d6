//! tokio-tungstenite implementation of the live transport ports.
//!
//! Handles the protocol chores the supervisor should never see: answering
//! server pings, mapping a `401` upgrade response to
//! `TransportError::Unauthorized`, and bounding the connect handshake.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::domain::live::LiveUrl;
use crate::ports::{TransportConnector, TransportError, TransportFrame, TransportStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket connections with a bounded handshake.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl TransportConnector for TungsteniteConnector {
    async fn connect(&self, url: &LiveUrl) -> Result<Box<dyn TransportStream>, TransportError> {
        tracing::debug!(url = %url, "Opening live socket");

        let result = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str())).await;

        match result {
            Ok(Ok((ws, _response))) => Ok(Box::new(TungsteniteStream { ws, closed: false })),
            Ok(Err(WsError::Http(response))) => {
                let status = response.status().as_u16();
                if status == 401 {
                    Err(TransportError::Unauthorized)
                } else {
                    Err(TransportError::Handshake(format!("HTTP {}", status)))
                }
            }
            Ok(Err(e)) => Err(TransportError::Handshake(e.to_string())),
            Err(_) => Err(TransportError::Timeout(self.connect_timeout.as_secs())),
        }
    }
}

/// One open WebSocket.
pub struct TungsteniteStream {
    ws: WsStream,
    closed: bool,
}

fn map_ws_error(e: WsError) -> TransportError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => TransportError::Io(other.to_string()),
    }
}

#[async_trait]
impl TransportStream for TungsteniteStream {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .map_err(map_ws_error)
    }

    async fn recv(&mut self) -> Option<Result<TransportFrame, TransportError>> {
        loop {
            let msg = match self.ws.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(map_ws_error(e))),
            };

            match msg {
                Message::Text(text) => return Some(Ok(TransportFrame::Text(text))),
                Message::Binary(data) => return Some(Ok(TransportFrame::Binary(data))),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Some(Ok(TransportFrame::Close { code, reason }));
                }
                // tungstenite queues the pong itself and flushes it on the next read or write.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.ws.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}
