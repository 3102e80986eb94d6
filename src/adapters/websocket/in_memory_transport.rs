//! In-memory live transport for tests.
//!
//! Each successful `connect` yields a `PeerHandle` playing the server side:
//! tests push frames through it and inspect what the client sent.
//!
//! ```ignore
//! let connector = InMemoryConnector::new();
//! // ... start a scope ...
//! let peer = connector.next_peer().await.unwrap();
//! peer.push_text(r#"{"action":"update_live_count","live_count":7}"#);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::live::LiveUrl;
use crate::ports::{TransportConnector, TransportError, TransportFrame, TransportStream};

type Inbound = Result<TransportFrame, TransportError>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable `TransportConnector`.
#[derive(Clone)]
pub struct InMemoryConnector {
    inner: Arc<ConnectorState>,
}

struct ConnectorState {
    failures: Mutex<VecDeque<TransportError>>,
    urls: Mutex<Vec<String>>,
    peers_tx: mpsc::UnboundedSender<PeerHandle>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<PeerHandle>>,
    attempts: AtomicUsize,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ConnectorState {
                failures: Mutex::new(VecDeque::new()),
                urls: Mutex::new(Vec::new()),
                peers_tx,
                peers_rx: tokio::sync::Mutex::new(peers_rx),
                attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// The next connect attempt fails with `error`. Queued failures are
    /// consumed in order before any attempt succeeds.
    pub fn fail_next(&self, error: TransportError) {
        lock(&self.inner.failures).push_back(error);
    }

    /// Every connect attempt made so far, including failed ones.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// URLs of every connect attempt, unmasked.
    pub fn urls(&self) -> Vec<String> {
        lock(&self.inner.urls).clone()
    }

    /// Waits for the next successful connection.
    pub async fn next_peer(&self) -> Option<PeerHandle> {
        self.inner.peers_rx.lock().await.recv().await
    }

    /// Returns an already-established connection without waiting.
    pub async fn try_next_peer(&self) -> Option<PeerHandle> {
        self.inner.peers_rx.lock().await.try_recv().ok()
    }
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportConnector for InMemoryConnector {
    async fn connect(&self, url: &LiveUrl) -> Result<Box<dyn TransportStream>, TransportError> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.urls).push(url.as_str().to_string());

        if let Some(error) = lock(&self.inner.failures).pop_front() {
            return Err(error);
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let close_calls = Arc::new(AtomicUsize::new(0));

        let peer = PeerHandle {
            url: url.as_str().to_string(),
            to_client,
            sent: Arc::clone(&sent),
            close_calls: Arc::clone(&close_calls),
        };
        // The receiver lives as long as the connector.
        let _ = self.inner.peers_tx.send(peer);

        Ok(Box::new(InMemoryStream {
            from_server,
            sent,
            close_calls,
            closed: false,
        }))
    }
}

/// Server side of one in-memory connection.
#[derive(Clone)]
pub struct PeerHandle {
    url: String,
    to_client: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    close_calls: Arc<AtomicUsize>,
}

impl PeerHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Ok(TransportFrame::Text(text.into())));
    }

    pub fn push_binary(&self, data: impl Into<Vec<u8>>) {
        let _ = self.to_client.send(Ok(TransportFrame::Binary(data.into())));
    }

    /// Sends a close frame, as a server going away would.
    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(Ok(TransportFrame::Close {
            code: Some(code),
            reason: String::new(),
        }));
    }

    /// Breaks the connection with an IO error.
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.to_client.send(Err(TransportError::Io(message.into())));
    }

    /// Text frames the client sent, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// How many times the client called `close` on this connection.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether the client still holds its end of the connection.
    pub fn is_client_attached(&self) -> bool {
        !self.to_client.is_closed()
    }
}

/// Client side of one in-memory connection.
struct InMemoryStream {
    from_server: mpsc::UnboundedReceiver<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    close_calls: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl TransportStream for InMemoryStream {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        lock(&self.sent).push(text.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Inbound> {
        if self.closed {
            return None;
        }
        self.from_server.recv().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.from_server.close();
        Ok(())
    }
}
