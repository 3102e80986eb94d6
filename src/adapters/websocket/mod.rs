//! WebSocket adapters for the live channel.
//!
//! Implementations of the `TransportConnector` / `TransportStream` ports:
//!
//! - `TungsteniteConnector` - Real sockets via tokio-tungstenite
//! - `InMemoryConnector` - Scriptable transport with server-side
//!   `PeerHandle`s for tests and demos

mod in_memory_transport;
mod tungstenite_transport;

pub use in_memory_transport::{InMemoryConnector, PeerHandle};
pub use tungstenite_transport::{TungsteniteConnector, TungsteniteStream};
