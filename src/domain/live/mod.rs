//! Live module - value types for scoped live feeds.
//!
//! - `scope` - which feed a consumer is looking at
//! - `message` - the inbound `{action|kind, ...}` envelope
//! - `connection_state` - per-scope transport lifecycle and status
//! - `reconnect` - bounded backoff schedule
//! - `live_url` - transport URL with credential masking

mod connection_state;
mod live_url;
mod message;
mod reconnect;
mod scope;

pub use connection_state::{CloseReason, ConnectionState, ScopeStatus};
pub use live_url::LiveUrl;
pub use message::{InboundMessage, MessageParseError, DISCRIMINATOR_FIELDS};
pub use reconnect::ReconnectPolicy;
pub use scope::Scope;
