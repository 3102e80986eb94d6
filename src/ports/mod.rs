//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the live-feed core and the outside world. Adapters implement these ports.
//!
//! ## Credential Ports
//!
//! - `AuthApi` - Refresh and verify endpoints
//! - `CredentialStore` - Secure persistence of token and identity
//! - `SessionNavigator` - Hand-off to the login screen on forced logout
//!
//! ## Live Channel Ports
//!
//! - `TransportConnector` / `TransportStream` - One socket per scope

mod auth_api;
mod credential_store;
mod live_transport;
mod session_navigator;

pub use auth_api::AuthApi;
pub use credential_store::{CredentialStore, CredentialStoreError};
pub use live_transport::{TransportConnector, TransportError, TransportFrame, TransportStream};
pub use session_navigator::SessionNavigator;
