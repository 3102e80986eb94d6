//! Application layer - the services consumers hold on to.
//!
//! Each service is constructed once at startup and passed by reference
//! (`Arc`) to whoever needs it; there is no hidden global state.

mod credential_manager;
pub mod live;

pub use credential_manager::CredentialManager;
pub use live::{ConnectionSupervisor, LiveFeedBinding, Subscription};
