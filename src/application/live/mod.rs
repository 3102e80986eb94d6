//! Live feed services.
//!
//! - `ConnectionSupervisor` - owns one transport per visible scope
//! - `ListenerRegistry` - per-scope fan-out with snapshot dispatch
//! - `Subscription` - disposer returned by `add`
//! - `LiveFeedBinding` - consumer-lifecycle helper over `add`
//! - `LiveEndpoint` - URL builder for both authentication modes

mod endpoint;
mod feed_binding;
mod listener_registry;
mod subscription;
mod supervisor;

pub use endpoint::{EndpointError, LiveAuthMode, LiveEndpoint};
pub use feed_binding::LiveFeedBinding;
pub use listener_registry::{ListenerError, ListenerId, ListenerRegistry, LiveListener};
pub use subscription::Subscription;
pub use supervisor::{
    ConnectionSupervisor, SupervisorConfig, KEEPALIVE_FRAME, MIN_KEEPALIVE_INTERVAL,
};
