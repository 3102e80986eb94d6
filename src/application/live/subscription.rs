//! Subscription - the disposer returned by `add`.

use std::sync::Weak;

use super::listener_registry::{ListenerId, ListenerRegistry};

/// Keeps one listener registered until released.
///
/// Dropping the handle unsubscribes. Releasing twice, or after the scope was
/// cleared, is a no-op.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: Option<ListenerId>,
}

impl Subscription {
    pub(crate) fn new(registry: Weak<ListenerRegistry>, id: ListenerId) -> Self {
        Self {
            registry,
            id: Some(id),
        }
    }

    pub fn id(&self) -> Option<ListenerId> {
        self.id
    }

    /// True while the listener is still registered. Turns false after
    /// `unsubscribe`, or once the scope was stopped.
    pub fn is_active(&self) -> bool {
        match (self.id, self.registry.upgrade()) {
            (Some(id), Some(registry)) => registry.contains(id),
            _ => false,
        }
    }

    /// Removes the listener. Returns true the first time, if it was still
    /// registered.
    pub fn unsubscribe(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        match self.registry.upgrade() {
            Some(registry) => registry.remove(id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
