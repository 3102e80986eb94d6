//! LiveFeedBinding - ties a consumer's lifecycle to one registration.
//!
//! A screen or view model owns a binding:
//!
//! ```ignore
//! let mut binding = LiveFeedBinding::mount(supervisor.clone(), scope, Arc::new(on_count));
//! binding.update_listener(Arc::new(on_count_v2)); // no resubscribe
//! binding.update_scope(other_gym);                // resubscribes
//! drop(binding);                                  // unsubscribes exactly once
//! ```
//!
//! The registry only ever sees the binding's forwarding listener, so swapping
//! the consumer's callback never churns the registration.

use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::live::{InboundMessage, Scope};

use super::listener_registry::{ListenerError, LiveListener};
use super::subscription::Subscription;
use super::supervisor::ConnectionSupervisor;

/// Forwards to whichever callback the consumer currently has.
struct Forwarder {
    current: RwLock<Arc<dyn LiveListener>>,
}

impl Forwarder {
    fn current(&self) -> Arc<dyn LiveListener> {
        Arc::clone(&*self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace(&self, listener: Arc<dyn LiveListener>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }
}

impl LiveListener for Forwarder {
    fn on_message(&self, message: &InboundMessage) -> Result<(), ListenerError> {
        self.current().on_message(message)
    }

    fn name(&self) -> &str {
        "feed-binding"
    }
}

/// One consumer's subscription to one scope.
pub struct LiveFeedBinding {
    supervisor: Arc<ConnectionSupervisor>,
    scope: Scope,
    forwarder: Arc<Forwarder>,
    subscription: Option<Subscription>,
}

impl LiveFeedBinding {
    /// Subscribes `listener` to `scope`. An unresolved scope subscribes once
    /// `update_scope` supplies the resource id.
    pub fn mount(
        supervisor: Arc<ConnectionSupervisor>,
        scope: Scope,
        listener: Arc<dyn LiveListener>,
    ) -> Self {
        let mut binding = Self {
            supervisor,
            scope,
            forwarder: Arc::new(Forwarder {
                current: RwLock::new(listener),
            }),
            subscription: None,
        };
        binding.subscribe();
        binding
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// True while the registration is live.
    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Swaps the callback in place. The registration is untouched.
    pub fn update_listener(&self, listener: Arc<dyn LiveListener>) {
        self.forwarder.replace(listener);
    }

    /// Moves the binding to `scope`. Returns false if the scope is unchanged.
    pub fn update_scope(&mut self, scope: Scope) -> bool {
        if scope == self.scope {
            return false;
        }
        tracing::debug!(from = %self.scope, to = %scope, "Feed binding changing scope");
        self.release();
        self.scope = scope;
        self.subscribe();
        true
    }

    /// Re-registers after the scope was stopped and started again, which
    /// clears every listener. Returns true if a new registration was made.
    pub fn ensure_subscribed(&mut self) -> bool {
        if self.is_subscribed() {
            return false;
        }
        self.release();
        self.subscribe()
    }

    /// Releases the registration now.
    pub fn unmount(mut self) {
        self.release();
    }

    fn subscribe(&mut self) -> bool {
        if !self.scope.is_resolved() {
            return false;
        }
        let listener: Arc<dyn LiveListener> = self.forwarder.clone();
        self.subscription = Some(self.supervisor.add(&self.scope, listener));
        true
    }

    fn release(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for LiveFeedBinding {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for LiveFeedBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeedBinding")
            .field("scope", &self.scope)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
