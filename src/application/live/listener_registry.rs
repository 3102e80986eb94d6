//! Listener registry - fan-out of inbound messages for one scope.
//!
//! Many consumers register; only the connection supervisor dispatches.
//! Dispatch iterates a snapshot taken under the lock, so registrations can
//! change mid-dispatch without disturbing the delivery in progress.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::live::{InboundMessage, Scope};

use super::subscription::Subscription;

/// A consumer's failure while handling one message. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Receives every message of the scope it was added to.
///
/// Closures `Fn(&InboundMessage)` implement this directly.
pub trait LiveListener: Send + Sync {
    fn on_message(&self, message: &InboundMessage) -> Result<(), ListenerError>;

    /// Label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> LiveListener for F
where
    F: Fn(&InboundMessage) + Send + Sync,
{
    fn on_message(&self, message: &InboundMessage) -> Result<(), ListenerError> {
        self(message);
        Ok(())
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Handle identifying one `add` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Registered {
    /// Data pointer of the listener `Arc`; equal for clones of one `Arc`.
    key: usize,
    listener: Arc<dyn LiveListener>,
    handles: Vec<ListenerId>,
}

fn identity_of(listener: &Arc<dyn LiveListener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

/// De-duplicated listener set for one scope.
pub struct ListenerRegistry {
    scope: Scope,
    entries: Mutex<Vec<Registered>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Registered>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `listener`. Adding the same `Arc` again returns a second
    /// handle but does not duplicate delivery; the listener stays registered
    /// until every handle has been removed.
    pub fn add(&self, listener: Arc<dyn LiveListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let key = identity_of(&listener);

        let mut entries = self.entries();
        match entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => existing.handles.push(id),
            None => entries.push(Registered {
                key,
                listener,
                handles: vec![id],
            }),
        }

        tracing::debug!(scope = %self.scope, listener = %id, "Listener added");
        id
    }

    /// Registers `listener` and ties the registration to the returned handle.
    pub fn subscribe(self: &Arc<Self>, listener: Arc<dyn LiveListener>) -> Subscription {
        let id = self.add(listener);
        Subscription::new(Arc::downgrade(self), id)
    }

    /// Releases one handle. Returns false if the handle was unknown (already
    /// removed, or cleared with the scope).
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries();
        let Some(index) = entries.iter().position(|e| e.handles.contains(&id)) else {
            return false;
        };

        let entry = &mut entries[index];
        entry.handles.retain(|h| *h != id);
        if entry.handles.is_empty() {
            entries.remove(index);
        }

        tracing::debug!(scope = %self.scope, listener = %id, "Listener removed");
        true
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries().iter().any(|e| e.handles.contains(&id))
    }

    /// Drops every registration.
    pub fn clear(&self) {
        let removed = {
            let mut entries = self.entries();
            std::mem::take(&mut *entries)
        };
        if !removed.is_empty() {
            tracing::debug!(scope = %self.scope, count = removed.len(), "Listeners cleared");
        }
    }

    /// Number of distinct listeners.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Delivers `message` to a snapshot of the current listeners.
    ///
    /// Returns how many listeners handled it without error. A listener that
    /// errors or panics is logged and skipped.
    pub fn dispatch(&self, message: &InboundMessage) -> usize {
        let snapshot: Vec<Arc<dyn LiveListener>> = self
            .entries()
            .iter()
            .map(|e| Arc::clone(&e.listener))
            .collect();

        if snapshot.is_empty() {
            tracing::trace!(scope = %self.scope, kind = message.kind(), "No listeners, message dropped");
            return 0;
        }

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_message(message))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(
                        scope = %self.scope,
                        listener = listener.name(),
                        error = %e,
                        "Listener failed"
                    );
                }
                Err(_) => {
                    tracing::error!(
                        scope = %self.scope,
                        listener = listener.name(),
                        "Listener panicked"
                    );
                }
            }
        }
        delivered
    }

    /// Parses one text frame and dispatches it. Unparseable frames are
    /// dropped and reach no listener.
    pub fn dispatch_frame(&self, text: &str) -> usize {
        match InboundMessage::parse(text) {
            Ok(message) => self.dispatch(&message),
            Err(e) => {
                tracing::debug!(scope = %self.scope, error = %e, "Dropping unparseable frame");
                0
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("scope", &self.scope)
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ResourceId;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> Arc<ListenerRegistry> {
        Arc::new(ListenerRegistry::new(
            Scope::new("websocket_live", "live", ResourceId::from(42)).unwrap(),
        ))
    }

    fn message() -> InboundMessage {
        InboundMessage::parse(r#"{"action":"update_live_count","live_count":7}"#).unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, Arc<dyn LiveListener>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let listener: Arc<dyn LiveListener> = Arc::new(move |_: &InboundMessage| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    struct Failing;

    impl LiveListener for Failing {
        fn on_message(&self, _: &InboundMessage) -> Result<(), ListenerError> {
            Err(ListenerError::new("cannot render"))
        }
    }

    struct Panicking;

    impl LiveListener for Panicking {
        fn on_message(&self, _: &InboundMessage) -> Result<(), ListenerError> {
            panic!("listener bug");
        }
    }

    #[test]
    fn every_listener_receives_each_message_once() {
        let reg = registry();
        let counts: Vec<_> = (0..3)
            .map(|_| {
                let (count, listener) = counter();
                reg.add(listener);
                count
            })
            .collect();

        assert_eq!(reg.dispatch(&message()), 3);
        for count in counts {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn listener_removed_before_dispatch_receives_nothing() {
        let reg = registry();
        let (kept, kept_listener) = counter();
        let (gone, gone_listener) = counter();
        reg.add(kept_listener);
        let id = reg.add(gone_listener);

        assert!(reg.remove(id));
        reg.dispatch(&message());

        assert_eq!(kept.load(Ordering::SeqCst), 1);
        assert_eq!(gone.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn same_arc_is_delivered_once_and_refcounted() {
        let reg = registry();
        let (count, listener) = counter();
        let first = reg.add(Arc::clone(&listener));
        let second = reg.add(listener);

        assert_ne!(first, second);
        assert_eq!(reg.len(), 1);
        reg.dispatch(&message());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(reg.remove(first));
        assert_eq!(reg.len(), 1);
        assert!(reg.remove(second));
        assert!(reg.is_empty());
        assert!(!reg.remove(second));
    }

    #[test]
    fn failing_and_panicking_listeners_do_not_block_others() {
        let reg = registry();
        let (count, listener) = counter();
        reg.add(Arc::new(Failing));
        reg.add(Arc::new(Panicking));
        reg.add(listener);

        assert_eq!(reg.dispatch(&message()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Registry still usable after the panic.
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.dispatch(&message()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removal_during_dispatch_does_not_disturb_snapshot() {
        let reg = registry();
        let (count, counted) = counter();
        let victim_id = Arc::new(Mutex::new(None::<ListenerId>));

        let reg_in_cb = Arc::clone(&reg);
        let victim = Arc::clone(&victim_id);
        reg.add(Arc::new(move |_: &InboundMessage| {
            if let Some(id) = *victim.lock().unwrap() {
                reg_in_cb.remove(id);
            }
        }));
        *victim_id.lock().unwrap() = Some(reg.add(counted));

        // Snapshot was taken before the removal, so this delivery completes.
        assert_eq!(reg.dispatch(&message()), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The next dispatch sees the removal.
        assert_eq!(reg.dispatch(&message()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn malformed_frames_reach_no_listener() {
        let reg = registry();
        let (count, listener) = counter();
        reg.add(listener);

        assert_eq!(reg.dispatch_frame("{not json"), 0);
        assert_eq!(reg.dispatch_frame("[1,2,3]"), 0);
        assert_eq!(reg.dispatch_frame(r#"{"live_count":7}"#), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert_eq!(
            reg.dispatch_frame(r#"{"action":"update_live_count","live_count":7}"#),
            1
        );
    }

    #[test]
    fn dispatch_without_listeners_drops_message() {
        assert_eq!(registry().dispatch(&message()), 0);
    }

    #[test]
    fn clear_removes_everything_and_invalidates_handles() {
        let reg = registry();
        let (_, a) = counter();
        let (_, b) = counter();
        let id = reg.add(a);
        reg.add(b);

        reg.clear();

        assert!(reg.is_empty());
        assert!(!reg.contains(id));
        assert!(!reg.remove(id));
    }
}
