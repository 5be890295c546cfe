//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! Memos and effects carry their own subscriber IDs; [`Subscriber`] is the
//! bare form: a callback that is invoked whenever something it read changes.
//! It cannot be disposed, and it is skipped when a memo's disposal cascades
//! through its dependents.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::runtime::{Reactive, Runtime};

/// Unique identifier for a subscriber.
///
/// Each subscriber (memo, effect, or other reactive computation) gets a unique
/// ID when created. This ID is used to track dependencies and avoid duplicate
/// subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber to reactive values.
///
/// Reads made inside [`track`](Subscriber::track) subscribe it; afterwards
/// the notification callback runs on every change, until the last handle
/// is dropped.
///
/// ```rust,ignore
/// let title = Signal::new(String::from("draft"));
/// let label = Subscriber::new(|| println!("title changed"));
/// label.track(|| title.get());
///
/// title.set(String::from("final")); // prints "title changed"
/// ```
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

struct SubscriberInner {
    id: SubscriberId,
    runtime: Runtime,
    this: Weak<SubscriberInner>,
    /// The callback to invoke when dependencies change.
    notify: Box<dyn Fn() + Send + Sync>,
}

impl Subscriber {
    /// Create a new subscriber in the current thread's default runtime.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new_in(&Runtime::current(), notify)
    }

    /// Create a new subscriber in the given runtime.
    pub fn new_in<F>(runtime: &Runtime, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| SubscriberInner {
            id: SubscriberId::new(),
            runtime: runtime.clone(),
            this: this.clone(),
            notify: Box::new(notify),
        });
        Self { inner }
    }

    /// Get the subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run `f` with this subscriber as the current computation, so every
    /// signal or memo it reads subscribes this subscriber.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        let consumer: Weak<dyn Reactive> = self.inner.this.clone();
        let _ctx = self.inner.runtime.enter((self.inner.id, consumer));
        f()
    }

    /// Notify the subscriber that one of its dependencies changed.
    pub fn notify(&self) {
        (self.inner.notify)();
    }
}

impl Reactive for SubscriberInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn invalidate(&self) {
        tracing::trace!(subscriber = ?self.id, "subscriber notified");
        (self.notify)();
    }
}

impl Clone for Subscriber {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.inner.id).finish()
    }
}
