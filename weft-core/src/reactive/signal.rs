//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (memo/effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are notified.
//!
//! 3. Notifications trigger re-execution of dependent computations.
//!
//! Both reads and writes first purge disposed consumers from the signal's
//! subscriber set (see [`DisposalQueue`](crate::graph::DisposalQueue)).
//!
//! # Change Detection
//!
//! A write that leaves the value equal to the current one is a no-op.
//! Equality is `PartialEq` by default; [`Signal::with_equality`] takes a
//! custom comparison, e.g. `Arc::ptr_eq` to compare by identity.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::runtime::Runtime;
use crate::error::Result;
use crate::graph::{Dependents, NodeId, NodeKind};

type Equality<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A reactive signal holding a value of type T.
///
/// # Type Parameters
///
/// - `T`: The type of value stored in the signal. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    id: NodeId,
    runtime: Runtime,
    value: RwLock<T>,
    equals: Equality<T>,
    /// Computations that read this signal.
    dependents: Mutex<Dependents>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        self.runtime.unregister_node(self.id);
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal in the current thread's default runtime.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::new_in(&Runtime::current(), value)
    }

    /// Create a new signal in the given runtime.
    pub fn new_in(runtime: &Runtime, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equality_in(runtime, value, T::eq)
    }

    /// Create a signal whose writes are compared with `equals`.
    pub fn with_equality<E>(value: T, equals: E) -> Self
    where
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self::with_equality_in(&Runtime::current(), value, equals)
    }

    /// Create a signal in the given runtime whose writes are compared with
    /// `equals`.
    pub fn with_equality_in<E>(runtime: &Runtime, value: T, equals: E) -> Self
    where
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let id = NodeId::new();
        runtime.register_node(id);
        Self {
            inner: Arc::new(SignalInner {
                id,
                runtime: runtime.clone(),
                value: RwLock::new(value),
                equals: Box::new(equals),
                dependents: Mutex::new(Dependents::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The runtime this signal belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        inner
            .runtime
            .purge_disposed(inner.id, NodeKind::Source, &inner.dependents);
        inner.runtime.subscribe_current(inner.id, &inner.dependents);

        inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    pub fn peek(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// # Panics
    ///
    /// Panics if the write is nested deeper than the runtime's
    /// `max_update_depth`; see [`try_set`](Self::try_set).
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            panic!("{err}");
        }
    }

    /// Set a new value and notify subscribers.
    ///
    /// Every dependent is invalidated (memos go stale, effects re-run), then
    /// the effect queue is drained. Writing a value equal to the current one
    /// does nothing.
    pub fn try_set(&self, value: T) -> Result<()> {
        let inner = &self.inner;
        let runtime = &inner.runtime;
        runtime.purge_disposed(inner.id, NodeKind::Source, &inner.dependents);

        if (inner.equals)(&*inner.value.read(), &value) {
            tracing::trace!(node = inner.id.raw(), "write skipped: value unchanged");
            return Ok(());
        }

        let _update = runtime.begin_update()?;
        *inner.value.write() = value;

        let dependents = inner.dependents.lock().live();
        tracing::trace!(
            node = inner.id.raw(),
            dependents = dependents.len(),
            "signal changed"
        );
        for dependent in dependents {
            dependent.invalidate();
        }

        runtime.flush_effects();
        Ok(())
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value. `f`
    /// sees a copy of the value, so it may read or write this signal itself.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.peek();
        self.set(f(&current));
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dependents.lock().len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.peek())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    use crate::config::RuntimeConfig;
    use crate::ReactiveError;

    #[test]
    fn signal_get_and_set() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
        assert_eq!(signal.peek(), 42);
    }

    #[test]
    fn signal_update() {
        let runtime = Runtime::new();
        let signal = runtime.signal(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let subscriber = runtime.subscriber(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscriber.track(|| signal.get());

        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.set(2);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn equal_write_is_a_noop() {
        let runtime = Runtime::new();
        let signal = runtime.signal(7);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let subscriber = runtime.subscriber(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscriber.track(|| signal.get());

        signal.set(7);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_equality_compares_identity() {
        let runtime = Runtime::new();
        let first = Arc::new(String::from("same"));
        let signal = runtime.signal_with_equality(first.clone(), |a, b| Arc::ptr_eq(a, b));
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let subscriber = runtime.subscriber(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        subscriber.track(|| signal.get());

        signal.set(first.clone());
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        // Equal contents, different allocation
        signal.set(Arc::new(String::from("same")));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn peek_does_not_subscribe() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let subscriber = runtime.subscriber(|| {});

        subscriber.track(|| signal.peek());
        assert_eq!(signal.subscriber_count(), 0);

        subscriber.track(|| signal.get());
        subscriber.track(|| signal.get());
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn signal_clone_shares_state() {
        let runtime = Runtime::new();
        let signal1 = runtime.signal(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn runaway_writes_hit_the_depth_limit() {
        let runtime = Runtime::with_config(RuntimeConfig::default().with_max_update_depth(4));
        let signal = runtime.signal(0);
        let outcome = Arc::new(parking_lot::Mutex::new(None));

        let signal_clone = signal.clone();
        let outcome_clone = outcome.clone();
        let subscriber = runtime.subscriber(move || {
            if let Err(err) = signal_clone.try_set(signal_clone.peek() + 1) {
                *outcome_clone.lock() = Some(err);
            }
        });
        subscriber.track(|| signal.get());

        signal.set(1);
        assert!(matches!(
            *outcome.lock(),
            Some(ReactiveError::UpdateDepthExceeded { limit: 4, .. })
        ));
        assert_eq!(signal.peek(), 4);
    }

    #[test]
    fn update_may_write_the_same_signal() {
        let runtime = Runtime::new();
        let signal = runtime.signal(1);

        let signal_clone = signal.clone();
        signal.update(|value| {
            signal_clone.set(value + 10);
            value + 1
        });

        assert_eq!(signal.peek(), 2);
    }

    #[test]
    fn panicking_effect_leaves_runtime_usable() {
        let runtime = Runtime::with_config(RuntimeConfig::default().with_max_update_depth(1));
        let signal = runtime.signal(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let run_count_clone = run_count.clone();
        let _effect = runtime.effect(move || {
            if signal_clone.get() == 13 {
                panic!("unlucky value");
            }
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| signal.set(13)));
        assert!(result.is_err());
        assert_eq!(runtime.stack().depth(), 0);
        assert!(runtime.current_subscriber().is_none());
        assert!(runtime.begin_update().is_ok());

        // The depth limit of one still admits a top-level write
        signal.set(14);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
    }
}
