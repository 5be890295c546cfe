//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. A memo starts stale and runs its computation on first access,
//!    caching the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns cached value.
//!
//! 3. When a dependency changes, the memo is marked stale and passes the
//!    invalidation on to its own dependents. A memo that is already stale
//!    stops the cascade there.
//!
//! 4. On next access, the memo recomputes.
//!
//! # Why This Matters
//!
//! This "lazy" approach avoids unnecessary recomputation:
//!
//! - A signal changes
//! - 10 memos depend on it
//! - Only the memos actually accessed will recompute
//! - Memos that are never read stay stale (no wasted work)
//!
//! # Disposal
//!
//! A disposed memo keeps its cached value but stops reacting: it ignores
//! invalidation and no longer recomputes. Disposal cascades into every
//! dependent that can itself be disposed.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::context::Dependencies;
use super::runtime::{Reactive, Runtime};
use super::subscriber::SubscriberId;
use crate::error::{ReactiveError, Result};
use crate::graph::{Dependents, NodeId, NodeKind};

/// Staleness of a memo's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo must recompute before its value is returned.
    Stale,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(1);
/// let doubled = Memo::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 2);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

struct MemoInner<T> {
    /// Identity as a producer.
    id: NodeId,

    /// Identity as a consumer.
    subscriber_id: SubscriberId,

    runtime: Runtime,

    this: Weak<MemoInner<T>>,

    /// The computation function.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    state: Mutex<MemoState>,

    disposed: AtomicBool,

    /// Producers read by the most recent computation.
    dependencies: Mutex<Dependencies>,

    /// Computations that read this memo.
    dependents: Mutex<Dependents>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo in the current thread's default runtime.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new_in(&Runtime::current(), compute)
    }

    /// Create a new memo in the given runtime.
    pub fn new_in<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = NodeId::new();
        runtime.register_node(id);
        let inner = Arc::new_cyclic(|this| MemoInner {
            id,
            subscriber_id: SubscriberId::new(),
            runtime: runtime.clone(),
            this: this.clone(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: Mutex::new(MemoState::Stale),
            disposed: AtomicBool::new(false),
            dependencies: Mutex::new(Dependencies::new()),
            dependents: Mutex::new(Dependents::new()),
        });
        Self { inner }
    }

    /// Get the memo's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the subscriber ID for this memo.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the memo reads itself while recomputing; see
    /// [`try_get`](Self::try_get).
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Subscribes the current computation, if any, after the value is
    /// available.
    pub fn try_get(&self) -> Result<T> {
        let inner = &self.inner;
        let value = inner.current_value()?;

        inner.runtime.subscribe_current(inner.id, &inner.dependents);
        inner
            .runtime
            .purge_disposed(inner.id, NodeKind::Derived, &inner.dependents);

        Ok(value)
    }

    /// The last computed value, without recomputing or subscribing.
    pub fn peek(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    /// Stop this memo and every disposable dependent from reacting.
    ///
    /// Edges pointing at it are removed lazily, as each producer is next
    /// touched.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the memo has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the current staleness.
    pub fn state(&self) -> MemoState {
        *self.inner.state.lock()
    }

    /// Get the number of dependents.
    pub fn dependent_count(&self) -> usize {
        self.inner.dependents.lock().len()
    }

    /// Number of producers read by the most recent computation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn current_value(&self) -> Result<T> {
        let cached = self.value.read().clone();

        if self.disposed.load(Ordering::SeqCst) {
            return Ok(match cached {
                Some(value) => value,
                None => self.compute_untracked(),
            });
        }

        match cached {
            Some(value) if *self.state.lock() == MemoState::Clean => Ok(value),
            _ => self.recompute(),
        }
    }

    /// Run the computation within a reactive context to track dependencies.
    fn recompute(&self) -> Result<T> {
        if self.runtime.is_running(self.subscriber_id) {
            return Err(ReactiveError::CycleDetected {
                subscriber: self.subscriber_id,
            });
        }

        let consumer: Weak<dyn Reactive> = self.this.clone();
        let (value, dependencies) = {
            let ctx = self.runtime.enter((self.subscriber_id, consumer));
            let value = (self.compute)();
            (value, ctx.dependencies())
        };

        tracing::trace!(
            node = self.id.raw(),
            dependencies = dependencies.len(),
            "memo recomputed"
        );
        *self.dependencies.lock() = dependencies;
        *self.value.write() = Some(value.clone());
        *self.state.lock() = MemoState::Clean;

        Ok(value)
    }

    /// A disposed memo that was never read computes once, subscribing to
    /// nothing.
    fn compute_untracked(&self) -> T {
        let value = self.runtime.untrack(|| (self.compute)());
        *self.value.write() = Some(value.clone());
        value
    }
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn invalidate(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut state = self.state.lock();
            if *state == MemoState::Stale {
                return;
            }
            *state = MemoState::Stale;
        }

        let dependents = self.dependents.lock().live();
        tracing::trace!(
            node = self.id.raw(),
            dependents = dependents.len(),
            "memo invalidated"
        );
        for dependent in dependents {
            dependent.invalidate();
        }
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.runtime.enqueue_disposal(self.subscriber_id);

        let dependents = self.dependents.lock().live();
        for dependent in dependents.into_iter().filter(|d| d.is_disposable()) {
            dependent.dispose();
        }
    }

    fn is_disposable(&self) -> bool {
        true
    }
}

impl<T> Drop for MemoInner<T> {
    fn drop(&mut self) {
        self.runtime.unregister_node(self.id);
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.dependent_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
