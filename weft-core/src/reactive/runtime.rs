//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns everything the graph shares: the context stack, the
//! pending-disposal queue and the effect queue.
//!
//! # How It Works
//!
//! 1. When a memo, effect or subscriber runs, it pushes a frame onto the
//!    runtime's context stack.
//!
//! 2. When a signal or memo is read, the runtime hands it the consumer on
//!    top of the stack, which the producer adds to its dependent set.
//!
//! 3. When a signal's value changes, the signal:
//!    a. Invalidates each of its dependents, in subscription order
//!    b. Memos mark themselves stale and pass the invalidation on
//!    c. Effects re-run immediately
//!    d. Memos are lazy - they recompute on next access
//!
//!    and then the runtime drains its effect queue.
//!
//! # Independent Graphs
//!
//! Each [`Runtime`] is a separate graph with no hidden shared state, which
//! keeps tests deterministic. Constructors without an explicit runtime
//! (`Signal::new`, [`create_source`], ...) use the calling thread's default
//! runtime from [`Runtime::current`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};

use super::context::{Consumer, ContextStack, ReactiveContext};
use super::subscriber::{Subscriber, SubscriberId};
use super::{Effect, Memo, Signal};
use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{Dependents, DisposalQueue, EffectQueue, NodeId, NodeKind};

/// A trait for types that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Called when something this value read has changed.
    fn invalidate(&self);

    /// Run a pending execution (effects only).
    fn execute(&self) {}

    /// Stop receiving notifications (disposable consumers only).
    fn dispose(&self) {}

    /// Whether [`dispose`](Reactive::dispose) does anything. Disposal of a
    /// memo cascades only into dependents for which this is `true`.
    fn is_disposable(&self) -> bool {
        false
    }
}

thread_local! {
    static DEFAULT_RUNTIME: Runtime = Runtime::new();
}

/// A reactive graph.
///
/// Cloning a `Runtime` yields another handle to the same graph.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    stack: Mutex<ContextStack>,
    disposals: Mutex<DisposalQueue>,
    effects: Mutex<EffectQueue>,
    /// Every effect that has not been disposed. Producers only hold weak
    /// references, so this is what keeps an effect running without a handle.
    live_effects: Mutex<IndexMap<SubscriberId, Arc<dyn Reactive>>>,
    /// Nesting level of write and effect-drain passes.
    update_depth: AtomicUsize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create an independent runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create an independent runtime.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let disposals = DisposalQueue::new(config.pending_disposal_warn_threshold);
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                stack: Mutex::new(ContextStack::default()),
                disposals: Mutex::new(disposals),
                effects: Mutex::new(EffectQueue::new()),
                live_effects: Mutex::new(IndexMap::new()),
                update_depth: AtomicUsize::new(0),
            }),
        }
    }

    /// The calling thread's default runtime.
    pub fn current() -> Self {
        DEFAULT_RUNTIME.with(Runtime::clone)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Whether two handles refer to the same graph.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Create a signal in this runtime.
    pub fn signal<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        Signal::new_in(self, value)
    }

    /// Create a signal in this runtime that uses `equals` to decide whether
    /// a write changes its value.
    pub fn signal_with_equality<T, E>(&self, value: T, equals: E) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Signal::with_equality_in(self, value, equals)
    }

    /// Create a memo in this runtime.
    pub fn memo<T, F>(&self, compute: F) -> Memo<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Memo::new_in(self, compute)
    }

    /// Create an effect in this runtime. It runs once before returning and
    /// stays alive until disposed, whether or not the handle is kept.
    pub fn effect<F>(&self, run: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        Effect::new_in(self, run)
    }

    /// Create a plain subscriber in this runtime.
    pub fn subscriber<F>(&self, notify: F) -> Subscriber
    where
        F: Fn() + Send + Sync + 'static,
    {
        Subscriber::new_in(self, notify)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.stack().current().map(|(id, _)| *id)
    }

    /// Check if reads right now would subscribe someone.
    pub fn is_tracking(&self) -> bool {
        self.stack().current().is_some()
    }

    /// Run `f` without tracking: reads inside it subscribe no one.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::enter(self, None);
        f()
    }

    /// Disposals not yet purged by every live signal and memo.
    pub fn pending_disposals(&self) -> usize {
        self.inner.disposals.lock().len()
    }

    /// Effects waiting in the effect queue.
    pub fn queued_effects(&self) -> usize {
        self.inner.effects.lock().len()
    }

    /// Effects created in this runtime and not yet disposed.
    pub fn live_effects(&self) -> usize {
        self.inner.live_effects.lock().len()
    }

    pub(crate) fn stack(&self) -> MutexGuard<'_, ContextStack> {
        self.inner.stack.lock()
    }

    /// Push a frame for `consumer`; it is popped when the guard drops.
    pub(crate) fn enter(&self, consumer: Consumer) -> ReactiveContext {
        ReactiveContext::enter(self, Some(consumer))
    }

    /// Whether the consumer is currently executing.
    pub(crate) fn is_running(&self, id: SubscriberId) -> bool {
        self.stack().contains(id)
    }

    /// Subscribe the current consumer, if any, to a producer node.
    pub(crate) fn subscribe_current(&self, node: NodeId, dependents: &Mutex<Dependents>) {
        let Some((id, consumer)) = self.stack().track(node) else {
            return;
        };
        if dependents.lock().insert(id, consumer) {
            tracing::trace!(node = node.raw(), subscriber = ?id, "subscribed");
        }
    }

    pub(crate) fn register_node(&self, node: NodeId) {
        self.inner.disposals.lock().register(node);
    }

    pub(crate) fn unregister_node(&self, node: NodeId) {
        self.inner.disposals.lock().unregister(node);
    }

    /// Queue a disposed consumer for removal from every dependent set.
    pub(crate) fn enqueue_disposal(&self, id: SubscriberId) {
        let epoch = self.inner.disposals.lock().enqueue(id);
        tracing::debug!(subscriber = ?id, epoch, "disposal queued");
    }

    /// Remove pending disposals from a producer's dependent set and record
    /// that this producer has caught up.
    pub(crate) fn purge_disposed(
        &self,
        node: NodeId,
        kind: NodeKind,
        dependents: &Mutex<Dependents>,
    ) {
        let (ids, through) = {
            let queue = self.inner.disposals.lock();
            if queue.is_empty() {
                return;
            }
            queue.pending_for(node)
        };

        if !ids.is_empty() {
            let mut dependents = dependents.lock();
            let removed = ids.into_iter().filter(|id| dependents.remove(*id)).count();
            if removed > 0 {
                tracing::debug!(node = node.raw(), ?kind, removed, "purged disposed dependents");
            }
        }

        let released = self.inner.disposals.lock().mark_purged(node, through);
        if released > 0 {
            tracing::debug!(released, "disposals purged everywhere");
        }
    }

    /// Enter one more level of nested updates.
    pub(crate) fn begin_update(&self) -> Result<UpdateGuard<'_>> {
        let depth = self.inner.update_depth.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = UpdateGuard {
            depth: &self.inner.update_depth,
        };

        let limit = self.inner.config.max_update_depth;
        if depth > limit {
            return Err(ReactiveError::UpdateDepthExceeded { depth, limit });
        }
        Ok(guard)
    }

    /// Keep an effect alive until it is disposed.
    pub(crate) fn retain_effect(&self, effect: Arc<dyn Reactive>) {
        let id = effect.subscriber_id();
        self.inner.live_effects.lock().insert(id, effect);
    }

    /// Drop the runtime's reference to a disposed effect.
    pub(crate) fn release_effect(&self, id: SubscriberId) {
        // Dropped after the lock is released: the effect's closure may own
        // other effect handles.
        let released = self.inner.live_effects.lock().shift_remove(&id);
        if released.is_some() {
            tracing::trace!(subscriber = ?id, "effect released");
        }
    }

    /// Queue an effect behind everything already waiting.
    pub(crate) fn schedule_effect(&self, effect: Weak<dyn Reactive>) {
        self.inner.effects.lock().push(effect);
    }

    /// Run queued effects until the queue is empty.
    ///
    /// Effects that are still executing further up the stack are put back
    /// and run by the drain that follows their execution.
    pub(crate) fn flush_effects(&self) {
        if self.inner.effects.lock().is_empty() {
            return;
        }

        let _update = match self.begin_update() {
            Ok(guard) => guard,
            Err(err) => {
                tracing::error!(%err, queued = self.queued_effects(), "effect queue not drained");
                return;
            }
        };

        let mut deferred = Vec::new();
        let mut ran = 0usize;
        loop {
            let next = self.inner.effects.lock().pop();
            let Some(weak) = next else {
                break;
            };
            let Some(effect) = weak.upgrade() else {
                continue;
            };
            if self.is_running(effect.subscriber_id()) {
                deferred.push(weak);
                continue;
            }
            effect.execute();
            ran += 1;
        }

        if !deferred.is_empty() {
            let mut queue = self.inner.effects.lock();
            for weak in deferred {
                queue.push(weak);
            }
        }

        if ran > 0 {
            tracing::debug!(ran, "effect queue drained");
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("stack_depth", &self.stack().depth())
            .field("pending_disposals", &self.pending_disposals())
            .field("queued_effects", &self.queued_effects())
            .field("live_effects", &self.live_effects())
            .finish()
    }
}

/// Decrements the update depth when dropped.
pub(crate) struct UpdateGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Create a signal in the current thread's default runtime.
pub fn create_source<T>(value: T) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Runtime::current().signal(value)
}

/// Create a memo in the current thread's default runtime.
pub fn create_derived<T, F>(compute: F) -> Memo<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Runtime::current().memo(compute)
}

/// Create an effect in the current thread's default runtime.
///
/// The effect keeps running after the returned handle is dropped, until it
/// is disposed.
pub fn create_effect<F>(run: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Runtime::current().effect(run)
}
