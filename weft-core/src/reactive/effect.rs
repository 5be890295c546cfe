//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs synchronously, before
//!    the write that caused it returns.
//!
//! 3. Each run happens inside its own reactive context, so reads subscribe
//!    the effect and the caller's context is restored afterwards.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Updating a UI tree node when state changes
//! - Logging state changes
//! - Writing to files
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Nothing depends on an effect.
//!
//! # Re-entrancy
//!
//! An effect that is invalidated while it is still running (typically by
//! writing a signal it has read) is not re-entered. It is queued on the
//! runtime's effect queue and runs again once the current run finishes.
//!
//! # Lifetime
//!
//! Signals hold only weak references to the effects that read them; the
//! runtime holds the strong one. An effect keeps running until it is
//! disposed, whether or not any `Effect` handle is still around, so
//! `create_effect(..)` can be used as a plain statement. Because of this
//! an undisposed effect also keeps its runtime alive.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::Dependencies;
use super::runtime::{Reactive, Runtime};
use super::subscriber::SubscriberId;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let effect = Effect::new({
///     let count = count.clone();
///     move || println!("Count is: {}", count.get())
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    runtime: Runtime,

    this: Weak<EffectInner>,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    stale: AtomicBool,

    /// Whether the effect has been disposed.
    disposed: AtomicBool,

    /// Producers read by the most recent run.
    dependencies: Mutex<Dependencies>,

    /// Number of times the effect has run.
    run_count: AtomicUsize,
}

impl Effect {
    /// Create a new effect in the current thread's default runtime.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new_in(&Runtime::current(), run)
    }

    /// Create a new effect in the given runtime.
    pub fn new_in<F>(runtime: &Runtime, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| EffectInner {
            subscriber_id: SubscriberId::new(),
            runtime: runtime.clone(),
            this: this.clone(),
            run: Box::new(run),
            stale: AtomicBool::new(true),
            disposed: AtomicBool::new(false),
            dependencies: Mutex::new(Dependencies::new()),
            run_count: AtomicUsize::new(0),
        });

        runtime.retain_effect(inner.clone());

        // Run immediately to establish dependencies
        inner.execute();

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Request a re-run through the runtime's effect queue.
    ///
    /// The queue is drained before this returns, unless the effect is the
    /// one currently running, in which case it runs right after.
    pub fn schedule(&self) {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        inner.stale.store(true, Ordering::SeqCst);
        inner.runtime.schedule_effect(inner.weak());
        inner.runtime.flush_effects();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again and the runtime lets
    /// go of it.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of producers read by the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }
}

impl EffectInner {
    fn weak(&self) -> Weak<dyn Reactive> {
        self.this.clone()
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn invalidate(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.stale.store(true, Ordering::SeqCst);
        self.execute();
    }

    /// Run the effect function if it is stale.
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) || !self.stale.load(Ordering::SeqCst) {
            return;
        }

        if self.runtime.is_running(self.subscriber_id) {
            tracing::trace!(subscriber = ?self.subscriber_id, "effect re-entered; queued");
            self.runtime.schedule_effect(self.weak());
            return;
        }

        // Cleared before the run so an invalidation during it is not lost.
        self.stale.store(false, Ordering::SeqCst);

        let dependencies = {
            let ctx = self.runtime.enter((self.subscriber_id, self.weak()));
            (self.run)();
            ctx.dependencies()
        };

        let runs = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(
            subscriber = ?self.subscriber_id,
            runs,
            dependencies = dependencies.len(),
            "effect ran"
        );
        *self.dependencies.lock() = dependencies;

        self.runtime.flush_effects();
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.runtime.release_effect(self.subscriber_id);
        self.runtime.enqueue_disposal(self.subscriber_id);
    }

    fn is_disposable(&self) -> bool {
        true
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = runtime.effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_reruns_on_signal_change() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let observed = Arc::new(AtomicI32::new(-1));

        let signal_clone = signal.clone();
        let observed_clone = observed.clone();
        let effect = runtime.effect(move || {
            observed_clone.store(signal_clone.get(), Ordering::SeqCst);
        });
        assert_eq!(observed.load(Ordering::SeqCst), 0);
        assert_eq!(effect.dependency_count(), 1);

        signal.set(42);
        assert_eq!(observed.load(Ordering::SeqCst), 42);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_runs_on_schedule() {
        let runtime = Runtime::new();
        let effect = runtime.effect(|| {});
        assert_eq!(effect.run_count(), 1);

        effect.schedule();
        assert_eq!(effect.run_count(), 2);

        effect.schedule();
        assert_eq!(effect.run_count(), 3);
        assert_eq!(runtime.queued_effects(), 0);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let signal_clone = signal.clone();
        let effect = runtime.effect(move || {
            signal_clone.get();
        });

        effect.dispose();
        assert!(effect.is_disposed());

        signal.set(1);
        effect.schedule();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn nested_effect_restores_outer_consumer() {
        let runtime = Runtime::new();
        let a = runtime.signal(0);
        let b = runtime.signal(0);
        let inner_slot = Arc::new(Mutex::new(Vec::new()));

        let (a_clone, b_clone) = (a.clone(), b.clone());
        let runtime_clone = runtime.clone();
        let slot_clone = inner_slot.clone();
        let outer = runtime.effect(move || {
            let b_inner = b_clone.clone();
            let inner = runtime_clone.effect(move || {
                b_inner.get();
            });
            slot_clone.lock().push(inner);
            // Read after the inner effect ran: must subscribe the outer one
            a_clone.get();
        });

        assert_eq!(outer.dependency_count(), 1);
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);

        a.set(1);
        assert_eq!(outer.run_count(), 2);
        assert_eq!(inner_slot.lock().len(), 2);
    }

    #[test]
    fn self_write_requeues_instead_of_recursing() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let signal_clone = signal.clone();

        let effect = runtime.effect(move || {
            let value = signal_clone.get();
            if value < 3 {
                signal_clone.set(value + 1);
            }
        });

        assert_eq!(signal.peek(), 3);
        assert_eq!(effect.run_count(), 4);
        assert_eq!(runtime.queued_effects(), 0);
    }

    #[test]
    fn dropped_handle_keeps_effect_running() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let run_count = Arc::new(AtomicI32::new(0));

        let signal_clone = signal.clone();
        let run_count_clone = run_count.clone();
        let effect = runtime.effect(move || {
            signal_clone.get();
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let handle = effect.clone();
        drop(effect);
        assert_eq!(runtime.live_effects(), 1);

        signal.set(1);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
        assert_eq!(signal.subscriber_count(), 1);

        handle.dispose();
        assert_eq!(runtime.live_effects(), 0);
        signal.set(2);
        assert_eq!(run_count.load(Ordering::SeqCst), 2);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn disposed_and_dropped_effect_is_freed() {
        let runtime = Runtime::new();
        let signal = runtime.signal(0);
        let signal_clone = signal.clone();
        let effect = runtime.effect(move || {
            signal_clone.get();
        });
        let weak = Arc::downgrade(&effect.inner);

        effect.dispose();
        effect.dispose();
        drop(effect);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = runtime.effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());

        effect1.schedule();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }
}
