//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`] owns a stack of frames. Running a memo, an effect or a
//! subscriber's tracked closure pushes a frame naming that consumer; the
//! returned guard pops it when dropped. Because the pop happens in `Drop`,
//! the caller's consumer is restored on every exit path, unwinding included,
//! and nested computations never see each other's subscriptions.
//!
//! A frame may also name no consumer at all. Reads under such a frame are
//! untracked, even if a consumer further down the stack is active.

use std::sync::Weak;

use smallvec::SmallVec;

use super::runtime::{Reactive, Runtime};
use super::SubscriberId;
use crate::graph::NodeId;

/// A consumer reference as stored in a frame.
pub(crate) type Consumer = (SubscriberId, Weak<dyn Reactive>);

/// Producer nodes read during a single frame.
pub(crate) type Dependencies = SmallVec<[NodeId; 4]>;

/// An entry in the reactive context stack.
struct Frame {
    /// The computation that owns reads made in this frame, or `None` for an
    /// untracked section.
    consumer: Option<Consumer>,
    /// Producers read while this frame was on top, without duplicates.
    dependencies: Dependencies,
}

/// The per-runtime stack of running computations.
#[derive(Default)]
pub(crate) struct ContextStack {
    frames: Vec<Frame>,
}

impl ContextStack {
    fn push(&mut self, consumer: Option<Consumer>) -> usize {
        self.frames.push(Frame {
            consumer,
            dependencies: SmallVec::new(),
        });
        self.frames.len()
    }

    fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The consumer reads should be attributed to right now.
    pub(crate) fn current(&self) -> Option<&Consumer> {
        self.frames.last().and_then(|frame| frame.consumer.as_ref())
    }

    /// Whether the given consumer is running anywhere on the stack.
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.frames
            .iter()
            .any(|frame| matches!(&frame.consumer, Some((running, _)) if *running == id))
    }

    /// Record a read of `node` in the top frame and return the consumer to
    /// subscribe, if the read is tracked.
    pub(crate) fn track(&mut self, node: NodeId) -> Option<Consumer> {
        let frame = self.frames.last_mut()?;
        let consumer = frame.consumer.clone()?;
        if !frame.dependencies.contains(&node) {
            frame.dependencies.push(node);
        }
        Some(consumer)
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    fn dependencies_at(&self, depth: usize) -> Dependencies {
        depth
            .checked_sub(1)
            .and_then(|index| self.frames.get(index))
            .map(|frame| frame.dependencies.clone())
            .unwrap_or_default()
    }
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    runtime: Runtime,
    subscriber_id: Option<SubscriberId>,
    depth: usize,
}

impl ReactiveContext {
    /// Push a frame for `consumer` (or an untracked frame for `None`).
    pub(crate) fn enter(runtime: &Runtime, consumer: Option<Consumer>) -> Self {
        let subscriber_id = consumer.as_ref().map(|(id, _)| *id);
        let depth = runtime.stack().push(consumer);
        Self {
            runtime: runtime.clone(),
            subscriber_id,
            depth,
        }
    }

    /// The consumer this frame belongs to, if it is tracked.
    pub fn subscriber_id(&self) -> Option<SubscriberId> {
        self.subscriber_id
    }

    /// Producers read so far in this frame.
    pub(crate) fn dependencies(&self) -> Dependencies {
        self.runtime.stack().dependencies_at(self.depth)
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let mut stack = self.runtime.stack();
        debug_assert_eq!(
            stack.depth(),
            self.depth,
            "ReactiveContext dropped out of order"
        );

        if let Some(frame) = stack.pop() {
            debug_assert_eq!(
                frame.consumer.as_ref().map(|(id, _)| *id),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}",
                self.subscriber_id,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Noop(SubscriberId);

    impl Reactive for Noop {
        fn subscriber_id(&self) -> SubscriberId {
            self.0
        }

        fn invalidate(&self) {}
    }

    fn consumer(noop: &Arc<dyn Reactive>) -> Option<Consumer> {
        Some((noop.subscriber_id(), Arc::downgrade(noop)))
    }

    #[test]
    fn context_tracks_subscriber() {
        let runtime = Runtime::new();
        let noop: Arc<dyn Reactive> = Arc::new(Noop(SubscriberId::new()));
        let id = noop.subscriber_id();

        assert!(!runtime.is_tracking());
        assert!(runtime.current_subscriber().is_none());

        {
            let ctx = ReactiveContext::enter(&runtime, consumer(&noop));
            assert_eq!(ctx.subscriber_id(), Some(id));
            assert!(runtime.is_tracking());
            assert_eq!(runtime.current_subscriber(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!runtime.is_tracking());
        assert!(runtime.current_subscriber().is_none());
    }

    #[test]
    fn context_tracks_dependencies_once() {
        let runtime = Runtime::new();
        let noop: Arc<dyn Reactive> = Arc::new(Noop(SubscriberId::new()));
        let ctx = ReactiveContext::enter(&runtime, consumer(&noop));

        let a = NodeId::new();
        let b = NodeId::new();
        runtime.stack().track(a);
        runtime.stack().track(b);
        runtime.stack().track(a);

        assert_eq!(ctx.dependencies().as_slice(), &[a, b]);
    }

    #[test]
    fn nested_contexts_restore_outer() {
        let runtime = Runtime::new();
        let outer: Arc<dyn Reactive> = Arc::new(Noop(SubscriberId::new()));
        let inner: Arc<dyn Reactive> = Arc::new(Noop(SubscriberId::new()));

        {
            let _outer = ReactiveContext::enter(&runtime, consumer(&outer));
            assert_eq!(runtime.current_subscriber(), Some(outer.subscriber_id()));

            {
                let _inner = ReactiveContext::enter(&runtime, consumer(&inner));
                assert_eq!(runtime.current_subscriber(), Some(inner.subscriber_id()));
                assert!(runtime.stack().contains(outer.subscriber_id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(runtime.current_subscriber(), Some(outer.subscriber_id()));
        }

        assert!(runtime.current_subscriber().is_none());
    }

    #[test]
    fn untracked_frame_hides_outer_consumer() {
        let runtime = Runtime::new();
        let outer: Arc<dyn Reactive> = Arc::new(Noop(SubscriberId::new()));
        let _outer = ReactiveContext::enter(&runtime, consumer(&outer));

        let untracked = ReactiveContext::enter(&runtime, None);
        assert!(untracked.subscriber_id().is_none());
        assert!(runtime.current_subscriber().is_none());
        assert!(runtime.stack().track(NodeId::new()).is_none());
        assert!(untracked.dependencies().is_empty());
    }

    #[test]
    fn frame_is_popped_on_panic() {
        let runtime = Runtime::new();
        let noop: Arc<dyn Reactive> = Arc::new(Noop(SubscriberId::new()));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(&runtime, consumer(&noop));
            panic!("computation failed");
        }));

        assert!(result.is_err());
        assert_eq!(runtime.stack().depth(), 0);
    }
}
