//! Effect Queue
//!
//! A FIFO of effects waiting to run. The runtime drains it after every
//! signal write has finished notifying its dependents, and after every
//! effect execution, so no queued work is left behind when control returns
//! to the writer.
//!
//! Most effects never pass through here: invalidation runs them inline. The
//! queue receives explicit re-run requests ([`Effect::schedule`]) and
//! effects invalidated while they are still executing, which must not
//! recurse into themselves.
//!
//! [`Effect::schedule`]: crate::reactive::Effect::schedule

use std::collections::VecDeque;
use std::sync::Weak;

use crate::reactive::Reactive;

/// Pending effect executions, oldest first.
#[derive(Default)]
pub struct EffectQueue {
    queue: VecDeque<Weak<dyn Reactive>>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an effect behind everything already waiting.
    pub fn push(&mut self, effect: Weak<dyn Reactive>) {
        self.queue.push_back(effect);
    }

    /// Take the oldest waiting effect.
    pub fn pop(&mut self) -> Option<Weak<dyn Reactive>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
