//! Graph Nodes
//!
//! Identity and dependent bookkeeping for the producer nodes of the graph
//! (signals and memos). Edges are stored only on the producer side, as weak
//! references to the consumers that read it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::reactive::{Reactive, SubscriberId};

/// Unique identifier for a producer node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of producer node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A source node (signal). A root of the graph: it has dependents but
    /// never depends on anything.
    Source,

    /// A derived node (memo). It depends on other nodes and may have
    /// dependents of its own.
    Derived,
}

/// The consumers subscribed to a producer node.
///
/// Keyed by subscriber ID so repeated subscription is idempotent, and kept
/// in insertion order so notification order is stable.
#[derive(Default)]
pub struct Dependents {
    entries: IndexMap<SubscriberId, Weak<dyn Reactive>>,
}

impl Dependents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a consumer. Returns `false` if it was already subscribed.
    pub fn insert(&mut self, id: SubscriberId, consumer: Weak<dyn Reactive>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.insert(id, consumer);
        true
    }

    /// Unsubscribe a consumer. Returns `true` if it was subscribed.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Upgrade every live consumer, in subscription order.
    ///
    /// Consumers whose last handle has been dropped are pruned here.
    pub fn live(&mut self) -> Vec<Arc<dyn Reactive>> {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|_, weak| match weak.upgrade() {
            Some(consumer) => {
                live.push(consumer);
                true
            }
            None => false,
        });
        live
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Dependents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
