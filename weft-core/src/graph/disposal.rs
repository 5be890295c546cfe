//! Disposal Queue
//!
//! Disposing a consumer has to sever every edge that points at it, but edges
//! live only on the producer side and there is no reverse index from a
//! consumer to the producers that list it. Instead, each producer purges its
//! own dependent set the next time it is read or written.
//!
//! # Epochs
//!
//! Every disposal is tagged with a strictly increasing epoch. Each live
//! producer carries a watermark: the newest epoch it has already purged.
//! A pending entry can be dropped from the queue once every live producer's
//! watermark has reached it, which stays correct even when some producers
//! are never touched again (they simply hold the queue open until they are
//! touched or dropped).
//!
//! Producers created after a disposal start with a watermark at the current
//! epoch, since nothing disposed before they existed can be subscribed to
//! them.

use std::collections::{HashMap, VecDeque};

use super::node::NodeId;
use crate::reactive::SubscriberId;

/// The pending-disposal list plus per-producer purge watermarks.
#[derive(Debug)]
pub struct DisposalQueue {
    /// Epoch of the most recent disposal.
    epoch: u64,
    /// Disposed consumers not yet purged by every live producer.
    pending: VecDeque<(u64, SubscriberId)>,
    /// Newest epoch each live producer has purged.
    watermarks: HashMap<NodeId, u64>,
    warn_threshold: usize,
    warned: bool,
}

impl DisposalQueue {
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            epoch: 0,
            pending: VecDeque::new(),
            watermarks: HashMap::new(),
            warn_threshold,
            warned: false,
        }
    }

    /// Start tracking a newly created producer.
    pub fn register(&mut self, node: NodeId) {
        self.watermarks.insert(node, self.epoch);
    }

    /// Stop tracking a dropped producer. Entries it was holding open are
    /// released.
    pub fn unregister(&mut self, node: NodeId) {
        self.watermarks.remove(&node);
        self.collect();
    }

    /// Record a disposal. Repeated disposal of the same consumer is recorded
    /// again; removal from a dependent set is idempotent.
    pub fn enqueue(&mut self, subscriber: SubscriberId) -> u64 {
        self.epoch += 1;
        self.pending.push_back((self.epoch, subscriber));

        if self.pending.len() > self.warn_threshold && !self.warned {
            self.warned = true;
            tracing::warn!(
                pending = self.pending.len(),
                threshold = self.warn_threshold,
                "pending disposals are accumulating; some signal or memo has not been touched since"
            );
        }

        self.epoch
    }

    /// Consumers the given producer still has to purge, and the epoch to
    /// report back through [`mark_purged`](Self::mark_purged) once it has.
    pub fn pending_for(&self, node: NodeId) -> (Vec<SubscriberId>, u64) {
        let mark = self.watermarks.get(&node).copied().unwrap_or(0);
        let ids = self
            .pending
            .iter()
            .filter(|(epoch, _)| *epoch > mark)
            .map(|(_, id)| *id)
            .collect();
        (ids, self.epoch)
    }

    /// Advance a producer's watermark and drop entries every live producer
    /// has now purged. Returns the number of entries dropped.
    pub fn mark_purged(&mut self, node: NodeId, through: u64) -> usize {
        if let Some(mark) = self.watermarks.get_mut(&node) {
            *mark = (*mark).max(through);
        }
        self.collect()
    }

    fn collect(&mut self) -> usize {
        let floor = self
            .watermarks
            .values()
            .copied()
            .min()
            .unwrap_or(self.epoch);

        let before = self.pending.len();
        while matches!(self.pending.front(), Some((epoch, _)) if *epoch <= floor) {
            self.pending.pop_front();
        }

        if self.pending.len() <= self.warn_threshold {
            self.warned = false;
        }
        before - self.pending.len()
    }

    /// Number of disposals not yet purged everywhere.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_clears_only_after_every_producer_purges() {
        let mut queue = DisposalQueue::new(16);
        let signal = NodeId::new();
        let memo = NodeId::new();
        queue.register(signal);
        queue.register(memo);

        let disposed = SubscriberId::new();
        queue.enqueue(disposed);

        let (ids, through) = queue.pending_for(signal);
        assert_eq!(ids, vec![disposed]);
        assert_eq!(queue.mark_purged(signal, through), 0);
        assert_eq!(queue.len(), 1);

        // Already purged by the signal, so nothing left for it.
        assert!(queue.pending_for(signal).0.is_empty());

        let (ids, through) = queue.pending_for(memo);
        assert_eq!(ids, vec![disposed]);
        assert_eq!(queue.mark_purged(memo, through), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn untouched_producer_holds_entries_until_dropped() {
        let mut queue = DisposalQueue::new(16);
        let busy = NodeId::new();
        let idle = NodeId::new();
        queue.register(busy);
        queue.register(idle);

        queue.enqueue(SubscriberId::new());
        let (_, through) = queue.pending_for(busy);
        queue.mark_purged(busy, through);
        assert_eq!(queue.len(), 1);

        queue.unregister(idle);
        assert!(queue.is_empty());
    }

    #[test]
    fn late_producers_skip_earlier_disposals() {
        let mut queue = DisposalQueue::new(16);
        let early = NodeId::new();
        queue.register(early);
        queue.enqueue(SubscriberId::new());

        let late = NodeId::new();
        queue.register(late);
        assert!(queue.pending_for(late).0.is_empty());
    }

    #[test]
    fn repeated_disposal_is_recorded_each_time() {
        let mut queue = DisposalQueue::new(16);
        let node = NodeId::new();
        queue.register(node);

        let id = SubscriberId::new();
        let first = queue.enqueue(id);
        let second = queue.enqueue(id);
        assert!(second > first);
        assert_eq!(queue.pending_for(node).0, vec![id, id]);
    }

    #[test]
    fn no_producers_means_nothing_to_hold() {
        let mut queue = DisposalQueue::new(16);
        queue.enqueue(SubscriberId::new());
        queue.unregister(NodeId::new());
        assert!(queue.is_empty());
    }
}
