//! Dependency Graph
//!
//! Bookkeeping shared by the reactive primitives.
//!
//! # Overview
//!
//! The graph is a DAG whose edges point from a producer (signal or memo) to
//! the consumers (memos, effects, subscribers) that read it. Edges are
//! discovered implicitly while a consumer runs and are stored only on the
//! producer, as weak references. There is no reverse index, so:
//!
//! - notification walks producer to consumer recursively, with no
//!   topological ordering pass;
//! - disposal is deferred: a disposed consumer is queued, and each producer
//!   removes it from its own dependent set the next time it is touched
//!   (see [`DisposalQueue`]).
//!
//! Effects that cannot run inline wait in the [`EffectQueue`].

mod disposal;
mod node;
mod scheduler;

pub use disposal::DisposalQueue;
pub use node::{Dependents, NodeId, NodeKind};
pub use scheduler::EffectQueue;
