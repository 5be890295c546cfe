//! Weft Core
//!
//! This crate provides a fine-grained reactive runtime: a small graph of
//! mutable cells, lazily derived cells and side-effecting subscribers, wired
//! together by implicit dependency discovery. It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - Push-based invalidation with pull-based recomputation
//! - Deferred, epoch-coordinated cleanup of disposed consumers
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `graph`: Dependent sets, the disposal queue and the effect queue
//! - `config`: Runtime tunables
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{Runtime, Signal, Memo, Effect};
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = rt.signal(0);
//!
//! // Create a derived value
//! let doubled = rt.memo({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let _effect = rt.effect({
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     move || println!("Count: {}, Doubled: {}", count.get(), doubled.get())
//! });
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{
    create_derived, create_effect, create_source, Effect, Memo, MemoState, Reactive, Runtime,
    Signal, Subscriber, SubscriberId,
};
