//! Error types for the reactive runtime.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Errors surfaced by the reactive runtime.
///
/// Panics raised inside user closures are not represented here; they unwind
/// through the runtime untouched.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A memo read itself, directly or through other memos, while it was
    /// recomputing.
    #[error("dependency cycle detected: {subscriber:?} read itself during recompute")]
    CycleDetected { subscriber: SubscriberId },

    /// Writes performed by reactions to writes nested deeper than the
    /// configured limit.
    #[error("update depth {depth} exceeds the limit of {limit}")]
    UpdateDepthExceeded { depth: usize, limit: usize },

    /// A runtime configuration document could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
