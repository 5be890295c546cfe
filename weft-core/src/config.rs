//! Runtime Configuration
//!
//! Tunables for a [`Runtime`](crate::reactive::Runtime). Every field has a
//! default, so a configuration document only needs to name the values it
//! overrides:
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json(r#"{ "max_update_depth": 32 }"#)?;
//! let runtime = Runtime::with_config(config);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default limit for nested write/notify passes.
pub const DEFAULT_MAX_UPDATE_DEPTH: usize = 100;

/// Default size of the pending-disposal list above which a warning is logged.
pub const DEFAULT_PENDING_DISPOSAL_WARN_THRESHOLD: usize = 1024;

/// Configuration for a reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How deeply signal writes may nest. A write made by an effect that is
    /// itself reacting to a write counts one level deeper. Exceeding the
    /// limit fails the innermost write with
    /// [`ReactiveError::UpdateDepthExceeded`](crate::ReactiveError::UpdateDepthExceeded).
    pub max_update_depth: usize,

    /// Pending disposals that may accumulate before a warning is logged.
    /// The list only shrinks once every live signal and memo has purged it,
    /// so a cell that is never touched again keeps it growing.
    pub pending_disposal_warn_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_update_depth: DEFAULT_MAX_UPDATE_DEPTH,
            pending_disposal_warn_threshold: DEFAULT_PENDING_DISPOSAL_WARN_THRESHOLD,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the maximum nested update depth.
    pub fn with_max_update_depth(mut self, depth: usize) -> Self {
        self.max_update_depth = depth;
        self
    }

    /// Set the pending-disposal warning threshold.
    pub fn with_pending_disposal_warn_threshold(mut self, threshold: usize) -> Self {
        self.pending_disposal_warn_threshold = threshold;
        self
    }
}
