//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Default limit on synchronous effect and computed nesting.
pub const DEFAULT_MAX_EFFECT_DEPTH: usize = 100;

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of nested computation frames an effect run or a
    /// computed evaluation may start in.
    ///
    /// An effect that writes to something it reads re-triggers itself
    /// recursively, and computeds that read each other evaluate recursively.
    /// When the nesting reaches this depth the run fails with
    /// [`ReactiveError::RecursionLimit`](crate::ReactiveError::RecursionLimit).
    /// `None` disables the check.
    pub max_effect_depth: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_effect_depth: Some(DEFAULT_MAX_EFFECT_DEPTH),
        }
    }
}

impl RuntimeConfig {
    /// A configuration with no recursion guard.
    pub fn unbounded() -> Self {
        Self {
            max_effect_depth: None,
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
