//! Error types for the reactive engine.
//!
//! Every fallible operation returns [`Result`]. Errors raised inside user
//! code (effect bodies, computed getters, watch callbacks) travel back out
//! through whatever triggered the run: the initial `effect()` call or the
//! `set` that caused the re-run. Nothing is caught or retried on the way.

use std::error::Error as StdError;

use thiserror::Error;

use crate::reactive::PropertyKey;

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors produced by the reactive engine.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A key that was not present when the object was wrapped was read or
    /// written.
    #[error("property '{key}' does not exist on the target object")]
    PropertyNotFound {
        /// The missing key.
        key: PropertyKey,
    },

    /// A value that was expected to be an object was something else.
    #[error("expected an object, got {kind}")]
    NotAnObject {
        /// Type name of the value that was supplied.
        kind: &'static str,
    },

    /// Effects re-triggered each other deeper than the runtime allows.
    #[error("effect nesting exceeded the configured depth of {limit}")]
    RecursionLimit {
        /// The configured maximum depth.
        limit: usize,
    },

    /// A failure raised by user code.
    #[error("callback failed: {0}")]
    Callback(#[source] Box<dyn StdError + Send + Sync>),
}

impl ReactiveError {
    /// Wrap an arbitrary user error so it can be returned from an effect,
    /// getter or watch callback.
    pub fn callback<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self::Callback(err.into())
    }

    pub(crate) fn property_not_found(key: &PropertyKey) -> Self {
        Self::PropertyNotFound { key: key.clone() }
    }
}
