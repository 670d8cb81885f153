//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: effects,
//! watchers and computeds.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

use super::key::{PropertyKey, TargetId};
use super::runtime::RuntimeId;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. The dependency registry
/// stores these IDs in its buckets, so an ID is what gets recorded on read and
/// what gets removed on cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be notified when one of its dependencies changes.
pub trait Reactive: Send + Sync {
    /// The subscriber ID recorded in dependency buckets.
    fn subscriber_id(&self) -> SubscriberId;

    /// The runtime whose registry this subscriber records into.
    fn runtime_id(&self) -> RuntimeId;

    /// Called on every subscriber a write reaches, before any of them is
    /// notified.
    ///
    /// Derived values mark themselves stale here and return the location
    /// their own readers are tracked under, so the write reaches those
    /// readers too. Subscribers returning `None` are notified afterwards.
    fn invalidate(&self) -> Option<(TargetId, PropertyKey)> {
        None
    }

    /// Called synchronously once every subscriber reached by a write has
    /// been invalidated. Effects re-run here.
    fn notify(&self) -> Result<()> {
        Ok(())
    }
}
