//! Observable References
//!
//! A [`Ref`] is a single-slot observable. Reading it records the ref itself,
//! under the synthetic key `"value"`, as a dependency of the running
//! computation.
//!
//! Unlike object fields, a ref does not compare values on write: every
//! [`set`](Ref::set) triggers its dependents, even when the new value equals
//! the old one. This is also why `T` needs no equality bound.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;

use super::key::{PropertyKey, TargetId};
use super::runtime::RuntimeInner;
use super::value::Value;

/// A reactive single-value box.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.reference(0);
///
/// count.set(5).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
pub struct Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<RefInner<T>>,
}

struct RefInner<T> {
    id: TargetId,
    key: PropertyKey,
    runtime: Arc<RuntimeInner>,
    value: RwLock<T>,
}

impl<T> Drop for RefInner<T> {
    fn drop(&mut self) {
        self.runtime.forget_target(self.id);
    }
}

impl<T> Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(runtime: Arc<RuntimeInner>, value: T) -> Self {
        Self {
            inner: Arc::new(RefInner {
                id: TargetId::new(),
                key: PropertyKey::value(),
                runtime,
                value: RwLock::new(value),
            }),
        }
    }

    /// Identity of this ref in the dependency registry.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a dependent.
    pub fn get(&self) -> T {
        self.inner.runtime.track(self.inner.id, &self.inner.key);
        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Store a new value and re-run every dependent.
    pub fn set(&self, value: T) -> Result<()> {
        let previous = std::mem::replace(&mut *self.inner.value.write(), value);
        drop(previous);

        self.inner.runtime.trigger(self.inner.id, &self.inner.key)
    }

    /// Update the value using a function of the current one.
    ///
    /// The current value is read untracked.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let guard = self.inner.value.read();
            f(&guard)
        };
        self.set(next)
    }

    /// Number of computations currently depending on this ref.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .runtime
            .dependent_count(self.inner.id, &self.inner.key)
    }
}

impl Ref<Value> {
    /// Store a JSON value, wrapping any objects it contains.
    pub fn set_json(&self, json: serde_json::Value) -> Result<()> {
        let value = self.inner.runtime.wrap_json(json);
        self.set(value)
    }
}

impl<T> Clone for Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Ref<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
