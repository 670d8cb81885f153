//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first read, the computed runs its getter inside its own tracking
//!    frame and caches the result.
//!
//! 2. When read again, if no dependency has changed, the cache is returned
//!    without calling the getter.
//!
//! 3. When a dependency is written, the computed is invalidated. It marks
//!    itself dirty and the write carries on to whatever read *it*, but the
//!    getter does not re-run. Invalidation reaches every computed downstream
//!    of the write before any effect re-runs.
//!
//! 4. The next read finds the dirty flag, re-runs the getter and caches
//!    again.
//!
//! Reads of a computed are tracked under the computed's own identity with
//! the key `"value"`, so an effect reading a computed that reads another
//! computed is reached by a write to the innermost source: each layer passes
//! the notification outward.
//!
//! # Failure Modes
//!
//! If the getter fails, the error is returned from the read, the previous
//! cache stays in place and the flag stays dirty so the next read retries.
//!
//! Computeds that read each other in a cycle nest one evaluation inside the
//! next; the runtime's `max_effect_depth` bounds this the same way it bounds
//! effects, failing the read with [`ReactiveError::RecursionLimit`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::warn;

use crate::error::{ReactiveError, Result};

use super::context::ReactiveContext;
use super::key::{PropertyKey, TargetId};
use super::runtime::{RuntimeId, RuntimeInner};
use super::subscriber::{Reactive, SubscriberId};

type Getter<T> = dyn Fn() -> Result<T> + Send + Sync;

/// A cached derived value that recomputes lazily after its dependencies
/// change.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.reference(2);
///
/// let c = count.clone();
/// let doubled = rt.computed(move || Ok(c.get() * 2));
/// assert_eq!(doubled.get().unwrap(), 4);
///
/// count.set(5).unwrap();
/// assert!(doubled.is_dirty());
/// assert_eq!(doubled.get().unwrap(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    /// Identity as a subscriber of the getter's reads.
    id: SubscriberId,

    /// Identity as a target that other computations read.
    target: TargetId,
    key: PropertyKey,

    runtime: Arc<RuntimeInner>,
    getter: Box<Getter<T>>,

    /// The cached value (None if never computed).
    cached: RwLock<Option<T>>,
    dirty: AtomicBool,
    evaluations: AtomicUsize,

    this: Weak<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new computed. The getter does not run until the first read.
    pub(crate) fn new<F>(runtime: Arc<RuntimeInner>, getter: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| ComputedInner {
            id: SubscriberId::new(),
            target: TargetId::new(),
            key: PropertyKey::value(),
            runtime,
            getter: Box::new(getter),
            cached: RwLock::new(None),
            dirty: AtomicBool::new(true),
            evaluations: AtomicUsize::new(0),
            this: this.clone(),
        });

        let as_reactive: Arc<dyn Reactive> = inner.clone();
        inner.runtime.register(&as_reactive);

        Self { inner }
    }

    /// Get the subscriber ID for this computed.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Identity under which reads of this computed are tracked.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context this also records the current computation
    /// as a dependent of this computed.
    pub fn get(&self) -> Result<T> {
        self.inner
            .runtime
            .track(self.inner.target, &self.inner.key);

        if !self.inner.dirty.load(Ordering::SeqCst) {
            if let Some(value) = self.inner.cached.read().clone() {
                return Ok(value);
            }
        }
        self.inner.evaluate()
    }

    /// Whether the next read will call the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.cached.read().is_some()
    }

    /// Number of times the getter has been called.
    pub fn evaluations(&self) -> usize {
        self.inner.evaluations.load(Ordering::SeqCst)
    }

    /// Number of computations currently depending on this computed.
    pub fn dependent_count(&self) -> usize {
        self.inner
            .runtime
            .dependent_count(self.inner.target, &self.inner.key)
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run the getter within a reactive context to track dependencies.
    fn evaluate(&self) -> Result<T> {
        let Some(this) = self.this.upgrade() else {
            return (self.getter)();
        };

        if let Some(limit) = self.runtime.config().max_effect_depth {
            if ReactiveContext::depth() >= limit {
                warn!(computed = ?self.id, limit, "computed recursion limit reached");
                return Err(ReactiveError::RecursionLimit { limit });
            }
        }

        self.runtime.clear_dependencies(self.id);

        let value = {
            let _ctx = ReactiveContext::enter(this);
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            (self.getter)()?
        };

        *self.cached.write() = Some(value.clone());
        self.dirty.store(false, Ordering::SeqCst);
        Ok(value)
    }
}

impl<T> Reactive for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn runtime_id(&self) -> RuntimeId {
        self.runtime.id()
    }

    fn invalidate(&self) -> Option<(TargetId, PropertyKey)> {
        self.dirty.store(true, Ordering::SeqCst);
        Some((self.target, self.key.clone()))
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        self.runtime.unregister(self.id);
        self.runtime.forget_target(self.target);
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.target)
            .field("cached", &*self.inner.cached.read())
            .field("dirty", &self.is_dirty())
            .field("dependent_count", &self.dependent_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
