//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency is written, the effect re-runs synchronously,
//!    before the write returns.
//!
//! 3. Before each run, the effect is removed from every dependency bucket;
//!    the run then records whatever it reads. Branches not taken on the
//!    latest run leave no subscriptions behind.
//!
//! # Re-entrancy
//!
//! An effect that writes to something it reads triggers itself again. The
//! nested run completes before the outer one resumes; nothing is
//! deduplicated. The runtime's `max_effect_depth` bounds how deep this may
//! go and reports [`ReactiveError::RecursionLimit`] when exceeded.
//!
//! # Lifetime
//!
//! The runtime keeps every effect alive until [`Effect::dispose`] is called.
//! Dropping the handle does not stop the effect.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::error::{ReactiveError, Result};

use super::context::ReactiveContext;
use super::runtime::{RuntimeId, RuntimeInner};
use super::subscriber::{Reactive, SubscriberId};

type EffectFn = dyn Fn() -> Result<()> + Send + Sync;

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.reference(0);
///
/// let c = count.clone();
/// let effect = rt
///     .effect(move || {
///         println!("Count is: {}", c.get());
///         Ok(())
///     })
///     .unwrap();
///
/// count.set(5).unwrap(); // Prints: "Count is: 5"
/// assert_eq!(effect.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    id: SubscriberId,
    runtime: Arc<RuntimeInner>,
    run: Box<EffectFn>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
    this: Weak<EffectInner>,
}

impl Effect {
    /// Create the effect, register it and run it once.
    ///
    /// If the first run fails the error is returned, but the effect stays
    /// subscribed to whatever it read before failing.
    pub(crate) fn new<F>(runtime: Arc<RuntimeInner>, run: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| EffectInner {
            id: SubscriberId::new(),
            runtime,
            run: Box::new(run),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            this: this.clone(),
        });

        let as_reactive: Arc<dyn Reactive> = inner.clone();
        inner.runtime.retain(as_reactive);

        inner.execute()?;
        Ok(Self { inner })
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect now, re-collecting its dependencies.
    pub fn execute(&self) -> Result<()> {
        self.inner.execute()
    }

    /// Stop the effect: unsubscribe it everywhere and release it from the
    /// runtime. Later writes and [`execute`](Self::execute) calls do nothing.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let runtime = &self.inner.runtime;
        runtime.unregister(self.inner.id);
        runtime.release(self.inner.id);
        debug!(effect = ?self.inner.id, "disposed effect");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of locations the effect read on its latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.runtime.dependency_count(self.inner.id)
    }
}

impl EffectInner {
    fn execute(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(this) = self.this.upgrade() else {
            return Ok(());
        };

        if let Some(limit) = self.runtime.config().max_effect_depth {
            if ReactiveContext::depth() >= limit {
                warn!(effect = ?self.id, limit, "effect recursion limit reached");
                return Err(ReactiveError::RecursionLimit { limit });
            }
        }

        // Clear old dependencies
        self.runtime.clear_dependencies(self.id);

        // Enter a reactive context to track dependencies
        let _ctx = ReactiveContext::enter(this);
        self.run_count.fetch_add(1, Ordering::SeqCst);

        (self.run)()
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn runtime_id(&self) -> RuntimeId {
        self.runtime.id()
    }

    fn notify(&self) -> Result<()> {
        self.execute()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
