//! Reactive Runtime
//!
//! The runtime owns the dependency registry that connects observables to the
//! computations reading them, and is the entry point for creating every
//! reactive primitive.
//!
//! # How It Works
//!
//! 1. When an observable is read inside a running computation, the runtime
//!    records the computation's ID in the bucket for `(target, key)`.
//!
//! 2. Before a computation re-runs, the runtime removes its ID from every
//!    bucket, so its dependencies are exactly what it read on its latest run.
//!
//! 3. When an observable is written, the runtime walks the bucket for
//!    `(target, key)`. Computeds found there are marked dirty and their own
//!    readers are walked in turn; every effect reached is queued once.
//!
//! 4. Only then are the queued effects re-run, synchronously and in order,
//!    so none of them can observe a computed that has not yet been marked
//!    dirty by the write.
//!
//! # Trigger Snapshots
//!
//! Subscribers routinely change the bucket being triggered (every re-run
//! clears and re-records). Iterating the live set would observe those edits,
//! so the runtime runs a queue built before the first effect starts. An
//! effect that a sibling caused to unsubscribe may therefore still run once
//! from the queue; a disposed effect is skipped.
//!
//! # Thread Safety
//!
//! The registry lives in concurrent maps and no lock is held while user code
//! runs, so a runtime is `Send + Sync`. The execution context is
//! thread-local, which means each thread tracks its own computations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};

use super::computed::Computed;
use super::context::ReactiveContext;
use super::effect::Effect;
use super::key::{PropertyKey, TargetId};
use super::object::ReactiveObject;
use super::reference::Ref;
use super::subscriber::{Reactive, SubscriberId};
use super::value::Value;
use super::watch::{self, WatchSource};

/// Identity of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(u64);

impl RuntimeId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Subscribers of one location.
type Bucket = IndexSet<SubscriberId>;

/// Snapshot of a bucket taken before triggering.
pub(crate) type Dependents = SmallVec<[SubscriberId; 4]>;

/// Shared state behind a [`Runtime`] handle.
pub(crate) struct RuntimeInner {
    id: RuntimeId,
    config: RuntimeConfig,

    /// Target → key → subscribers.
    deps: DashMap<TargetId, IndexMap<PropertyKey, Bucket>>,

    /// Every live subscriber, by ID. Weak so that computeds can be dropped by
    /// their owners.
    subscribers: DashMap<SubscriberId, Weak<dyn Reactive>>,

    /// Effects stay alive here until disposed, whether or not the caller
    /// kept the handle.
    retained: DashMap<SubscriberId, Arc<dyn Reactive>>,
}

impl RuntimeInner {
    pub(crate) fn id(&self) -> RuntimeId {
        self.id
    }

    pub(crate) fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Make a subscriber reachable from trigger.
    pub(crate) fn register(&self, subscriber: &Arc<dyn Reactive>) {
        self.subscribers
            .insert(subscriber.subscriber_id(), Arc::downgrade(subscriber));
    }

    /// Register and keep the subscriber alive until [`release`](Self::release).
    pub(crate) fn retain(&self, subscriber: Arc<dyn Reactive>) {
        self.register(&subscriber);
        self.retained.insert(subscriber.subscriber_id(), subscriber);
    }

    /// Drop the runtime's strong reference to a retained subscriber.
    pub(crate) fn release(&self, id: SubscriberId) {
        // The removed Arc is dropped after the shard lock is released.
        let released = self.retained.remove(&id);
        drop(released);
    }

    /// Forget a subscriber entirely: no buckets, no lookup entry.
    pub(crate) fn unregister(&self, id: SubscriberId) {
        self.subscribers.remove(&id);
        self.clear_dependencies(id);
    }

    /// Record the current computation as a dependent of `(target, key)`.
    ///
    /// Outside of any computation, or inside an untracked frame, this does
    /// nothing. Subscribers belonging to another runtime are not recorded.
    pub(crate) fn track(&self, target: TargetId, key: &PropertyKey) {
        let Some(subscriber) = ReactiveContext::current() else {
            return;
        };
        if subscriber.runtime_id() != self.id {
            trace!(target_id = %target, key = %key, "read from foreign runtime not tracked");
            return;
        }
        self.record(target, key, subscriber.subscriber_id());
    }

    /// Insert `subscriber` into the bucket for `(target, key)`.
    pub(crate) fn record(&self, target: TargetId, key: &PropertyKey, subscriber: SubscriberId) {
        let inserted = self
            .deps
            .entry(target)
            .or_default()
            .value_mut()
            .entry(key.clone())
            .or_default()
            .insert(subscriber);
        if inserted {
            trace!(target_id = %target, key = %key, ?subscriber, "recorded dependency");
        }
    }

    /// Copy of the subscribers currently depending on `(target, key)`.
    pub(crate) fn lookup(&self, target: TargetId, key: &PropertyKey) -> Dependents {
        self.deps
            .get(&target)
            .and_then(|keys| {
                keys.value()
                    .get(key)
                    .map(|bucket| bucket.iter().copied().collect())
            })
            .unwrap_or_default()
    }

    /// Remove `subscriber` from every bucket.
    pub(crate) fn clear_dependencies(&self, subscriber: SubscriberId) {
        for mut entry in self.deps.iter_mut() {
            let keys = entry.value_mut();
            for bucket in keys.values_mut() {
                bucket.shift_remove(&subscriber);
            }
            keys.retain(|_, bucket| !bucket.is_empty());
        }
        trace!(?subscriber, "cleared dependencies");
    }

    /// Drop every bucket belonging to `target`.
    pub(crate) fn forget_target(&self, target: TargetId) {
        if self.deps.remove(&target).is_some() {
            debug!(target_id = %target, "forgot dropped target");
        }
    }

    /// Notify every subscriber of `(target, key)`.
    ///
    /// Computeds reached by the write, directly or through other computeds,
    /// are all marked dirty first. The effects collected on the way are then
    /// run once each, in discovery order. Returns the first error raised by
    /// an effect; the remaining effects are not run.
    pub(crate) fn trigger(&self, target: TargetId, key: &PropertyKey) -> Result<()> {
        let mut reached = IndexSet::new();
        let mut pending = Dependents::new();
        self.collect_dependents(target, key, &mut reached, &mut pending);
        if pending.is_empty() {
            return Ok(());
        }

        trace!(target_id = %target, key = %key, count = pending.len(), "triggering dependents");

        for id in pending {
            if let Some(subscriber) = self.resolve(id) {
                subscriber.notify()?;
            }
        }
        Ok(())
    }

    /// Invalidate the subscribers of `(target, key)`, following derived
    /// values to their own readers, and queue the rest into `pending`.
    fn collect_dependents(
        &self,
        target: TargetId,
        key: &PropertyKey,
        reached: &mut IndexSet<SubscriberId>,
        pending: &mut Dependents,
    ) {
        for id in self.lookup(target, key) {
            if !reached.insert(id) {
                continue;
            }
            let Some(subscriber) = self.resolve(id) else {
                continue;
            };
            match subscriber.invalidate() {
                Some((target, key)) => self.collect_dependents(target, &key, reached, pending),
                None => pending.push(id),
            }
        }
    }

    fn resolve(&self, id: SubscriberId) -> Option<Arc<dyn Reactive>> {
        let upgraded = self.subscribers.get(&id).map(|weak| weak.upgrade());
        match upgraded {
            Some(Some(subscriber)) => Some(subscriber),
            Some(None) => {
                self.unregister(id);
                None
            }
            None => None,
        }
    }

    pub(crate) fn dependent_count(&self, target: TargetId, key: &PropertyKey) -> usize {
        self.deps
            .get(&target)
            .and_then(|keys| keys.value().get(key).map(IndexSet::len))
            .unwrap_or(0)
    }

    pub(crate) fn dependency_count(&self, subscriber: SubscriberId) -> usize {
        self.deps
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .values()
                    .filter(|bucket| bucket.contains(&subscriber))
                    .count()
            })
            .sum()
    }

    /// Convert JSON into a [`Value`], wrapping every object it contains.
    pub(crate) fn wrap_json(self: &Arc<Self>, json: serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(Arc::from(s)),
            Json::Array(items) => {
                Value::Array(items.into_iter().map(|item| self.wrap_json(item)).collect())
            }
            Json::Object(map) => {
                let fields = map
                    .into_iter()
                    .map(|(key, value)| (PropertyKey::from(key), self.wrap_json(value)))
                    .collect();
                Value::Object(ReactiveObject::new(Arc::clone(self), fields))
            }
        }
    }
}

/// Handle to a reactive runtime.
///
/// A runtime owns one dependency registry. Observables, effects and
/// computeds created from it record into and trigger through that registry
/// only, so independent runtimes never observe each other. Cloning the
/// handle shares the same registry.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Runtime;
/// use serde_json::json;
///
/// let rt = Runtime::new();
/// let state = rt.reactive_object(json!({ "count": 0 })).unwrap();
///
/// let s = state.clone();
/// rt.effect(move || {
///     println!("count = {:?}", s.get("count")?);
///     Ok(())
/// })
/// .unwrap();
///
/// state.set("count", 1).unwrap(); // prints "count = Number(1.0)"
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let id = RuntimeId::new();
        debug!(?id, ?config, "created reactive runtime");
        Self {
            inner: Arc::new(RuntimeInner {
                id,
                config,
                deps: DashMap::new(),
                subscribers: DashMap::new(),
                retained: DashMap::new(),
            }),
        }
    }

    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<RuntimeInner> {
        &self.inner
    }

    /// Wrap a JSON value.
    ///
    /// Objects, including every object nested inside, become
    /// [`ReactiveObject`]s. Everything else passes through as a plain
    /// [`Value`] and cannot be tracked on its own; use
    /// [`reference`](Self::reference) for that.
    pub fn reactive(&self, json: serde_json::Value) -> Value {
        self.inner.wrap_json(json)
    }

    /// Wrap a JSON object, failing if `json` is not an object.
    pub fn reactive_object(&self, json: serde_json::Value) -> Result<ReactiveObject> {
        match self.reactive(json) {
            Value::Object(object) => Ok(object),
            other => Err(ReactiveError::NotAnObject {
                kind: other.type_name(),
            }),
        }
    }

    /// Build a reactive object from already-converted fields.
    pub fn object<I, K, V>(&self, fields: I) -> ReactiveObject
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<PropertyKey>,
        V: Into<Value>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        ReactiveObject::new(Arc::clone(&self.inner), fields)
    }

    /// Create a single-slot observable.
    pub fn reference<T>(&self, value: T) -> Ref<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        Ref::new(Arc::clone(&self.inner), value)
    }

    /// Create a single-slot observable holding a JSON value, with objects
    /// wrapped as by [`reactive`](Self::reactive).
    pub fn reference_json(&self, json: serde_json::Value) -> Ref<Value> {
        self.reference(self.reactive(json))
    }

    /// Run `run` now and again whenever anything it read changes.
    ///
    /// The effect stays subscribed until [`Effect::dispose`] is called; the
    /// returned handle may be dropped freely.
    pub fn effect<F>(&self, run: F) -> Result<Effect>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Effect::new(Arc::clone(&self.inner), run)
    }

    /// Same as [`effect`](Self::effect).
    pub fn watch_effect<F>(&self, run: F) -> Result<Effect>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        self.effect(run)
    }

    /// Create a lazily evaluated, cached derived value.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Computed::new(Arc::clone(&self.inner), getter)
    }

    /// Call `callback(new, old)` whenever `source` evaluates to a different
    /// value.
    ///
    /// The callback is not called for the initial evaluation.
    pub fn watch<T, C>(&self, source: WatchSource<T>, callback: C) -> Result<Effect>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        C: Fn(&T, &T) -> Result<()> + Send + Sync + 'static,
    {
        watch::watch(self, source, callback)
    }

    /// Run `f` with tracking suspended.
    pub fn untrack<T>(&self, f: impl FnOnce() -> T) -> T {
        let _ctx = ReactiveContext::untracked();
        f()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("targets", &self.inner.deps.len())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}
