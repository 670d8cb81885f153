//! Observable Objects
//!
//! A [`ReactiveObject`] is a keyed record whose reads are tracked and whose
//! writes trigger. It is the counterpart of wrapping a plain object: the set
//! of keys is fixed when the object is created, reads and writes of any other
//! key fail with [`ReactiveError::PropertyNotFound`].
//!
//! # Nested Objects
//!
//! Objects nested in the fields are wrapped when they enter the engine (at
//! construction through [`Runtime::reactive`](super::Runtime::reactive), or
//! on [`set_json`](ReactiveObject::set_json)). A read of `user` followed by a
//! read of `name` on the returned object therefore tracks both `(outer,
//! "user")` and `(user, "name")`.
//!
//! # Write Semantics
//!
//! A write compares the new value with the stored one using SameValue
//! equality. Equal writes are dropped without triggering anything, which is
//! what keeps an effect that writes back the value it read from looping.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{ReactiveError, Result};

use super::key::{PropertyKey, TargetId};
use super::runtime::RuntimeInner;
use super::value::Value;

pub(crate) type Fields = IndexMap<PropertyKey, Value>;

/// A reactive keyed object.
///
/// Cloning the handle shares the same object; identity is preserved, so a
/// clone compares equal to the original as a [`Value`].
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    id: TargetId,
    runtime: Arc<RuntimeInner>,
    fields: RwLock<Fields>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        self.runtime.forget_target(self.id);
    }
}

impl ReactiveObject {
    pub(crate) fn new(runtime: Arc<RuntimeInner>, fields: Fields) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: TargetId::new(),
                runtime,
                fields: RwLock::new(fields),
            }),
        }
    }

    /// Identity of this object in the dependency registry.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a field, recording it as a dependency of the running
    /// computation.
    pub fn get(&self, key: &str) -> Result<Value> {
        let found = self
            .inner
            .fields
            .read()
            .get_key_value(key)
            .map(|(k, v)| (k.clone(), v.clone()));
        match found {
            Some((key, value)) => {
                self.inner.runtime.track(self.inner.id, &key);
                Ok(value)
            }
            None => Err(ReactiveError::property_not_found(&PropertyKey::from(key))),
        }
    }

    /// Read a field without tracking.
    pub fn get_untracked(&self, key: &str) -> Result<Value> {
        self.inner
            .fields
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ReactiveError::property_not_found(&PropertyKey::from(key)))
    }

    /// Write a field.
    ///
    /// If the new value is the same value as the stored one, nothing
    /// happens. Otherwise the value is stored and every computation that read
    /// this field on its latest run is re-run before this call returns. The
    /// first error from one of those runs is returned.
    ///
    /// Storing an object inside itself, directly or through nested objects,
    /// is allowed but forms a reference cycle: snapshots write the
    /// back-reference as `null` and the objects are never freed until the
    /// cycle is broken by another write.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into();

        let previous = {
            let mut fields = self.inner.fields.write();
            let slot = fields
                .get_mut(&key)
                .ok_or_else(|| ReactiveError::property_not_found(&key))?;
            if slot.same_value(&value) {
                trace!(target_id = %self.inner.id, key = %key, "write of same value ignored");
                return Ok(());
            }
            std::mem::replace(slot, value)
        };
        // The old value may own the last handle to a nested object, whose
        // drop touches the registry; let it go outside the field lock.
        drop(previous);

        self.inner.runtime.trigger(self.inner.id, &key)
    }

    /// Write a JSON value, wrapping any objects it contains.
    pub fn set_json(&self, key: impl Into<PropertyKey>, json: serde_json::Value) -> Result<()> {
        let value = self.inner.runtime.wrap_json(json);
        self.set(key, value)
    }

    /// Whether `key` exists. Not tracked.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.read().contains_key(key)
    }

    /// The object's keys in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.inner.fields.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.read().is_empty()
    }

    /// Number of computations currently depending on `key`.
    pub fn dependent_count(&self, key: &str) -> usize {
        self.inner
            .runtime
            .dependent_count(self.inner.id, &PropertyKey::from(key))
    }

    /// Untracked copy of the fields.
    pub(crate) fn snapshot(&self) -> Fields {
        self.inner.fields.read().clone()
    }

    /// Untracked JSON snapshot of the whole object tree. A reference back
    /// to an enclosing object is written as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.json_within(&mut Vec::new())
    }

    pub(crate) fn json_within(&self, ancestors: &mut Vec<TargetId>) -> serde_json::Value {
        if ancestors.contains(&self.inner.id) {
            return serde_json::Value::Null;
        }
        ancestors.push(self.inner.id);
        let map = self
            .snapshot()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.json_within(ancestors)))
            .collect();
        ancestors.pop();
        serde_json::Value::Object(map)
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("id", &self.inner.id)
            .field("keys", &self.keys())
            .finish()
    }
}
