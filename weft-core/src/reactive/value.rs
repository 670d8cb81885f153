//! Dynamic values stored in reactive objects.
//!
//! Two equality relations are in play:
//!
//! - [`PartialEq`] is strict equality: NaN never equals itself, `0.0` equals
//!   `-0.0`, arrays and objects compare by identity. Watchers use it to decide
//!   whether a value changed.
//! - [`Value::same_value`] is SameValue equality: like strict equality except
//!   NaN equals NaN and `0.0` differs from `-0.0`. Object writes use it to
//!   suppress no-op assignments.
//!
//! Snapshots ([`Value::to_json`] and the `Serialize` impl) write a reference
//! back to an enclosing object as `null`, so a cyclic tree still serializes.

use std::cell::RefCell;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use super::key::TargetId;
use super::object::ReactiveObject;

/// A value held by a [`ReactiveObject`] field or a `Ref<Value>`.
///
/// Objects are always wrapped, so reading a nested field through a
/// `Value::Object` is tracked like any other read.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// An immutable list, compared by identity.
    Array(Arc<[Value]>),
    Object(ReactiveObject),
}

impl Value {
    /// SameValue equality.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            _ => self == other,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&s[..]),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(&items[..]),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Untracked JSON snapshot. Non-finite numbers and references back to
    /// an enclosing object become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.json_within(&mut Vec::new())
    }

    /// Snapshot below the objects in `ancestors`.
    pub(crate) fn json_within(&self, ancestors: &mut Vec<TargetId>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => Json::from(i),
                None => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            },
            Value::String(s) => Json::String(s.to_string()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| item.json_within(ancestors))
                    .collect(),
            ),
            Value::Object(object) => object.json_within(ancestors),
        }
    }
}

/// Integral numbers are written without a fractional part.
fn integral(n: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53
    (n.fract() == 0.0 && n.abs() <= LIMIT).then_some(n as i64)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(Arc::from(items))
    }
}

impl From<ReactiveObject> for Value {
    fn from(object: ReactiveObject) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ancestors = RefCell::new(Vec::new());
        Nested {
            value: self,
            ancestors: &ancestors,
        }
        .serialize(serializer)
    }
}

/// A value serialized below the objects in `ancestors`.
struct Nested<'a> {
    value: &'a Value,
    ancestors: &'a RefCell<Vec<TargetId>>,
}

impl Nested<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Nested<'b> {
        Nested {
            value,
            ancestors: self.ancestors,
        }
    }
}

impl Serialize for Nested<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Object(object) => {
                if self.ancestors.borrow().contains(&object.id()) {
                    return serializer.serialize_unit();
                }
                let fields = object.snapshot();
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                self.ancestors.borrow_mut().push(object.id());
                for (key, value) in &fields {
                    map.serialize_entry(key.as_str(), &self.child(value))?;
                }
                self.ancestors.borrow_mut().pop();
                map.end()
            }
        }
    }
}
