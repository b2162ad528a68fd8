//! Object-side seams: how schemas read domain objects and how mapping-like
//! containers turn into plain JSON.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;

use crate::value::{FieldValue, Payload, Record};

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A domain object a schema can dump, and the result of constructing one on
/// load.
///
/// `attribute` is the plain attribute read used by `dump`; returning `None`
/// omits the field from the payload.
pub trait SchemaObject: AsAny + fmt::Debug + Send + Sync {
    fn attribute(&self, name: &str) -> Option<FieldValue>;
}

impl<'a> dyn SchemaObject + 'a {
    pub fn downcast_ref<T: SchemaObject + 'static>(&self) -> Option<&T> {
        AsAny::as_any(self).downcast_ref::<T>()
    }

    pub fn downcast<T: SchemaObject + 'static>(self: Box<Self>) -> Result<Box<T>, Box<dyn Any>> {
        AsAny::into_any(self).downcast::<T>()
    }
}

impl SchemaObject for Record {
    fn attribute(&self, name: &str) -> Option<FieldValue> {
        self.get(name).cloned()
    }
}

/// Explicit conversion for mapping-like containers.
///
/// Adapters that accept "anything dict-shaped" call this instead of
/// inspecting the container's type.
pub trait PlainMapping: fmt::Debug + Send + Sync {
    fn to_plain(&self) -> Value;
}

impl PlainMapping for Value {
    fn to_plain(&self) -> Value {
        self.clone()
    }
}

impl PlainMapping for Payload {
    fn to_plain(&self) -> Value {
        Value::Object(self.clone())
    }
}

impl PlainMapping for BTreeMap<String, Value> {
    fn to_plain(&self) -> Value {
        Value::Object(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

impl PlainMapping for HashMap<String, Value> {
    fn to_plain(&self) -> Value {
        Value::Object(self.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
