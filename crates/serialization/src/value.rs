//! In-memory values flowing between field adapters and domain objects.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use crate::error::ValidationError;
use crate::fields::FunctionRef;
use crate::object::{PlainMapping, SchemaObject};

/// A serialized object: field name to JSON value, plus `__version__`.
pub type Payload = serde_json::Map<String, Value>;

/// Loaded field values, before (or instead of) object construction.
pub type Record = BTreeMap<String, FieldValue>;

/// A single field value on the object side of a schema.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Json(Value),
    Bytes(Vec<u8>),
    DateTime(OffsetDateTime),
    Function(FunctionRef),
    Object(Arc<dyn SchemaObject>),
    Record(Record),
    List(Vec<FieldValue>),
    /// A mapping-like container that converts itself to plain JSON.
    Mapping(Arc<dyn PlainMapping>),
}

impl FieldValue {
    pub fn null() -> Self {
        FieldValue::Json(Value::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        FieldValue::Json(Value::String(value.into()))
    }

    pub fn object(value: impl SchemaObject + 'static) -> Self {
        FieldValue::Object(Arc::new(value))
    }

    /// Wrap an optional value, mapping `None` to JSON null.
    pub fn optional<T>(value: Option<T>, wrap: impl FnOnce(T) -> FieldValue) -> Self {
        value.map(wrap).unwrap_or_else(FieldValue::null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Json(Value::Null))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(Value::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Value::as_bool)
    }

    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            FieldValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Downcast a constructed nested object to its concrete type.
    pub fn downcast_ref<T: SchemaObject + 'static>(&self) -> Option<&T> {
        match self {
            FieldValue::Object(obj) => (**obj).downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Convert to plain JSON, refusing anything that has no JSON form.
    ///
    /// Mapping-like wrappers are normalized through [`PlainMapping`] first.
    pub fn to_json(&self) -> Result<Value, ValidationError> {
        match self {
            FieldValue::Json(v) => Ok(v.clone()),
            FieldValue::Mapping(m) => Ok(m.to_plain()),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            FieldValue::Record(record) => {
                let mut out = Payload::new();
                for (k, v) in record {
                    out.insert(k.clone(), v.to_json()?);
                }
                Ok(Value::Object(out))
            }
            FieldValue::Bytes(_)
            | FieldValue::DateTime(_)
            | FieldValue::Function(_)
            | FieldValue::Object(_) => Err(ValidationError::new("Value is not JSON-compatible")),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Json(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::string(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::string(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Json(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Json(Value::Bool(value))
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        FieldValue::Bytes(value)
    }
}

impl From<OffsetDateTime> for FieldValue {
    fn from(value: OffsetDateTime) -> Self {
        FieldValue::DateTime(value)
    }
}

impl From<FunctionRef> for FieldValue {
    fn from(value: FunctionRef) -> Self {
        FieldValue::Function(value)
    }
}
