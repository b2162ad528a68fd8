//! Field declarations and the adapters that convert between payload JSON and
//! in-memory [`FieldValue`]s.
//!
//! Besides the plain scalar adapters defined here, the submodules provide the
//! converters schemas compose for values that have no native JSON form:
//!
//! - [`Bytes`] -- byte blobs as base64 text
//! - [`FunctionReference`] -- functions as allow-listed qualified names
//! - [`JsonCompatible`] -- arbitrary JSON, guarded on dump
//! - [`Nested`] -- another versioned schema, optionally read via an accessor
//! - [`OneOf`] -- polymorphic dispatch on a discriminator

mod bytes;
mod function;
mod json;
mod nested;
mod one_of;

pub use bytes::Bytes;
pub use function::{Callable, FunctionAllowList, FunctionRef, FunctionReference};
pub use json::JsonCompatible;
pub use nested::{Accessor, Nested};
pub use one_of::OneOf;

use std::fmt;

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{SchemaError, ValidationError};
use crate::registry::VersionRegistry;
use crate::schema::Context;
use crate::value::FieldValue;

/// What an adapter sees while a schema dumps an object.
pub struct DumpContext<'a> {
    pub registry: &'a VersionRegistry,
    pub context: &'a Context,
}

/// What an adapter sees while a schema loads a payload.
pub struct LoadContext<'a> {
    pub registry: &'a VersionRegistry,
    pub context: &'a Context,
    /// Whether nested schemas should construct objects or return records.
    pub create_object: bool,
}

/// Converts one field between its payload form and its object form.
///
/// Null handling happens in the schema (`allow_none`), so adapters only ever
/// see non-null values.
pub trait FieldAdapter: fmt::Debug + Send + Sync {
    fn serialize(&self, value: &FieldValue, ctx: &DumpContext<'_>) -> Result<Value, SchemaError>;

    fn deserialize(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError>;

    /// Computes the field from its parent instead of reading an attribute.
    fn accessor(&self) -> Option<Accessor> {
        None
    }
}

/// A named field of a schema.
#[derive(Debug)]
pub struct Field {
    name: String,
    adapter: Box<dyn FieldAdapter>,
    required: bool,
    allow_none: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, adapter: impl FieldAdapter + 'static) -> Self {
        Field {
            name: name.into(),
            adapter: Box::new(adapter),
            required: false,
            allow_none: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &dyn FieldAdapter {
        self.adapter.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn allows_none(&self) -> bool {
        self.allow_none
    }
}

// ── Scalars ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct Str;

impl FieldAdapter for Str {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| ValidationError::new("Not a valid string.").into())
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        match value {
            Value::String(_) => Ok(FieldValue::Json(value.clone())),
            _ => Err(ValidationError::new("Not a valid string.").into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Int;

impl FieldAdapter for Int {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        value
            .as_i64()
            .map(Value::from)
            .ok_or_else(|| ValidationError::new("Not a valid integer.").into())
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        value
            .as_i64()
            .map(FieldValue::from)
            .ok_or_else(|| ValidationError::new("Not a valid integer.").into())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bool;

impl FieldAdapter for Bool {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| ValidationError::new("Not a valid boolean.").into())
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        value
            .as_bool()
            .map(FieldValue::from)
            .ok_or_else(|| ValidationError::new("Not a valid boolean.").into())
    }
}

/// RFC 3339 timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTime;

impl FieldAdapter for DateTime {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let dt = value
            .as_datetime()
            .ok_or_else(|| ValidationError::new("Not a valid datetime."))?;
        dt.format(&Rfc3339)
            .map(Value::String)
            .map_err(|e| ValidationError::new(format!("Cannot format datetime: {}", e)).into())
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        value
            .as_str()
            .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
            .map(FieldValue::DateTime)
            .ok_or_else(|| ValidationError::new("Not a valid datetime.").into())
    }
}

/// UUIDs, validated but kept as canonical lower-case strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uuid;

impl Uuid {
    fn canonical(s: &str) -> Result<Value, SchemaError> {
        uuid::Uuid::parse_str(s)
            .map(|u| Value::String(u.hyphenated().to_string()))
            .map_err(|_| ValidationError::new("Not a valid UUID.").into())
    }
}

impl FieldAdapter for Uuid {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let s = value
            .as_str()
            .ok_or_else(|| ValidationError::new("Not a valid UUID."))?;
        Uuid::canonical(s)
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        let s = value
            .as_str()
            .ok_or_else(|| ValidationError::new("Not a valid UUID."))?;
        Uuid::canonical(s).map(FieldValue::Json)
    }
}

/// A homogeneous list of values handled by one inner adapter.
#[derive(Debug)]
pub struct List {
    inner: Box<dyn FieldAdapter>,
}

impl List {
    pub fn of(inner: impl FieldAdapter + 'static) -> Self {
        List {
            inner: Box::new(inner),
        }
    }
}

impl FieldAdapter for List {
    fn serialize(&self, value: &FieldValue, ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let items = value
            .as_list()
            .ok_or_else(|| ValidationError::new("Not a valid list."))?;
        let mut out = Vec::with_capacity(items.len());
        let mut errors = ValidationError::default();
        for (i, item) in items.iter().enumerate() {
            match self.inner.serialize(item, ctx) {
                Ok(v) => out.push(v),
                Err(SchemaError::Validation(e)) => errors.absorb(&i.to_string(), e),
                Err(other) => return Err(other),
            }
        }
        errors.into_result()?;
        Ok(Value::Array(out))
    }

    fn deserialize(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        let items = value
            .as_array()
            .ok_or_else(|| ValidationError::new("Not a valid list."))?;
        let mut out = Vec::with_capacity(items.len());
        let mut errors = ValidationError::default();
        for (i, item) in items.iter().enumerate() {
            match self.inner.deserialize(item, ctx) {
                Ok(v) => out.push(v),
                Err(SchemaError::Validation(e)) => errors.absorb(&i.to_string(), e),
                Err(other) => return Err(other),
            }
        }
        errors.into_result()?;
        Ok(FieldValue::List(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn with_contexts(f: impl FnOnce(&DumpContext<'_>, &LoadContext<'_>)) {
        let registry = VersionRegistry::new();
        let context = Context::new();
        let dump = DumpContext {
            registry: &registry,
            context: &context,
        };
        let load = LoadContext {
            registry: &registry,
            context: &context,
            create_object: true,
        };
        f(&dump, &load);
    }

    #[test]
    fn datetime_round_trips_through_rfc3339() {
        with_contexts(|dump, load| {
            let dt = datetime!(2019-01-01 12:30:00 UTC);
            let text = DateTime.serialize(&dt.into(), dump).unwrap();
            assert_eq!(text, json!("2019-01-01T12:30:00Z"));
            let back = DateTime.deserialize(&text, load).unwrap();
            assert_eq!(back.as_datetime(), Some(dt));
        });
    }

    #[test]
    fn uuid_is_canonicalized() {
        with_contexts(|_, load| {
            let v = Uuid
                .deserialize(&json!("67E55044-10B1-426F-9247-BB680E5FE0C8"), load)
                .unwrap();
            assert_eq!(v.as_str(), Some("67e55044-10b1-426f-9247-bb680e5fe0c8"));
            assert!(Uuid.deserialize(&json!("nope"), load).is_err());
        });
    }

    #[test]
    fn list_errors_are_keyed_by_index() {
        with_contexts(|_, load| {
            let err = List::of(Int)
                .deserialize(&json!([1, "two", 3]), load)
                .unwrap_err();
            match err {
                SchemaError::Validation(e) => {
                    assert_eq!(e.messages("1"), ["Not a valid integer."]);
                }
                other => panic!("unexpected error: {}", other),
            }
        });
    }

    #[test]
    fn str_rejects_numbers() {
        with_contexts(|dump, load| {
            assert!(Str.deserialize(&json!(1), load).is_err());
            assert!(Str.serialize(&FieldValue::from(1), dump).is_err());
        });
    }
}
