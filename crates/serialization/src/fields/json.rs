use serde_json::Value;

use super::{DumpContext, FieldAdapter, LoadContext};
use crate::error::SchemaError;
use crate::value::FieldValue;

/// Arbitrary JSON, checked for JSON-compatibility before it is written.
///
/// Mapping-like wrappers are normalized to plain objects first; bytes,
/// datetimes, functions and constructed objects are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCompatible;

impl FieldAdapter for JsonCompatible {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        Ok(value.to_json()?)
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        Ok(FieldValue::Json(value.clone()))
    }
}
