use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use super::{DumpContext, FieldAdapter, LoadContext};
use crate::error::{SchemaError, ValidationError};
use crate::value::FieldValue;

/// Byte blobs, carried in payloads as standard-alphabet base64 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bytes;

impl FieldAdapter for Bytes {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let bytes = value
            .as_bytes()
            .ok_or_else(|| ValidationError::new("Not a byte string."))?;
        Ok(Value::String(STANDARD.encode(bytes)))
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        let text = value
            .as_str()
            .ok_or_else(|| ValidationError::new("Not a valid base64 string."))?;
        STANDARD
            .decode(text)
            .map(FieldValue::Bytes)
            .map_err(|e| ValidationError::new(format!("Invalid base64 data: {}", e)).into())
    }
}
