use std::collections::BTreeMap;

use serde_json::Value;

use super::{DumpContext, FieldAdapter, LoadContext};
use crate::error::{SchemaError, ValidationError};
use crate::object::{PlainMapping, SchemaObject};
use crate::registry::VersionRegistry;
use crate::schema::{Context, LoadOptions, Loaded};
use crate::value::{FieldValue, Payload};

const DEFAULT_TYPE_FIELD: &str = "type";

/// Polymorphic dispatch to one of several registered schemas, keyed by a
/// discriminator stored alongside the variant's own fields.
///
/// On dump the discriminator is read from the object's `type` attribute (or
/// the configured field name); on load it is read from, and stripped off, the
/// payload before the variant's versioned schema takes over. Usable as a
/// field adapter or as a top-level schema.
#[derive(Debug, Clone)]
pub struct OneOf {
    type_field: String,
    variants: BTreeMap<String, String>,
}

impl Default for OneOf {
    fn default() -> Self {
        OneOf {
            type_field: DEFAULT_TYPE_FIELD.to_string(),
            variants: BTreeMap::new(),
        }
    }
}

impl OneOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_field(mut self, name: impl Into<String>) -> Self {
        self.type_field = name.into();
        self
    }

    /// Map discriminator `type_name` to the schema registered as `identity`.
    pub fn variant(mut self, type_name: impl Into<String>, identity: impl Into<String>) -> Self {
        self.variants.insert(type_name.into(), identity.into());
        self
    }

    pub fn type_field(&self) -> &str {
        &self.type_field
    }

    pub fn dump(
        &self,
        object: &dyn SchemaObject,
        registry: &VersionRegistry,
        context: &Context,
    ) -> Result<Payload, SchemaError> {
        let type_name = object
            .attribute(&self.type_field)
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| ValidationError::field(&self.type_field, "Missing object type."))?;
        let identity = self.variants.get(&type_name).ok_or_else(|| {
            ValidationError::field(
                &self.type_field,
                format!("Unsupported object type: {}", type_name),
            )
        })?;

        let mut payload = registry
            .schema(identity)?
            .with_context(context.clone())
            .dump(object)?;
        payload.insert(self.type_field.clone(), Value::String(type_name));
        Ok(payload)
    }

    pub fn load(
        &self,
        data: &dyn PlainMapping,
        registry: &VersionRegistry,
        options: LoadOptions,
        context: &Context,
    ) -> Result<Loaded, SchemaError> {
        let mut map = match data.to_plain() {
            Value::Object(map) => map,
            _ => return Err(ValidationError::new("Invalid input type.").into()),
        };

        let type_name = match map.remove(&self.type_field) {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(ValidationError::field(
                    &self.type_field,
                    format!("Unsupported value: {}", other),
                )
                .into())
            }
            None => {
                return Err(ValidationError::field(
                    &self.type_field,
                    "Missing data for required field.",
                )
                .into())
            }
        };
        let identity = self.variants.get(&type_name).ok_or_else(|| {
            ValidationError::field(&self.type_field, format!("Unsupported value: {}", type_name))
        })?;

        registry
            .schema(identity)?
            .with_context(context.clone())
            .load_with(&Value::Object(map), options)
    }
}

impl FieldAdapter for OneOf {
    fn serialize(&self, value: &FieldValue, ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let payload = match value {
            FieldValue::Object(obj) => self.dump(&**obj, ctx.registry, ctx.context)?,
            FieldValue::Record(record) => self.dump(record, ctx.registry, ctx.context)?,
            _ => return Err(ValidationError::new("Not a valid nested object.").into()),
        };
        Ok(Value::Object(payload))
    }

    fn deserialize(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        let options = LoadOptions {
            create_object: ctx.create_object,
            check_version: true,
        };
        Ok(self.load(value, ctx.registry, options, ctx.context)?.into())
    }
}
