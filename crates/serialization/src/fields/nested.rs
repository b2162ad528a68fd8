use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use super::{DumpContext, FieldAdapter, LoadContext};
use crate::error::{SchemaError, ValidationError};
use crate::object::SchemaObject;
use crate::schema::{Context, LoadOptions, SchemaInstance, SchemaOptions};
use crate::value::FieldValue;

/// Computes a field's value from the parent object and the schema context.
/// `None` omits the field from the payload entirely.
pub type Accessor = fn(&dyn SchemaObject, &Context) -> Option<FieldValue>;

/// Another versioned schema, referenced by identity.
///
/// The identity is resolved through the registry when the field is used, so
/// schemas may refer to each other regardless of registration order. Dumping
/// uses the newest definition; loading resolves the nested payload's own
/// `__version__`.
#[derive(Clone)]
pub struct Nested {
    identity: String,
    accessor: Option<Accessor>,
    only: Option<BTreeSet<String>>,
}

impl Nested {
    pub fn new(identity: impl Into<String>) -> Self {
        Nested {
            identity: identity.into(),
            accessor: None,
            only: None,
        }
    }

    pub fn with_accessor(mut self, accessor: Accessor) -> Self {
        self.accessor = Some(accessor);
        self
    }

    pub fn only(mut self, fields: &[&str]) -> Self {
        self.only = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn instance<'r>(
        &self,
        registry: &'r crate::registry::VersionRegistry,
        context: &Context,
    ) -> Result<SchemaInstance<'r>, SchemaError> {
        Ok(registry
            .schema(&self.identity)?
            .with_options(SchemaOptions {
                only: self.only.clone(),
                ..SchemaOptions::default()
            })
            .with_context(context.clone()))
    }
}

impl fmt::Debug for Nested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nested")
            .field("identity", &self.identity)
            .field("accessor", &self.accessor.is_some())
            .field("only", &self.only)
            .finish()
    }
}

impl FieldAdapter for Nested {
    fn serialize(&self, value: &FieldValue, ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let schema = self.instance(ctx.registry, ctx.context)?;
        let payload = match value {
            FieldValue::Object(obj) => schema.dump(&**obj)?,
            FieldValue::Record(record) => schema.dump(record)?,
            _ => return Err(ValidationError::new("Not a valid nested object.").into()),
        };
        Ok(Value::Object(payload))
    }

    fn deserialize(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        let schema = self.instance(ctx.registry, ctx.context)?;
        let loaded = schema.load_with(
            value,
            LoadOptions {
                create_object: ctx.create_object,
                check_version: true,
            },
        )?;
        Ok(loaded.into())
    }

    fn accessor(&self) -> Option<Accessor> {
        self.accessor
    }
}
