//! Versioned schema definitions and their bound instances.
//!
//! A [`Schema`] is one registered generation of a logical schema: identity,
//! version tag, fields, and an optional target constructor. A
//! [`SchemaInstance`] binds a definition to a registry, construction options
//! and a context, and implements the dump/load contract:
//!
//! - `dump` writes every field, then stamps `__version__` with the
//!   definition's own tag.
//! - `load` resolves the payload's `__version__` against the registry,
//!   delegates to the matching generation, strips the version field, loads
//!   the fields and constructs the target object.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::error::{SchemaError, ValidationError};
use crate::fields::{DumpContext, Field, LoadContext};
use crate::object::SchemaObject;
use crate::registry::{VersionRegistry, MAX_VERSION, VERSION_FIELD};
use crate::value::{FieldValue, Payload, Record};

/// Free-form values shared with accessors and nested schemas.
pub type Context = serde_json::Map<String, Value>;

/// Builds the target object from loaded fields.
pub type Constructor = fn(Record) -> Result<Box<dyn SchemaObject>, ValidationError>;

/// The type a schema constructs on load.
pub enum Target {
    Type(Constructor),
    /// Resolved on first use, for targets defined after (or in terms of) the
    /// schema that builds them.
    Deferred {
        factory: fn() -> Constructor,
        resolved: OnceLock<Constructor>,
    },
}

impl Target {
    pub fn deferred(factory: fn() -> Constructor) -> Self {
        Target::Deferred {
            factory,
            resolved: OnceLock::new(),
        }
    }

    pub fn constructor(&self) -> Constructor {
        match self {
            Target::Type(constructor) => *constructor,
            Target::Deferred { factory, resolved } => *resolved.get_or_init(|| factory()),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Type(_) => f.write_str("Target::Type"),
            Target::Deferred { resolved, .. } => f
                .debug_struct("Target::Deferred")
                .field("resolved", &resolved.get().is_some())
                .finish(),
        }
    }
}

/// What to do with payload keys no field declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unknown {
    #[default]
    Raise,
    Exclude,
}

/// One registered generation of a logical schema.
#[derive(Debug)]
pub struct Schema {
    identity: String,
    version: String,
    fields: Vec<Field>,
    target: Option<Target>,
    target_exclude: BTreeSet<String>,
    unknown: Unknown,
}

impl Schema {
    pub fn builder(identity: impl Into<String>, version: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                identity: identity.into(),
                version: version.into(),
                fields: Vec::new(),
                target: None,
                target_exclude: BTreeSet::new(),
                unknown: Unknown::Raise,
            },
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }
}

pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn construct(mut self, constructor: Constructor) -> Self {
        self.schema.target = Some(Target::Type(constructor));
        self
    }

    pub fn construct_deferred(mut self, factory: fn() -> Constructor) -> Self {
        self.schema.target = Some(Target::deferred(factory));
        self
    }

    /// Fields that are loaded and validated but not passed to the constructor.
    pub fn exclude_from_constructor(mut self, names: &[&str]) -> Self {
        self.schema
            .target_exclude
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn unknown(mut self, policy: Unknown) -> Self {
        self.schema.unknown = policy;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Construction arguments carried over when a load is delegated to another
/// generation of the same schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Restrict to these fields.
    pub only: Option<BTreeSet<String>>,
    pub exclude: BTreeSet<String>,
    /// Skip required-field checks.
    pub partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub create_object: bool,
    pub check_version: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            create_object: true,
            check_version: true,
        }
    }
}

/// Result of a load: a constructed object, or the validated record when no
/// object was requested or no target is declared.
#[derive(Debug)]
pub enum Loaded {
    Object(Box<dyn SchemaObject>),
    Record(Record),
}

impl Loaded {
    pub fn into_object<T: SchemaObject + 'static>(self) -> Option<T> {
        match self {
            Loaded::Object(obj) => obj.downcast::<T>().ok().map(|b| *b),
            Loaded::Record(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Loaded::Record(record) => Some(record),
            Loaded::Object(_) => None,
        }
    }
}

impl From<Loaded> for FieldValue {
    fn from(loaded: Loaded) -> Self {
        match loaded {
            Loaded::Object(obj) => FieldValue::Object(Arc::from(obj)),
            Loaded::Record(record) => FieldValue::Record(record),
        }
    }
}

/// A schema definition bound to a registry, options and context.
#[derive(Debug, Clone)]
pub struct SchemaInstance<'r> {
    registry: &'r VersionRegistry,
    definition: Arc<Schema>,
    options: SchemaOptions,
    context: Context,
}

impl<'r> SchemaInstance<'r> {
    pub fn new(registry: &'r VersionRegistry, definition: Arc<Schema>) -> Self {
        SchemaInstance {
            registry,
            definition,
            options: SchemaOptions::default(),
            context: Context::new(),
        }
    }

    pub fn with_options(mut self, options: SchemaOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn definition(&self) -> &Arc<Schema> {
        &self.definition
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn effective_fields(&self) -> impl Iterator<Item = &Field> {
        self.definition.fields.iter().filter(move |f| {
            let name = f.name();
            self.options
                .only
                .as_ref()
                .map_or(true, |only| only.contains(name))
                && !self.options.exclude.contains(name)
        })
    }

    /// Serialize `object` into a version-tagged payload.
    pub fn dump(&self, object: &dyn SchemaObject) -> Result<Payload, SchemaError> {
        let ctx = DumpContext {
            registry: self.registry,
            context: &self.context,
        };
        let mut payload = Payload::new();
        let mut errors = ValidationError::default();

        for field in self.effective_fields() {
            let value = match field.adapter().accessor() {
                Some(accessor) => accessor(object, &self.context),
                None => object.attribute(field.name()),
            };
            let Some(value) = value else {
                continue;
            };
            if value.is_null() {
                payload.insert(field.name().to_string(), Value::Null);
                continue;
            }
            match field.adapter().serialize(&value, &ctx) {
                Ok(v) => {
                    payload.insert(field.name().to_string(), v);
                }
                Err(SchemaError::Validation(e)) => errors.absorb(field.name(), e),
                Err(other) => return Err(other),
            }
        }
        errors.into_result()?;

        payload
            .entry(VERSION_FIELD)
            .or_insert_with(|| Value::String(self.definition.version.clone()));
        Ok(payload)
    }

    /// Load with object construction and version resolution.
    pub fn load(&self, data: &Value) -> Result<Loaded, SchemaError> {
        self.load_with(data, LoadOptions::default())
    }

    pub fn load_with(&self, data: &Value, options: LoadOptions) -> Result<Loaded, SchemaError> {
        if options.check_version {
            if let Value::Object(map) = data {
                let version = match map.get(VERSION_FIELD) {
                    None => MAX_VERSION,
                    Some(Value::String(v)) => v.as_str(),
                    Some(_) => {
                        return Err(
                            ValidationError::field(VERSION_FIELD, "Not a valid string.").into()
                        )
                    }
                };
                let resolved = self.registry.resolve(&self.definition.identity, version)?;
                if !Arc::ptr_eq(&resolved, &self.definition) {
                    let delegate = SchemaInstance {
                        registry: self.registry,
                        definition: resolved,
                        options: self.options.clone(),
                        context: self.context.clone(),
                    };
                    return delegate.load_with(
                        data,
                        LoadOptions {
                            check_version: false,
                            ..options
                        },
                    );
                }
            }
        }

        let mut map = match data {
            Value::Object(map) => map.clone(),
            _ => return Err(ValidationError::new("Invalid input type.").into()),
        };
        map.remove(VERSION_FIELD);

        let record = self.load_fields(map, options.create_object)?;

        if options.create_object {
            if let Some(target) = &self.definition.target {
                return self.construct(target, record).map(Loaded::Object);
            }
        }
        Ok(Loaded::Record(record))
    }

    fn load_fields(&self, mut data: Payload, create_object: bool) -> Result<Record, SchemaError> {
        let ctx = LoadContext {
            registry: self.registry,
            context: &self.context,
            create_object,
        };
        let mut record = Record::new();
        let mut errors = ValidationError::default();

        for field in self.effective_fields() {
            let name = field.name();
            match data.remove(name) {
                None => {
                    if field.is_required() && !self.options.partial {
                        errors.push(name, "Missing data for required field.");
                    }
                }
                Some(Value::Null) => {
                    if field.allows_none() {
                        record.insert(name.to_string(), FieldValue::null());
                    } else {
                        errors.push(name, "Field may not be null.");
                    }
                }
                Some(value) => match field.adapter().deserialize(&value, &ctx) {
                    Ok(v) => {
                        record.insert(name.to_string(), v);
                    }
                    Err(SchemaError::Validation(e)) => errors.absorb(name, e),
                    Err(other) => return Err(other),
                },
            }
        }

        if self.definition.unknown == Unknown::Raise {
            for key in data.keys() {
                // Declared but filtered out by `only`/`exclude`: ignored, not unknown.
                if self.definition.field(key).is_none() {
                    errors.push(key.as_str(), "Unknown field.");
                }
            }
        }

        errors.into_result()?;
        Ok(record)
    }

    fn construct(
        &self,
        target: &Target,
        mut record: Record,
    ) -> Result<Box<dyn SchemaObject>, SchemaError> {
        for name in &self.definition.target_exclude {
            record.remove(name);
        }
        Ok((target.constructor())(record)?)
    }
}
