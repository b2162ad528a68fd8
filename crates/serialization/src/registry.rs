//! Process-wide catalog of schema generations.
//!
//! Definitions are keyed by identity, then by version tag. Tags are compared
//! as plain strings, so `"0.10.0" < "0.2.0"`; keep tags zero-padded or
//! otherwise lexicographically ordered if that matters.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::schema::{Schema, SchemaInstance};

/// Sentinel version requested when a payload carries no `__version__`.
/// Always resolves to the newest definition, whatever the tags look like.
pub const MAX_VERSION: &str = "__MAX_VERSION__";

/// Payload key holding the version tag of the schema that wrote it.
pub const VERSION_FIELD: &str = "__version__";

#[derive(Debug, Default)]
pub struct VersionRegistry {
    schemas: BTreeMap<String, BTreeMap<String, Arc<Schema>>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `schema` under its own identity and tag, replacing any
    /// definition already registered at that exact pair.
    pub fn register(&mut self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        let versions = self
            .schemas
            .entry(schema.identity().to_string())
            .or_default();
        if versions
            .insert(schema.version().to_string(), Arc::clone(&schema))
            .is_some()
        {
            tracing::debug!(
                identity = schema.identity(),
                version = schema.version(),
                "replaced registered schema"
            );
        } else {
            tracing::trace!(
                identity = schema.identity(),
                version = schema.version(),
                "registered schema"
            );
        }
        schema
    }

    /// The definition with the greatest tag not greater than `version`, or
    /// the newest one for [`MAX_VERSION`].
    pub fn resolve(&self, identity: &str, version: &str) -> Result<Arc<Schema>, SchemaError> {
        let versions =
            self.schemas
                .get(identity)
                .ok_or_else(|| SchemaError::UnregisteredSchema {
                    identity: identity.to_string(),
                })?;
        let found = if version == MAX_VERSION {
            versions.last_key_value()
        } else {
            versions
                .range::<str, _>((Bound::Unbounded, Bound::Included(version)))
                .next_back()
        };
        found
            .map(|(_, schema)| Arc::clone(schema))
            .ok_or_else(|| SchemaError::NoMatchingVersion {
                identity: identity.to_string(),
                version: version.to_string(),
            })
    }

    /// Registered tags for `identity`, oldest first.
    pub fn versions(&self, identity: &str) -> Vec<&str> {
        self.schemas
            .get(identity)
            .map(|versions| versions.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.schemas.contains_key(identity)
    }

    /// An instance of the newest definition of `identity`.
    pub fn schema(&self, identity: &str) -> Result<SchemaInstance<'_>, SchemaError> {
        let definition = self.resolve(identity, MAX_VERSION)?;
        Ok(SchemaInstance::new(self, definition))
    }
}
