use std::collections::BTreeMap;
use std::fmt;

/// Key under which errors about the value as a whole are recorded.
///
/// When an adapter's error is absorbed by the enclosing schema, messages
/// filed under this key move to the field's own name.
pub const SCHEMA_KEY: &str = "_schema";

/// All errors that can be returned while resolving, dumping or loading a
/// versioned schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// No definition was ever registered under this identity.
    #[error("unregistered versioned schema: {identity}")]
    UnregisteredSchema { identity: String },

    /// The identity is registered, but every registered tag is newer than the
    /// payload's version.
    #[error("no versioned schema registered for {identity} at or below version {version}")]
    NoMatchingVersion { identity: String, version: String },

    /// Field-level validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Field-level validation failure, listing every offending field.
///
/// Nested failures are keyed by dotted path (`tasks.0.name`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// An error about the value itself, not about one of its fields.
    pub fn new(message: impl Into<String>) -> Self {
        Self::field(SCHEMA_KEY, message)
    }

    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = ValidationError::default();
        error.push(name, message);
        error
    }

    pub fn push(&mut self, name: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(name.into())
            .or_default()
            .push(message.into());
    }

    /// Merge `other` under `prefix`: value-level messages land on `prefix`
    /// itself, field messages on `prefix.field`.
    pub fn absorb(&mut self, prefix: &str, other: ValidationError) {
        for (key, messages) in other.messages {
            let key = if key == SCHEMA_KEY {
                prefix.to_string()
            } else {
                format!("{}.{}", prefix, key)
            };
            self.messages.entry(key).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Names (or dotted paths) of the offending fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.messages.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        let mut sep = ": ";
        for (field, messages) in &self.messages {
            write!(f, "{}{}: {}", sep, field, messages.join(" "))?;
            sep = "; ";
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}
