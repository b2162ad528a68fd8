use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{DumpContext, FieldAdapter, LoadContext};
use crate::error::{SchemaError, ValidationError};
use crate::value::FieldValue;

/// A type-erased function value. Callers downcast to the concrete function
/// pointer type they registered (see [`FunctionRef::get`]).
pub type Callable = Arc<dyn Any + Send + Sync>;

/// A function known by its qualified name.
///
/// References loaded with `reject_invalid` disabled may carry a name that is
/// not in the allow-list; those stay unresolved.
#[derive(Clone)]
pub struct FunctionRef {
    name: String,
    function: Option<Callable>,
}

impl FunctionRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        FunctionRef {
            name: name.into(),
            function: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_resolved(&self) -> bool {
        self.function.is_some()
    }

    pub fn get<F: Any>(&self) -> Option<&F> {
        self.function.as_deref()?.downcast_ref::<F>()
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRef")
            .field("name", &self.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.is_resolved() == other.is_resolved()
    }
}

/// The explicit set of functions that may cross a payload boundary by name.
#[derive(Clone, Default)]
pub struct FunctionAllowList {
    functions: BTreeMap<String, Callable>,
}

impl FunctionAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F: Any + Send + Sync>(mut self, name: impl Into<String>, function: F) -> Self {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// A resolved reference to an allow-listed function.
    pub fn reference(&self, name: &str) -> Option<FunctionRef> {
        self.functions.get(name).map(|function| FunctionRef {
            name: name.to_string(),
            function: Some(Arc::clone(function)),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// A reference is admitted when its name is listed and, if it carries a
    /// function, that function is the listed one.
    fn admits(&self, reference: &FunctionRef) -> bool {
        match (self.functions.get(&reference.name), &reference.function) {
            (Some(listed), Some(own)) => Arc::ptr_eq(listed, own),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

impl fmt::Debug for FunctionAllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

/// Functions stored as allow-listed qualified names.
#[derive(Debug, Clone)]
pub struct FunctionReference {
    allow_list: Arc<FunctionAllowList>,
    reject_invalid: bool,
}

impl FunctionReference {
    pub fn new(allow_list: Arc<FunctionAllowList>) -> Self {
        FunctionReference {
            allow_list,
            reject_invalid: true,
        }
    }

    /// Emit any function's name, and load names outside the allow-list as
    /// unresolved references instead of failing.
    pub fn accept_unknown(mut self) -> Self {
        self.reject_invalid = false;
        self
    }
}

impl FieldAdapter for FunctionReference {
    fn serialize(&self, value: &FieldValue, _ctx: &DumpContext<'_>) -> Result<Value, SchemaError> {
        let reference = value
            .as_function()
            .ok_or_else(|| ValidationError::new("Not a function reference."))?;
        if self.reject_invalid && !self.allow_list.admits(reference) {
            return Err(ValidationError::new(format!(
                "Invalid function reference: {}",
                reference.name()
            ))
            .into());
        }
        Ok(Value::String(reference.name().to_string()))
    }

    fn deserialize(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<FieldValue, SchemaError> {
        let name = value
            .as_str()
            .ok_or_else(|| ValidationError::new("Not a valid function reference."))?;
        match self.allow_list.reference(name) {
            Some(reference) => Ok(FieldValue::Function(reference)),
            None if self.reject_invalid => Err(ValidationError::new(format!(
                "Invalid function reference: {}",
                name
            ))
            .into()),
            None => Ok(FieldValue::Function(FunctionRef::unresolved(name))),
        }
    }
}
