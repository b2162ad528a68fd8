//! A small GraphQL document builder and the result wrapper queries return.
//!
//! ```
//! use drover_client::graphql::{Arg, Field, Operation};
//!
//! let op = Operation::mutation()
//!     .variable("state", "JSON!")
//!     .select(
//!         Field::new("setFlowRunState")
//!             .arg(
//!                 "input",
//!                 Arg::object([("flowRunId", Arg::from("fr-1")), ("state", Arg::variable("state"))]),
//!             )
//!             .field("error"),
//!     );
//! assert_eq!(
//!     op.to_string(),
//!     "mutation($state: JSON!) {\n  setFlowRunState(input: {flowRunId: \"fr-1\", state: $state}) {\n    error\n  }\n}"
//! );
//! ```

use std::fmt::{self, Write as _};

use drover_serialization::PlainMapping;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

// ── Arguments ─────────────────────────────────────────────────────────────────

/// A field argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Rendered as a GraphQL literal: strings quoted, object keys bare.
    Json(Value),
    /// Rendered verbatim: enum values and `$variable` references.
    Enum(String),
    Object(Vec<(String, Arg)>),
    List(Vec<Arg>),
}

impl Arg {
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Arg)>) -> Self {
        Arg::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// A reference to an operation variable, e.g. `$state`.
    pub fn variable(name: &str) -> Self {
        Arg::Enum(format!("${}", name))
    }

    fn render(&self, out: &mut String) {
        match self {
            Arg::Json(value) => render_literal(value, out),
            Arg::Enum(raw) => out.push_str(raw),
            Arg::Object(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    value.render(out);
                }
                out.push('}');
            }
            Arg::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render(out);
                }
                out.push(']');
            }
        }
    }
}

fn render_literal(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            for (i, (key, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(key);
                out.push_str(": ");
                render_literal(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_literal(v, out);
            }
            out.push(']');
        }
        // Scalars share JSON's spelling; strings get JSON escaping.
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Json(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Json(Value::String(value.to_string()))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Json(Value::String(value))
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Arg::Json(Value::from(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::Json(Value::Bool(value))
    }
}

// ── Selections ────────────────────────────────────────────────────────────────

/// A selected field, with optional arguments and sub-selections.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    args: Vec<(String, Arg)>,
    children: Vec<Field>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            args: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Select a leaf field.
    pub fn field(self, name: impl Into<String>) -> Self {
        self.select(Field::new(name))
    }

    pub fn fields<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Self {
        names.into_iter().fold(self, |field, name| field.field(name))
    }

    pub fn select(mut self, child: Field) -> Self {
        self.children.push(child);
        self
    }

    fn render(&self, depth: usize, out: &mut String) {
        indent(depth, out);
        out.push_str(&self.name);
        if !self.args.is_empty() {
            out.push('(');
            for (i, (name, value)) in self.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(name);
                out.push_str(": ");
                value.render(out);
            }
            out.push(')');
        }
        if !self.children.is_empty() {
            render_block(&self.children, depth, out);
        }
    }
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn render_block(children: &[Field], depth: usize, out: &mut String) {
    out.push_str(" {\n");
    for child in children {
        child.render(depth + 1, out);
        out.push('\n');
    }
    indent(depth, out);
    out.push('}');
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A complete query or mutation document.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    variables: Vec<(String, String)>,
    selections: Vec<Field>,
}

impl Operation {
    pub fn query() -> Self {
        Operation {
            kind: OperationKind::Query,
            variables: Vec::new(),
            selections: Vec::new(),
        }
    }

    pub fn mutation() -> Self {
        Operation {
            kind: OperationKind::Mutation,
            ..Operation::query()
        }
    }

    /// Declare `$name: graphql_type`.
    pub fn variable(mut self, name: impl Into<String>, graphql_type: impl Into<String>) -> Self {
        self.variables.push((name.into(), graphql_type.into()));
        self
    }

    pub fn select(mut self, field: Field) -> Self {
        self.selections.push(field);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from(match self.kind {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
        });
        if !self.variables.is_empty() {
            out.push('(');
            for (i, (name, ty)) in self.variables.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "${}: {}", name, ty);
            }
            out.push(')');
        }
        render_block(&self.selections, 0, &mut out);
        f.write_str(&out)
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// The `data` member of a GraphQL response, with dotted-path access.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLResult {
    data: Value,
}

impl GraphQLResult {
    pub fn new(data: Value) -> Self {
        GraphQLResult { data }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_inner(self) -> Value {
        self.data
    }

    /// Walk `path` (`createFlow.id`, `task_runs.0.id`). Numeric segments
    /// index into arrays.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.data, |value, segment| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// Present and not null.
    pub fn is_set(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    pub fn str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Deserialize the value at `path`.
    pub fn decode<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self
            .get(path)
            .ok_or_else(|| Error::InvalidResponse(format!("missing `{}` in response", path)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidResponse(format!("could not decode `{}`: {}", path, e)))
    }
}

impl PlainMapping for GraphQLResult {
    fn to_plain(&self) -> Value {
        self.data.clone()
    }
}
