//! drover-serialization: versioned schemas for drover payloads.
//!
//! Every payload a schema writes carries a `__version__` tag. Readers look
//! the tag up in a [`VersionRegistry`] and load with the newest definition
//! registered at or below it, so a newer client keeps reading what an older
//! one wrote.
//!
//! # Public API
//!
//! - [`VersionRegistry`] -- identity -> version tag -> [`Schema`]
//! - [`Schema`] / [`SchemaInstance`] -- definitions and the dump/load contract
//! - [`fields`] -- field adapters, including [`Nested`], [`OneOf`],
//!   [`Bytes`], [`FunctionReference`] and [`JsonCompatible`]
//! - [`SchemaObject`] / [`PlainMapping`] -- the object-side seams
//! - [`SchemaError`] / [`ValidationError`]

pub mod error;
pub mod fields;
pub mod object;
pub mod registry;
pub mod schema;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::{SchemaError, ValidationError, SCHEMA_KEY};
pub use fields::{
    Accessor, Bytes, Callable, Field, FieldAdapter, FunctionAllowList, FunctionRef,
    FunctionReference, JsonCompatible, Nested, OneOf,
};
pub use object::{PlainMapping, SchemaObject};
pub use registry::{VersionRegistry, MAX_VERSION, VERSION_FIELD};
pub use schema::{
    Constructor, Context, LoadOptions, Loaded, Schema, SchemaBuilder, SchemaInstance,
    SchemaOptions, Target, Unknown,
};
pub use value::{FieldValue, Payload, Record};
