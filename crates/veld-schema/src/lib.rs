//! JSON Schema (Draft 7) validation core.
//!
//! The engine works in two phases. [`build_schema`] parses a schema document
//! (a [`veld_value::DynValue`]) into a tree of [`Schema`] nodes, then a rule
//! compiler lazily turns each node into an ordered group of
//! `(selector, rule)` pairs, de-duplicated through a process-wide cache.
//! [`Schema::validate`] walks a value against the compiled rules and returns
//! a flat, path-aware error list. Validation never panics and never throws;
//! malformed schemas surface as [`CompileError`]s instead.
//!
//! `$ref` URIs resolve against the owning document or against the global
//! [registry](register_schema) of schemas keyed by `$id`, with a depth guard
//! breaking reference cycles at evaluation time.

mod compiler;
mod context;
mod error;
mod meta;
mod registry;
mod result;
mod rules;
mod schema;
mod selector;

pub use error::{CompileError, ValidationError};
pub use meta::{draft7_meta_schema, validate_schema_definition, DRAFT7_META_SCHEMA_ID};
pub use registry::{
    is_schema_registered, register_schema, registered_ids, registered_schema, unregister_schema,
};
pub use result::ValidationResult;
pub use schema::{build_schema, Schema, SchemaKind};
