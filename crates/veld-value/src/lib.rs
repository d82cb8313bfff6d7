//! Dynamic value model for the veld schema engine.
//!
//! A schema engine embedded in a host runtime cannot assume any particular
//! JSON parser, so the whole engine operates on [`DynValue`], a tagged union
//! covering the seven JSON types. This crate also carries [`JsonPath`], the
//! JSON Pointer flavoured path type used for instance and schema locations
//! in validation errors.

pub mod path;
pub mod value;

pub use path::JsonPath;
pub use value::{DynValue, JsonType, Object};
