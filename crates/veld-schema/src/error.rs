//! Error records produced by schema compilation and validation.

use core::fmt::{self, Display};

use veld_value::path::render_pointer;
use veld_value::value::Object;
use veld_value::{DynValue, JsonPath};

/// A single data-validation failure.
///
/// Paths are kept as unescaped segment lists; the `*_path()` accessors render
/// them as JSON Pointers. `keyword` names the schema keyword that failed
/// (`"minLength"`, `"type"`, `"false"` for a boolean `false` schema, ...).
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
    pub instance_path_parts: Vec<String>,
    pub schema_path_parts: Vec<String>,
    pub keyword: String,
    pub invalid_value: DynValue,
}

impl ValidationError {
    /// The location of the offending value, as a JSON Pointer into the
    /// validated document. Empty for the document root.
    pub fn instance_path(&self) -> String {
        render_pointer(&self.instance_path_parts)
    }

    /// The location of the violated keyword, as a JSON Pointer into the
    /// schema document.
    pub fn schema_path(&self) -> String {
        render_pointer(&self.schema_path_parts)
    }

    /// The instance location as a typed path.
    pub fn instance_json_path(&self) -> JsonPath {
        JsonPath(self.instance_path_parts.clone())
    }

    /// The schema location as a typed path.
    pub fn schema_json_path(&self) -> JsonPath {
        JsonPath(self.schema_path_parts.clone())
    }

    /// Export as a generic record:
    /// `{message, instance_path, instance_path_array, schema_path,
    /// schema_path_array, keyword, invalid_value}`.
    pub fn to_record(&self) -> DynValue {
        let parts_array = |parts: &[String]| {
            DynValue::Array(parts.iter().map(|p| DynValue::Str(p.clone())).collect())
        };
        let mut record = Object::new();
        record.insert("message".into(), DynValue::Str(self.message.clone()));
        record.insert("instance_path".into(), DynValue::Str(self.instance_path()));
        record.insert(
            "instance_path_array".into(),
            parts_array(&self.instance_path_parts),
        );
        record.insert("schema_path".into(), DynValue::Str(self.schema_path()));
        record.insert(
            "schema_path_array".into(),
            parts_array(&self.schema_path_parts),
        );
        record.insert("keyword".into(), DynValue::Str(self.keyword.clone()));
        record.insert("invalid_value".into(), self.invalid_value.clone());
        DynValue::Object(record)
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.instance_path();
        if path.is_empty() {
            write!(f, "{}", self.message)?;
        } else {
            write!(f, "at '{}': {}", path, self.message)?;
        }
        if !self.keyword.is_empty() {
            write!(f, " ({})", self.keyword)?;
        }
        Ok(())
    }
}

/// A defect in the schema document itself: a keyword with the wrong type, or
/// a nested sub-schema that could not be compiled.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub schema_path_parts: Vec<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>, schema_path_parts: Vec<String>) -> Self {
        CompileError {
            message: message.into(),
            schema_path_parts,
        }
    }

    /// Pointer into the schema document, e.g. `/properties/user/minimum`.
    pub fn path_string(&self) -> String {
        render_pointer(&self.schema_path_parts)
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path_string();
        if path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "at '{}': {}", path, self.message)
        }
    }
}
