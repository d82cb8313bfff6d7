//! The Draft 7 meta-schema: a schema whose instances are themselves
//! schemas, used to pre-validate schema documents.
//!
//! The instance is cold-initialized on first use and registered under its
//! `$id`. The meta-schema validates itself, so a thread-local guard
//! suppresses meta-validation while the instance is being built.

use std::cell::Cell;
use std::sync::{Arc, LazyLock};

use veld_value::DynValue;

use crate::result::ValidationResult;
use crate::schema::{build_schema, Schema};

/// `$id` the meta-schema registers under.
pub const DRAFT7_META_SCHEMA_ID: &str = "http://json-schema.org/draft-07/schema#";

const DRAFT7_META_SCHEMA_JSON: &str = r##"{
    "$schema": "http://json-schema.org/draft-07/schema#",
    "$id": "http://json-schema.org/draft-07/schema#",
    "title": "Core schema meta-schema",
    "definitions": {
        "schemaArray": {
            "type": "array",
            "minItems": 1,
            "items": {"$ref": "#"}
        },
        "nonNegativeInteger": {
            "type": "integer",
            "minimum": 0
        },
        "nonNegativeIntegerDefault0": {
            "allOf": [
                {"$ref": "#/definitions/nonNegativeInteger"},
                {"default": 0}
            ]
        },
        "simpleTypes": {
            "enum": ["array", "boolean", "integer", "null", "number", "object", "string"]
        },
        "stringArray": {
            "type": "array",
            "items": {"type": "string"},
            "uniqueItems": true,
            "default": []
        }
    },
    "type": ["object", "boolean"],
    "properties": {
        "$id": {"type": "string", "format": "uri-reference"},
        "$schema": {"type": "string", "format": "uri"},
        "$ref": {"type": "string", "format": "uri-reference"},
        "$comment": {"type": "string"},
        "title": {"type": "string"},
        "description": {"type": "string"},
        "default": true,
        "readOnly": {"type": "boolean", "default": false},
        "writeOnly": {"type": "boolean", "default": false},
        "examples": {"type": "array", "items": true},
        "multipleOf": {"type": "number", "exclusiveMinimum": 0},
        "maximum": {"type": "number"},
        "exclusiveMaximum": {"type": "number"},
        "minimum": {"type": "number"},
        "exclusiveMinimum": {"type": "number"},
        "maxLength": {"$ref": "#/definitions/nonNegativeInteger"},
        "minLength": {"$ref": "#/definitions/nonNegativeIntegerDefault0"},
        "pattern": {"type": "string", "format": "regex"},
        "additionalItems": {"$ref": "#"},
        "items": {
            "anyOf": [
                {"$ref": "#"},
                {"$ref": "#/definitions/schemaArray"}
            ],
            "default": true
        },
        "maxItems": {"$ref": "#/definitions/nonNegativeInteger"},
        "minItems": {"$ref": "#/definitions/nonNegativeIntegerDefault0"},
        "uniqueItems": {"type": "boolean", "default": false},
        "contains": {"$ref": "#"},
        "maxProperties": {"$ref": "#/definitions/nonNegativeInteger"},
        "minProperties": {"$ref": "#/definitions/nonNegativeIntegerDefault0"},
        "required": {"$ref": "#/definitions/stringArray"},
        "additionalProperties": {"$ref": "#"},
        "definitions": {
            "type": "object",
            "additionalProperties": {"$ref": "#"},
            "default": {}
        },
        "properties": {
            "type": "object",
            "additionalProperties": {"$ref": "#"},
            "default": {}
        },
        "patternProperties": {
            "type": "object",
            "additionalProperties": {"$ref": "#"},
            "propertyNames": {"format": "regex"},
            "default": {}
        },
        "dependencies": {
            "type": "object",
            "additionalProperties": {
                "anyOf": [
                    {"$ref": "#"},
                    {"$ref": "#/definitions/stringArray"}
                ]
            }
        },
        "propertyNames": {"$ref": "#"},
        "const": true,
        "enum": {
            "type": "array",
            "items": true,
            "minItems": 1,
            "uniqueItems": true
        },
        "type": {
            "anyOf": [
                {"$ref": "#/definitions/simpleTypes"},
                {
                    "type": "array",
                    "items": {"$ref": "#/definitions/simpleTypes"},
                    "minItems": 1,
                    "uniqueItems": true
                }
            ]
        },
        "format": {"type": "string"},
        "contentMediaType": {"type": "string"},
        "contentEncoding": {"type": "string"},
        "if": {"$ref": "#"},
        "then": {"$ref": "#"},
        "else": {"$ref": "#"},
        "allOf": {"$ref": "#/definitions/schemaArray"},
        "anyOf": {"$ref": "#/definitions/schemaArray"},
        "oneOf": {"$ref": "#/definitions/schemaArray"},
        "not": {"$ref": "#"}
    },
    "default": true
}"##;

thread_local! {
    /// Set while the meta-schema itself is being built or consulted, so
    /// that validating the self-referential meta-schema cannot recurse into
    /// another meta-validation.
    static BUILDING_META: Cell<bool> = const { Cell::new(false) };
}

static DRAFT7_META: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    let doc = veld_json::parse(DRAFT7_META_SCHEMA_JSON)
        .expect("the Draft 7 meta-schema literal is valid JSON");
    // Built without meta-validation; the guard covers callers that race
    // into validate_schema_definition on this thread meanwhile.
    build_schema(doc, false)
});

/// The compiled Draft 7 meta-schema instance (also registered under
/// [`DRAFT7_META_SCHEMA_ID`]).
pub fn draft7_meta_schema() -> Arc<Schema> {
    DRAFT7_META.clone()
}

/// Validate a schema definition against the Draft 7 meta-schema.
///
/// Returns success unconditionally while the meta-schema itself is being
/// built on this thread.
pub fn validate_schema_definition(definition: &DynValue) -> ValidationResult {
    if BUILDING_META.with(Cell::get) {
        return ValidationResult::success();
    }
    BUILDING_META.with(|guard| guard.set(true));
    let result = draft7_meta_schema().validate(definition);
    BUILDING_META.with(|guard| guard.set(false));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_schema_compiles_cleanly_and_registers() {
        let meta = draft7_meta_schema();
        assert!(meta.is_valid());
        assert_eq!(meta.id(), Some(DRAFT7_META_SCHEMA_ID));
        assert!(crate::registry::is_schema_registered(DRAFT7_META_SCHEMA_ID));
    }

    #[test]
    fn meta_schema_validates_itself() {
        let doc = veld_json::parse(DRAFT7_META_SCHEMA_JSON).unwrap();
        assert!(validate_schema_definition(&doc).is_valid());
    }

    #[test]
    fn well_formed_schemas_pass_meta_validation() {
        let doc = veld_json::parse(
            r#"{"type": "object", "properties": {"a": {"type": "integer", "minimum": 0}}}"#,
        )
        .unwrap();
        assert!(validate_schema_definition(&doc).is_valid());
        assert!(validate_schema_definition(&DynValue::Bool(true)).is_valid());
    }

    #[test]
    fn malformed_schemas_fail_meta_validation() {
        // minLength must be a non-negative integer.
        let doc = veld_json::parse(r#"{"minLength": -1}"#).unwrap();
        assert!(!validate_schema_definition(&doc).is_valid());

        // type must name a simple type.
        let doc = veld_json::parse(r#"{"type": "not-a-type"}"#).unwrap();
        assert!(!validate_schema_definition(&doc).is_valid());
    }
}
