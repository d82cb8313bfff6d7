//! `$ref` resolution: same-document pointers, registry lookups,
//! cross-document cycles and failure modes.
//!
//! Registry ids use unique `tag:` URIs per test because the registry is
//! process-wide and the test harness runs tests in one process.

use serde_json::json;
use veld_schema::{build_schema, unregister_schema, Schema};
use veld_value::DynValue;

fn schema(doc: serde_json::Value) -> std::sync::Arc<Schema> {
    build_schema(veld_json::from_json(&doc), false)
}

fn value(doc: serde_json::Value) -> DynValue {
    veld_json::from_json(&doc)
}

#[test]
fn same_document_pointer_ref() {
    let schema = schema(json!({
        "definitions": {
            "positive": {"type": "integer", "minimum": 1}
        },
        "properties": {
            "count": {"$ref": "#/definitions/positive"}
        }
    }));
    assert!(schema.validate(&value(json!({"count": 2}))).is_valid());

    let result = schema.validate(&value(json!({"count": 0})));
    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].instance_path(), "/count");
    assert_eq!(result.errors()[0].keyword, "minimum");
}

#[test]
fn defs_alias_is_addressable() {
    let schema = schema(json!({
        "$defs": {"name": {"type": "string"}},
        "properties": {"n": {"$ref": "#/$defs/name"}}
    }));
    assert!(schema.validate(&value(json!({"n": "ok"}))).is_valid());
    assert!(!schema.validate(&value(json!({"n": 1}))).is_valid());
}

#[test]
fn root_ref_hash_points_at_the_whole_document() {
    let schema = schema(json!({
        "type": "object",
        "properties": {"next": {"$ref": "#"}}
    }));
    assert!(schema.validate(&value(json!({"next": {"next": {}}}))).is_valid());
    assert!(!schema.validate(&value(json!({"next": 5}))).is_valid());
}

#[test]
fn unresolvable_ref_fails_with_ref_keyword() {
    let schema = schema(json!({"$ref": "#/definitions/missing"}));
    let result = schema.validate(&value(json!(1)));
    assert!(!result.is_valid());
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors()[0].keyword, "ref");
    assert!(result.errors()[0].message.contains("#/definitions/missing"));
}

#[test]
fn anchor_refs_are_unsupported() {
    let schema = schema(json!({"$ref": "#legacy-anchor"}));
    let result = schema.validate(&value(json!(1)));
    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].keyword, "ref");
}

#[test]
fn pointer_escapes_resolve_in_refs() {
    let schema = schema(json!({
        "definitions": {"a/b": {"type": "boolean"}},
        "properties": {"flag": {"$ref": "#/definitions/a~1b"}}
    }));
    assert!(schema.validate(&value(json!({"flag": true}))).is_valid());
    assert!(!schema.validate(&value(json!({"flag": "no"}))).is_valid());
}

#[test]
fn external_ref_through_registry() {
    let target = schema(json!({
        "$id": "tag:veld-ext-user",
        "type": "object",
        "required": ["name"]
    }));
    assert!(target.is_valid());

    let referrer = schema(json!({"$ref": "tag:veld-ext-user"}));
    assert!(referrer.validate(&value(json!({"name": "ada"}))).is_valid());

    let result = referrer.validate(&value(json!({})));
    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].keyword, "required");

    unregister_schema("tag:veld-ext-user");
}

#[test]
fn external_ref_with_fragment_pointer() {
    let _target = schema(json!({
        "$id": "tag:veld-ext-net",
        "definitions": {
            "port": {"type": "integer", "minimum": 1, "maximum": 65535}
        }
    }));

    let referrer = schema(json!({
        "properties": {"port": {"$ref": "tag:veld-ext-net#/definitions/port"}}
    }));
    assert!(referrer.validate(&value(json!({"port": 8080}))).is_valid());
    assert!(!referrer.validate(&value(json!({"port": 0}))).is_valid());
    assert!(!referrer.validate(&value(json!({"port": 70000}))).is_valid());

    unregister_schema("tag:veld-ext-net");
}

#[test]
fn cross_document_reference_cycle_terminates() {
    let a = schema(json!({
        "$id": "tag:veld-cycle-a",
        "type": "object",
        "properties": {"b": {"$ref": "tag:veld-cycle-b"}}
    }));
    let b = schema(json!({
        "$id": "tag:veld-cycle-b",
        "type": "object",
        "properties": {"a": {"$ref": "tag:veld-cycle-a"}}
    }));
    assert!(a.is_valid());
    assert!(b.is_valid());

    assert!(a.validate(&value(json!({"b": {"a": {"b": {}}}}))).is_valid());
    assert!(!a.validate(&value(json!({"b": {"a": 7}}))).is_valid());

    unregister_schema("tag:veld-cycle-a");
    unregister_schema("tag:veld-cycle-b");
}

#[test]
fn ref_errors_carry_the_ref_pseudo_segment_in_schema_paths() {
    let schema = schema(json!({
        "definitions": {"s": {"type": "string"}},
        "$ref": "#/definitions/s"
    }));
    let result = schema.validate(&value(json!(5)));
    assert!(!result.is_valid());
    let error = &result.errors()[0];
    assert_eq!(error.keyword, "type");
    assert!(error.schema_path().contains("$ref:"));
}
