//! End-to-end validation scenarios through the public surface:
//! build_schema + validate on documents expressed as JSON literals.

use serde_json::json;
use veld_schema::{build_schema, ValidationResult};
use veld_value::DynValue;

fn schema(doc: serde_json::Value) -> std::sync::Arc<veld_schema::Schema> {
    build_schema(veld_json::from_json(&doc), false)
}

fn check(doc: serde_json::Value, value: serde_json::Value) -> ValidationResult {
    schema(doc).validate(&veld_json::from_json(&value))
}

#[test]
fn empty_schema_accepts_everything() {
    for value in [json!(null), json!(true), json!(3), json!("x"), json!([1]), json!({"a": 1})] {
        assert!(check(json!({}), value).is_valid());
    }
}

#[test]
fn boolean_schemas() {
    assert!(check(json!(true), json!({"any": "thing"})).is_valid());

    let result = check(json!(false), json!(42));
    assert!(!result.is_valid());
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors()[0].keyword, "false");

    // {"not": {}} rejects everything too, via the not keyword.
    let result = check(json!({"not": {}}), json!(42));
    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].keyword, "not");
}

#[test]
fn type_widening() {
    assert!(check(json!({"type": "number"}), json!(5)).is_valid());
    assert!(check(json!({"type": "integer"}), json!(5)).is_valid());
    assert!(check(json!({"type": "integer"}), json!(5.0)).is_valid());
    assert!(!check(json!({"type": "integer"}), json!(5.5)).is_valid());
    assert!(!check(json!({"type": "number"}), json!("5")).is_valid());
}

#[test]
fn min_length_counts_utf8_bytes() {
    let doc = json!({"type": "string", "minLength": 3});
    // Two code points, three UTF-8 bytes.
    assert!(check(doc.clone(), json!("aä")).is_valid());
    assert!(!check(doc, json!("ab")).is_valid());
}

#[test]
fn tuple_with_additional_items_false() {
    let doc = json!({
        "items": [{"type": "integer"}, {"type": "string"}],
        "additionalItems": false
    });
    assert!(check(doc.clone(), json!([1, "x"])).is_valid());

    let result = check(doc, json!([1, "x", 2]));
    assert!(!result.is_valid());
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors()[0].instance_path(), "/2");
    assert_eq!(result.errors()[0].keyword, "false");
}

#[test]
fn one_of_ambiguity_lists_matching_indices() {
    let doc = json!({"oneOf": [{"type": "number"}, {"type": "integer"}]});
    let result = check(doc.clone(), json!(3));
    assert!(!result.is_valid());
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors()[0].keyword, "oneOf");
    assert!(result.errors()[0].message.contains("indices: 0, 1"));

    // A fractional number matches only branch 0.
    assert!(check(doc, json!(3.5)).is_valid());
}

#[test]
fn recursive_ref_terminates_by_depth_guard() {
    let doc = json!({"type": "object", "properties": {"child": {"$ref": "#"}}});
    assert!(check(doc.clone(), json!({"child": {"child": {"child": {}}}})).is_valid());

    // Far deeper than the depth bound of 50: still passes, no errors.
    let mut value = json!({});
    for _ in 0..80 {
        value = json!({"child": value});
    }
    assert!(check(doc.clone(), value).is_valid());

    // The guard does not mask genuine failures below the bound.
    assert!(!check(doc, json!({"child": {"child": 3}})).is_valid());
}

#[test]
fn unique_items_reports_at_the_duplicate_element() {
    let result = check(json!({"uniqueItems": true}), json!([{"a": 1}, {"a": 1}]));
    assert!(!result.is_valid());
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors()[0].instance_path(), "/1");
    assert_eq!(result.errors()[0].keyword, "uniqueItems");

    assert!(check(json!({"uniqueItems": true}), json!([{"a": 1}, {"a": 2}])).is_valid());
}

#[test]
fn conditional_if_then_else() {
    let doc = json!({
        "if": {"properties": {"k": {"const": "x"}}},
        "then": {"required": ["v"]}
    });
    let result = check(doc.clone(), json!({"k": "x"}));
    assert!(!result.is_valid());
    // The if branch contributed nothing; only the then failure shows.
    assert_eq!(result.error_count(), 1);
    assert_eq!(result.errors()[0].keyword, "required");

    assert!(check(doc.clone(), json!({"k": "y"})).is_valid());
    assert!(check(doc, json!({"k": "x", "v": 1})).is_valid());
}

#[test]
fn nested_property_errors_carry_instance_paths() {
    let doc = json!({
        "properties": {
            "user": {
                "properties": {
                    "name": {"type": "string"},
                    "age": {"type": "integer", "minimum": 0}
                }
            }
        }
    });
    let result = check(doc, json!({"user": {"name": 7, "age": -2}}));
    assert!(!result.is_valid());
    assert_eq!(result.error_count(), 2);
    let paths = result.all_error_paths();
    assert!(paths.contains(&"/user/name".to_string()));
    assert!(paths.contains(&"/user/age".to_string()));
}

#[test]
fn error_lists_are_deterministic() {
    let doc = json!({
        "properties": {
            "a": {"type": "string", "minLength": 3},
            "b": {"enum": [1, 2]},
            "c": {"allOf": [{"type": "integer"}, {"minimum": 10}]}
        },
        "required": ["missing"]
    });
    let value = json!({"a": "x", "b": 9, "c": 4.5});

    let render = |result: &ValidationResult| -> Vec<String> {
        result
            .errors()
            .iter()
            .map(|e| format!("{}|{}|{}|{}", e.message, e.instance_path(), e.schema_path(), e.keyword))
            .collect()
    };
    let first = render(&check(doc.clone(), value.clone()));
    for _ in 0..5 {
        assert_eq!(render(&check(doc.clone(), value.clone())), first);
    }
}

#[test]
fn concurrent_validation_observes_one_compile() {
    let schema = schema(json!({
        "type": "object",
        "properties": {"n": {"type": "integer", "minimum": 0}},
        "required": ["n"]
    }));

    let good = veld_json::from_json(&json!({"n": 3}));
    let bad = veld_json::from_json(&json!({"n": -1}));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    assert!(schema.validate(&good).is_valid());
                    let result = schema.validate(&bad);
                    assert_eq!(result.error_count(), 1);
                    assert_eq!(result.errors()[0].instance_path(), "/n");
                }
            });
        }
    });
    assert!(schema.is_valid());
}

#[test]
fn compile_errors_reproject_as_validation_errors() {
    let schema = schema(json!({"minLength": -1}));
    assert!(!schema.is_valid());
    assert_eq!(schema.compile_errors().len(), 1);

    let result = schema.validate(&DynValue::Str("anything".into()));
    assert!(!result.is_valid());
    assert_eq!(result.errors()[0].keyword, "schema");
    assert_eq!(result.errors()[0].schema_path(), "/minLength");
}

#[test]
fn scalar_shorthands_promote_inside_properties() {
    let doc = json!({"properties": {"kind": "integer", "tags": ["string", "null"]}});
    assert!(check(doc.clone(), json!({"kind": 3, "tags": "x"})).is_valid());
    assert!(check(doc.clone(), json!({"tags": null})).is_valid());
    assert!(!check(doc.clone(), json!({"kind": "three"})).is_valid());
    assert!(!check(doc, json!({"tags": 9})).is_valid());
}

#[test]
fn error_records_expose_the_documented_shape() {
    let result = check(json!({"type": "string"}), json!(17));
    let record = result.errors()[0].to_record();
    assert!(record.get("message").is_some());
    assert_eq!(record.get("instance_path"), Some(&DynValue::Str(String::new())));
    assert_eq!(record.get("keyword"), Some(&DynValue::Str("type".into())));
    assert_eq!(record.get("invalid_value"), Some(&DynValue::Int(17)));
    assert!(record.get("instance_path_array").is_some());
    assert!(record.get("schema_path_array").is_some());
}
