//! The schema tree: a recursive, reference-bearing model of a JSON Schema
//! document.
//!
//! The root node exclusively owns all descendants; every node keeps a weak
//! back-reference to its root for `$ref` resolution, which never extends the
//! root's lifetime. Each keyword that embeds a schema produces exactly one
//! child under a canonical composite key (`properties/name`, `items/0`,
//! `allOf/0`, `definitions/foo`, ...). Rule compilation is lazy and
//! idempotent per node, guarded by the node's compile mutex.

use core::fmt::{self, Display};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use ahash::AHashMap;
use tracing::warn;
use veld_value::path::{normalize_pointer, render_pointer};
use veld_value::value::Object;
use veld_value::{DynValue, JsonPath};

use crate::compiler;
use crate::context::ValidationContext;
use crate::error::{CompileError, ValidationError};
use crate::registry;
use crate::result::ValidationResult;
use crate::rules::RuleGroup;

/// Broad shape of a schema node, inferred from the explicit `type` keyword
/// first and from keyword presence otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// String, number, boolean, null constraints.
    Scalar,
    /// Has `properties`, `required`, ...
    Object,
    /// Has `items`, `minItems`, ...
    Array,
    /// `allOf`, `anyOf`, `oneOf`, `not`, `if`/`then`/`else`.
    Logical,
}

impl Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaKind::Scalar => "scalar",
            SchemaKind::Object => "object",
            SchemaKind::Array => "array",
            SchemaKind::Logical => "logical",
        };
        f.write_str(name)
    }
}

/// Late-bound compilation state; either absent or fully populated, set
/// exactly once under the node's mutex.
#[derive(Debug, Default)]
pub(crate) struct CompileState {
    pub rules: Option<Arc<RuleGroup>>,
    pub errors: Vec<CompileError>,
    pub is_compiled: bool,
}

/// One node of a schema tree.
#[derive(Debug)]
pub struct Schema {
    definition: DynValue,
    kind: SchemaKind,
    path_parts: Vec<String>,
    root: Weak<Schema>,
    children: AHashMap<String, Arc<Schema>>,
    item_schemas: Vec<Arc<Schema>>,
    id: Option<String>,
    schema_uri: Option<String>,
    title: Option<String>,
    description: Option<String>,
    comment: Option<String>,
    compiled: Mutex<CompileState>,
}

/// Build a schema tree from a document, compile it, and auto-register it
/// when the document carries an `$id`.
///
/// With `validate_meta` the definition is first checked against the Draft 7
/// meta-schema; failures are logged as warnings and never prevent
/// construction (the malformed keyword will surface as a `CompileError`
/// instead).
pub fn build_schema(definition: DynValue, validate_meta: bool) -> Arc<Schema> {
    if validate_meta {
        let result = crate::meta::validate_schema_definition(&definition);
        if result.has_errors() {
            warn!(
                "schema failed meta-validation:\n{}",
                result.summary()
            );
        }
    }

    let root = Schema::new_root(definition);
    compiler::ensure_compiled(&root);
    if !root.is_valid() {
        warn!("building schema failed:\n{}", root.compile_error_summary());
    }

    if root.id().is_some_and(|id| !id.is_empty()) {
        registry::register_schema(&root, None);
    }
    root
}

impl Schema {
    fn new_root(definition: DynValue) -> Arc<Schema> {
        let definition = promote_definition(definition);
        Arc::new_cyclic(|weak| Schema::new_node(definition, weak.clone(), Vec::new()))
    }

    fn new_node(definition: DynValue, root: Weak<Schema>, path_parts: Vec<String>) -> Schema {
        let kind = detect_kind(&definition);

        let (id, schema_uri, title, description, comment) = {
            let str_field = |key: &str| -> Option<String> {
                definition
                    .get(key)
                    .and_then(DynValue::as_str)
                    .map(str::to_string)
            };
            (
                str_field("$id"),
                str_field("$schema"),
                str_field("title"),
                str_field("description"),
                str_field("$comment"),
            )
        };

        let mut builder = ChildBuilder {
            root,
            path_parts: path_parts.clone(),
            children: AHashMap::new(),
            item_schemas: Vec::new(),
        };
        builder.construct(&definition);

        Schema {
            definition,
            kind,
            path_parts,
            root: builder.root.clone(),
            children: builder.children,
            item_schemas: builder.item_schemas,
            id,
            schema_uri,
            title,
            description,
            comment,
            compiled: Mutex::new(CompileState::default()),
        }
    }

    // ===== Tree navigation =====

    pub fn is_root(&self) -> bool {
        self.path_parts.is_empty()
    }

    /// The owning tree's root. `None` only if the tree was dropped while a
    /// detached handle (e.g. a cached rule's back-reference) survived.
    pub fn root(&self) -> Option<Arc<Schema>> {
        self.root.upgrade()
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == SchemaKind::Scalar
    }

    pub fn is_object(&self) -> bool {
        self.kind == SchemaKind::Object
    }

    pub fn is_array(&self) -> bool {
        self.kind == SchemaKind::Array
    }

    pub fn is_logical(&self) -> bool {
        self.kind == SchemaKind::Logical
    }

    /// Path from the root as a JSON Pointer, empty for the root itself.
    pub fn schema_path(&self) -> String {
        render_pointer(&self.path_parts)
    }

    pub(crate) fn path_parts(&self) -> &[String] {
        &self.path_parts
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child_keys(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Child by composite key, e.g. `properties/name` or `items/0`.
    pub fn child(&self, key: &str) -> Option<Arc<Schema>> {
        self.children.get(key).cloned()
    }

    /// Item schema by tuple position (or the single `items` schema at 0).
    pub fn item_schema(&self, index: usize) -> Option<Arc<Schema>> {
        self.item_schemas.get(index).cloned()
    }

    pub fn item_count(&self) -> usize {
        self.item_schemas.len()
    }

    // ===== Metadata =====

    /// The raw definition backing this node, immutable after construction.
    pub fn definition(&self) -> &DynValue {
        &self.definition
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn schema_uri(&self) -> Option<&str> {
        self.schema_uri.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn default_value(&self) -> Option<&DynValue> {
        self.definition.get("default")
    }

    pub fn has_default_value(&self) -> bool {
        self.default_value().is_some()
    }

    /// Custom annotation keywords, e.g. `x-host-hint`.
    pub fn custom_metadata(&self, key: &str) -> Option<&DynValue> {
        self.definition.get(key)
    }

    // ===== Pointer navigation =====

    /// Navigate to a node by JSON Pointer, always starting from the root.
    ///
    /// Both composite segments (`/properties/name`) and bare names
    /// (`/name`, tried under `properties/`, `definitions/`, `$defs/`) are
    /// accepted, and `~0`/`~1` escapes are decoded.
    pub fn get_at_path(&self, path: &str) -> Option<Arc<Schema>> {
        let root = self.root()?;
        let pointer = JsonPath::parse_pointer(path);
        if pointer.is_root() {
            return Some(root);
        }

        let parts = pointer.segments();
        let mut current = root;
        let mut i = 0;
        while i < parts.len() {
            let part = &parts[i];

            let mut next = current.child(part);
            // Keyword + name pairs are stored under one composite key.
            if next.is_none() && i + 1 < parts.len() {
                let combined = format!("{part}/{}", parts[i + 1]);
                if let Some(found) = current.child(&combined) {
                    next = Some(found);
                    i += 1;
                }
            }
            // A bare name may address a property or definition directly.
            if next.is_none() {
                next = ["properties", "definitions", "$defs"]
                    .iter()
                    .find_map(|prefix| current.child(&format!("{prefix}/{part}")));
            }

            current = next?;
            i += 1;
        }
        Some(current)
    }

    // ===== Reference resolution =====

    /// Resolve a `$ref` URI against this document's root or the registry.
    pub(crate) fn resolve_reference(&self, reference_uri: &str) -> Option<Arc<Schema>> {
        let uri = reference_uri.trim();
        if uri.is_empty() {
            return None;
        }

        if uri == "#" {
            return self.root();
        }

        if let Some(pointer) = uri.strip_prefix("#/") {
            return self.root()?.get_at_path(&normalize_pointer(pointer));
        }

        if uri.starts_with('#') {
            warn!(reference = uri, "anchor references are not supported");
            return None;
        }

        match uri.split_once('#') {
            Some((schema_id, fragment)) => {
                let Some(external) = registry::registered_schema(schema_id) else {
                    warn!(schema_id, "external schema not found in registry");
                    return None;
                };
                if fragment.is_empty() {
                    return Some(external);
                }
                if fragment.starts_with('/') {
                    external.get_at_path(&normalize_pointer(fragment))
                } else {
                    warn!(reference = uri, "external anchor references are not supported");
                    None
                }
            }
            None => registry::registered_schema(uri),
        }
    }

    // ===== Compilation state =====

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, CompileState> {
        // A poisoned lock only means another thread panicked mid-update;
        // the state itself is a plain value, so keep going.
        self.compiled.lock().unwrap_or_else(|err| err.into_inner())
    }

    pub(crate) fn set_compile_result(&self, rules: Arc<RuleGroup>, errors: Vec<CompileError>) {
        let mut state = self.lock_state();
        state.rules = Some(rules);
        state.errors = errors;
        state.is_compiled = true;
    }

    /// Adopt a cache hit: only the first completed compilation wins.
    pub(crate) fn adopt_cached_rules(&self, rules: Arc<RuleGroup>) {
        let mut state = self.lock_state();
        if !state.is_compiled {
            state.rules = Some(rules);
            state.errors.clear();
            state.is_compiled = true;
        }
    }

    pub(crate) fn compiled_rules(&self) -> Option<Arc<RuleGroup>> {
        self.lock_state().rules.clone()
    }

    pub fn is_compiled(&self) -> bool {
        self.lock_state().is_compiled
    }

    /// Compiled without errors.
    pub fn is_valid(&self) -> bool {
        let state = self.lock_state();
        state.is_compiled && state.errors.is_empty()
    }

    pub fn compile_errors(&self) -> Vec<CompileError> {
        self.lock_state().errors.clone()
    }

    pub fn compile_error_summary(&self) -> String {
        let state = self.lock_state();
        if !state.is_compiled {
            return "Schema is not compiled".to_string();
        }
        if state.errors.is_empty() {
            return String::new();
        }
        let mut summary = format!(
            "Schema compilation failed with {} error(s):\n",
            state.errors.len()
        );
        for (i, error) in state.errors.iter().enumerate() {
            summary.push_str(&format!("  [{}] {}", i + 1, error));
            if i + 1 < state.errors.len() {
                summary.push('\n');
            }
        }
        summary
    }

    // ===== Validation =====

    /// Validate a value against this schema.
    ///
    /// Compiles on demand. Never panics: compile errors are reprojected as
    /// validation errors (keyword `schema`) so callers see one uniform
    /// shape.
    pub fn validate(self: &Arc<Self>, value: &DynValue) -> ValidationResult {
        compiler::ensure_compiled(self);

        let rules = {
            let state = self.lock_state();
            if !state.errors.is_empty() {
                let errors = state
                    .errors
                    .iter()
                    .map(|error| ValidationError {
                        message: error.message.clone(),
                        instance_path_parts: Vec::new(),
                        schema_path_parts: error.schema_path_parts.clone(),
                        keyword: "schema".to_string(),
                        invalid_value: DynValue::Null,
                    })
                    .collect();
                return ValidationResult::from_errors(errors);
            }
            match state.rules.clone() {
                Some(rules) => rules,
                None => {
                    return ValidationResult::from_errors(vec![ValidationError {
                        message: "Schema not compiled".to_string(),
                        instance_path_parts: Vec::new(),
                        schema_path_parts: Vec::new(),
                        keyword: "schema".to_string(),
                        invalid_value: DynValue::Null,
                    }]);
                }
            }
        };

        let mut ctx = ValidationContext::new();
        rules.validate(value, &mut ctx);
        ValidationResult::from_context(ctx)
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = if self.is_root() {
            "root".to_string()
        } else {
            format!("path: {}", self.schema_path())
        };
        match self.kind {
            SchemaKind::Object => {
                write!(f, "Schema({location}, object, {} children)", self.child_count())
            }
            SchemaKind::Array => {
                write!(f, "Schema({location}, array, {} items)", self.item_count())
            }
            kind => write!(f, "Schema({location}, {kind})"),
        }
    }
}

/// Expand scalar shorthands into full schema objects. Booleans stay raw:
/// `true` compiles to an empty group, `false` to an always-fail rule.
fn promote_definition(definition: DynValue) -> DynValue {
    let promoted = |key: &str, value: DynValue| {
        let mut map = Object::new();
        map.insert(key.to_string(), value);
        DynValue::Object(map)
    };
    match definition {
        DynValue::Object(_) | DynValue::Bool(_) => definition,
        DynValue::Str(name) => promoted("type", DynValue::Str(name)),
        DynValue::Array(names) => promoted("type", DynValue::Array(names)),
        DynValue::Null => promoted("type", DynValue::Str("null".to_string())),
        value @ (DynValue::Int(_) | DynValue::Num(_)) => promoted("const", value),
    }
}

fn detect_kind(definition: &DynValue) -> SchemaKind {
    let Some(map) = definition.as_object() else {
        return SchemaKind::Scalar;
    };

    // Explicit type wins, including inside a type union.
    let type_names: Vec<&str> = match map.get("type") {
        Some(DynValue::Str(name)) => vec![name.as_str()],
        Some(DynValue::Array(names)) => names.iter().filter_map(DynValue::as_str).collect(),
        _ => Vec::new(),
    };
    for name in type_names {
        if name == "array" {
            return SchemaKind::Array;
        }
        if name == "object" {
            return SchemaKind::Object;
        }
    }

    const ARRAY_KEYWORDS: [&str; 6] = [
        "items",
        "minItems",
        "maxItems",
        "uniqueItems",
        "additionalItems",
        "contains",
    ];
    if ARRAY_KEYWORDS.iter().any(|key| map.contains_key(*key)) {
        return SchemaKind::Array;
    }

    const OBJECT_KEYWORDS: [&str; 8] = [
        "properties",
        "required",
        "additionalProperties",
        "patternProperties",
        "minProperties",
        "maxProperties",
        "dependencies",
        "propertyNames",
    ];
    if OBJECT_KEYWORDS.iter().any(|key| map.contains_key(*key)) {
        return SchemaKind::Object;
    }

    const LOGICAL_KEYWORDS: [&str; 7] = ["allOf", "anyOf", "oneOf", "not", "if", "then", "else"];
    if LOGICAL_KEYWORDS.iter().any(|key| map.contains_key(*key)) {
        return SchemaKind::Logical;
    }

    SchemaKind::Scalar
}

/// Recursively constructs the child nodes of one definition.
struct ChildBuilder {
    root: Weak<Schema>,
    path_parts: Vec<String>,
    children: AHashMap<String, Arc<Schema>>,
    item_schemas: Vec<Arc<Schema>>,
}

impl ChildBuilder {
    fn construct(&mut self, definition: &DynValue) {
        let Some(map) = definition.as_object() else {
            return; // Boolean schemas have no children.
        };

        // Object keywords.
        if let Some(DynValue::Object(properties)) = map.get("properties") {
            for (name, value) in properties {
                self.add_child(&format!("properties/{name}"), value.clone());
            }
        }
        self.add_child_if_present(map, "propertyNames");
        if let Some(DynValue::Object(patterns)) = map.get("patternProperties") {
            for (pattern, value) in patterns {
                self.add_child(&format!("patternProperties/{pattern}"), value.clone());
            }
        }
        self.add_child_if_present(map, "additionalProperties");
        if let Some(DynValue::Object(dependencies)) = map.get("dependencies") {
            for (name, value) in dependencies {
                // Array-valued entries are property dependencies, not
                // schemas; only object/boolean forms become children.
                if matches!(value, DynValue::Object(_) | DynValue::Bool(_)) {
                    self.add_child(&format!("dependencies/{name}"), value.clone());
                }
            }
        }

        // Array keywords.
        match map.get("items") {
            Some(DynValue::Array(tuple)) => {
                for (i, value) in tuple.iter().enumerate() {
                    let child = self.add_child(&format!("items/{i}"), value.clone());
                    self.item_schemas.push(child);
                }
            }
            Some(value) => {
                let child = self.add_child("items", value.clone());
                self.item_schemas.push(child);
            }
            None => {}
        }
        self.add_child_if_present(map, "additionalItems");
        self.add_child_if_present(map, "contains");

        // Logical composition.
        for keyword in ["allOf", "anyOf", "oneOf"] {
            if let Some(DynValue::Array(branches)) = map.get(keyword) {
                for (i, value) in branches.iter().enumerate() {
                    self.add_child(&format!("{keyword}/{i}"), value.clone());
                }
            }
        }
        self.add_child_if_present(map, "not");
        self.add_child_if_present(map, "if");
        self.add_child_if_present(map, "then");
        self.add_child_if_present(map, "else");

        // Definitions, addressable by `$ref`.
        for keyword in ["definitions", "$defs"] {
            if let Some(DynValue::Object(definitions)) = map.get(keyword) {
                for (name, value) in definitions {
                    self.add_child(&format!("{keyword}/{name}"), value.clone());
                }
            }
        }
    }

    fn add_child_if_present(&mut self, map: &Object, key: &str) {
        if let Some(value) = map.get(key) {
            self.add_child(key, value.clone());
        }
    }

    fn add_child(&mut self, key: &str, raw: DynValue) -> Arc<Schema> {
        let definition = promote_definition(raw);
        let mut child_parts = self.path_parts.clone();
        child_parts.extend(key.split('/').map(str::to_string));
        let child = Arc::new(Schema::new_node(definition, self.root.clone(), child_parts));
        self.children.insert(key.to_string(), child.clone());
        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(entries: &[(&str, DynValue)]) -> DynValue {
        let mut map = Object::new();
        for (key, value) in entries {
            map.insert(key.to_string(), value.clone());
        }
        DynValue::Object(map)
    }

    #[test]
    fn kind_detection_prefers_explicit_type() {
        assert_eq!(
            detect_kind(&object(&[("type", DynValue::Str("object".into()))])),
            SchemaKind::Object
        );
        assert_eq!(
            detect_kind(&object(&[(
                "type",
                DynValue::Array(vec![DynValue::Str("null".into()), DynValue::Str("array".into())])
            )])),
            SchemaKind::Array
        );
        assert_eq!(
            detect_kind(&object(&[("minItems", DynValue::Int(1))])),
            SchemaKind::Array
        );
        assert_eq!(
            detect_kind(&object(&[("required", DynValue::Array(vec![]))])),
            SchemaKind::Object
        );
        assert_eq!(
            detect_kind(&object(&[("not", object(&[]))])),
            SchemaKind::Logical
        );
        assert_eq!(
            detect_kind(&object(&[("minLength", DynValue::Int(1))])),
            SchemaKind::Scalar
        );
    }

    #[test]
    fn shorthand_promotion() {
        assert_eq!(
            promote_definition(DynValue::Str("integer".into())),
            object(&[("type", DynValue::Str("integer".into()))])
        );
        assert_eq!(
            promote_definition(DynValue::Null),
            object(&[("type", DynValue::Str("null".into()))])
        );
        assert_eq!(
            promote_definition(DynValue::Int(3)),
            object(&[("const", DynValue::Int(3))])
        );
        assert_eq!(promote_definition(DynValue::Bool(false)), DynValue::Bool(false));
    }

    #[test]
    fn children_use_composite_keys() {
        let schema = build_schema(
            object(&[
                (
                    "properties",
                    object(&[("name", object(&[("type", DynValue::Str("string".into()))]))]),
                ),
                (
                    "items",
                    DynValue::Array(vec![
                        object(&[("type", DynValue::Str("integer".into()))]),
                        DynValue::Str("string".into()),
                    ]),
                ),
                ("not", object(&[])),
                (
                    "definitions",
                    object(&[("entry", object(&[]))]),
                ),
            ]),
            false,
        );
        assert!(schema.has_child("properties/name"));
        assert!(schema.has_child("items/0"));
        assert!(schema.has_child("items/1"));
        assert!(schema.has_child("not"));
        assert!(schema.has_child("definitions/entry"));
        assert_eq!(schema.item_count(), 2);

        // Shorthand child got promoted to a full definition.
        let second = schema.child("items/1").unwrap();
        assert_eq!(
            second.definition(),
            &object(&[("type", DynValue::Str("string".into()))])
        );
        assert_eq!(second.schema_path(), "/items/1");
        assert!(!second.is_root());
        assert!(second.root().unwrap().is_root());
    }

    #[test]
    fn get_at_path_accepts_composite_and_bare_segments() {
        let schema = build_schema(
            object(&[
                (
                    "properties",
                    object(&[("user", object(&[(
                        "properties",
                        object(&[("name", object(&[]))]),
                    )]))]),
                ),
                ("definitions", object(&[("coin", object(&[]))])),
            ]),
            false,
        );
        let by_composite = schema.get_at_path("/properties/user/properties/name").unwrap();
        assert_eq!(by_composite.schema_path(), "/properties/user/properties/name");

        let by_bare = schema.get_at_path("/user/name").unwrap();
        assert!(Arc::ptr_eq(&by_composite, &by_bare));

        assert!(schema.get_at_path("/definitions/coin").is_some());
        assert!(schema.get_at_path("/coin").is_some());
        assert!(schema.get_at_path("/missing").is_none());
    }

    #[test]
    fn metadata_extraction() {
        let schema = build_schema(
            object(&[
                ("$id", DynValue::Str("tag:veld-test-metadata".into())),
                ("$schema", DynValue::Str("http://json-schema.org/draft-07/schema#".into())),
                ("title", DynValue::Str("T".into())),
                ("description", DynValue::Str("D".into())),
                ("$comment", DynValue::Str("C".into())),
                ("default", DynValue::Int(4)),
                ("x-host-hint", DynValue::Str("inline".into())),
            ]),
            false,
        );
        assert_eq!(schema.id(), Some("tag:veld-test-metadata"));
        assert_eq!(schema.title(), Some("T"));
        assert_eq!(schema.description(), Some("D"));
        assert_eq!(schema.comment(), Some("C"));
        assert_eq!(schema.default_value(), Some(&DynValue::Int(4)));
        assert_eq!(
            schema.custom_metadata("x-host-hint"),
            Some(&DynValue::Str("inline".into()))
        );
        // Auto-registered by $id.
        assert!(crate::registry::is_schema_registered("tag:veld-test-metadata"));
        crate::registry::unregister_schema("tag:veld-test-metadata");
    }
}
