//! The rule compiler: schema node -> rule group.
//!
//! Compilation is lazy, idempotent per node, and de-duplicated through a
//! process-wide cache keyed by a stable hash of the definition. An
//! "in-progress" set breaks compile-time cycles by handing re-entrant
//! frames an empty (always-pass) group; the outer frame completes and
//! caches the real result. Only error-free results are cached, and the
//! cache lock is never held across nested compilation.
//!
//! Rules are emitted in a fixed keyword order: `$ref` short-circuit, then
//! type, value, string, numeric, array, object, logical. That fixed order
//! keeps error lists deterministic for a fixed input.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use ahash::{AHashMap, AHashSet};
use veld_value::DynValue;

use crate::error::CompileError;
use crate::rules::array::{ContainsRule, MaxItemsRule, MinItemsRule, UniqueItemsRule};
use crate::rules::content::{ContentEncodingRule, ContentMediaTypeRule};
use crate::rules::format::FormatRule;
use crate::rules::logical::{AllOfRule, AnyOfRule, ConditionalRule, NotRule, OneOfRule};
use crate::rules::object::{
    DependencyKind, DependencyRule, MaxPropertiesRule, MinPropertiesRule, RequiredRule,
};
use crate::rules::reference::RefRule;
use crate::rules::scalar::{
    ConstRule, EnumRule, ExclusiveMaximumRule, ExclusiveMinimumRule, MaxLengthRule, MaximumRule,
    MinLengthRule, MinimumRule, MultipleOfRule, PatternRule, TypeRule,
};
use crate::rules::{Rule, RuleGroup};
use crate::schema::Schema;
use crate::selector::Selector;

#[derive(Default)]
struct CompilerState {
    cache: AHashMap<u64, Arc<RuleGroup>>,
    /// Definitions currently being compiled, keyed per thread: compile-time
    /// cycles are call-stack recursion, so only same-thread re-entry counts.
    /// A concurrent compile of the same definition on another thread simply
    /// proceeds; the cache's first insert wins.
    in_progress: AHashSet<(std::thread::ThreadId, u64)>,
}

static COMPILER: LazyLock<Mutex<CompilerState>> =
    LazyLock::new(|| Mutex::new(CompilerState::default()));

fn lock_compiler() -> MutexGuard<'static, CompilerState> {
    COMPILER.lock().unwrap_or_else(|err| err.into_inner())
}

/// Compile `schema` if it has not been compiled yet. Safe to call from any
/// number of threads; later callers observe the completed state and skip.
pub(crate) fn ensure_compiled(schema: &Arc<Schema>) {
    if schema.is_compiled() {
        return;
    }
    create_rules(schema);
}

/// The outcome of compiling one node: the (possibly shared) rule group plus
/// any errors collected from the node and its children. `has_ref` marks
/// groups that transitively contain a `$ref` rule; those are bound to their
/// owning tree and must never be shared through the cache.
pub(crate) struct CompileOutcome {
    pub rules: Arc<RuleGroup>,
    pub errors: Vec<CompileError>,
    pub has_ref: bool,
}

#[derive(Default)]
struct CompileResult {
    group: RuleGroup,
    errors: Vec<CompileError>,
    has_ref: bool,
}

impl CompileResult {
    fn add_error(&mut self, schema: &Schema, message: impl Into<String>, key: &str) {
        let mut parts = schema.path_parts().to_vec();
        parts.extend(key.split('/').filter(|p| !p.is_empty()).map(str::to_string));
        self.errors.push(CompileError::new(message, parts));
    }

    fn absorb(&mut self, outcome: &CompileOutcome) {
        self.errors.extend(outcome.errors.iter().cloned());
        self.has_ref |= outcome.has_ref;
    }
}

fn create_rules(schema: &Arc<Schema>) -> CompileOutcome {
    // Boolean schemas compile directly and need no cache round-trip.
    if let DynValue::Bool(allow) = schema.definition() {
        let mut group = RuleGroup::new();
        if !allow {
            group.push(Selector::Value, Rule::False);
        }
        let rules = Arc::new(group);
        schema.set_compile_result(rules.clone(), Vec::new());
        return CompileOutcome {
            rules,
            errors: Vec::new(),
            has_ref: false,
        };
    }

    // $ref short-circuits every sibling keyword (Draft 7 behaviour), and is
    // never cached: the rule is bound to its owning node.
    if schema.definition().has("$ref") {
        return compile_ref(schema);
    }

    let hash = schema.definition().stable_hash();
    let progress_key = (std::thread::current().id(), hash);
    {
        let mut state = lock_compiler();
        if state.in_progress.contains(&progress_key) {
            // Re-entered the definition currently being compiled: break the
            // cycle with an empty group; the outer frame caches the result.
            return CompileOutcome {
                rules: Arc::new(RuleGroup::new()),
                errors: Vec::new(),
                has_ref: false,
            };
        }
        if let Some(cached) = state.cache.get(&hash) {
            let rules = cached.clone();
            drop(state);
            schema.adopt_cached_rules(rules.clone());
            return CompileOutcome {
                rules,
                errors: Vec::new(),
                has_ref: false,
            };
        }
        state.in_progress.insert(progress_key);
    }

    let mut result = CompileResult::default();
    if let Some(type_def) = schema.definition().get("type") {
        compile_type(schema, type_def, &mut result);
    }
    compile_value(schema, &mut result);
    compile_string(schema, &mut result);
    compile_numeric(schema, &mut result);
    compile_array(schema, &mut result);
    compile_object(schema, &mut result);
    compile_logical(schema, &mut result);

    let rules = Arc::new(result.group);
    {
        let mut state = lock_compiler();
        // Only valid, ref-free results are cached: errors must resurface on
        // recompilation, and ref rules stay bound to their owning tree.
        if result.errors.is_empty() && !result.has_ref {
            state.cache.entry(hash).or_insert_with(|| rules.clone());
        }
        state.in_progress.remove(&progress_key);
    }
    schema.set_compile_result(rules.clone(), result.errors.clone());
    CompileOutcome {
        rules,
        errors: result.errors,
        has_ref: result.has_ref,
    }
}

fn compile_child(schema: &Schema, key: &str) -> Option<CompileOutcome> {
    schema.child(key).map(|child| create_rules(&child))
}

/// Lenient non-negative integer coercion for bounded keywords: integral
/// floats are accepted, everything else is a compile error at the caller.
fn non_negative_int(value: &DynValue) -> Option<i64> {
    value.as_i64().filter(|n| *n >= 0)
}

fn compile_ref(schema: &Arc<Schema>) -> CompileOutcome {
    let mut result = CompileResult::default();
    match schema.definition().get("$ref") {
        Some(DynValue::Str(uri)) if !uri.is_empty() => {
            result
                .group
                .push(Selector::Value, Rule::Ref(RefRule::new(uri.clone(), schema)));
        }
        Some(DynValue::Str(_)) => result.add_error(schema, "$ref cannot be empty", "$ref"),
        _ => result.add_error(schema, "$ref must be a string", "$ref"),
    }
    let rules = Arc::new(result.group);
    schema.set_compile_result(rules.clone(), result.errors.clone());
    CompileOutcome {
        rules,
        errors: result.errors,
        has_ref: true,
    }
}

fn compile_type(schema: &Arc<Schema>, type_def: &DynValue, result: &mut CompileResult) {
    match type_def {
        DynValue::Str(name) => {
            result
                .group
                .push(Selector::Value, Rule::Type(TypeRule::single(name.clone())));
        }
        DynValue::Array(entries) => {
            let mut names = Vec::with_capacity(entries.len());
            for (i, entry) in entries.iter().enumerate() {
                match entry.as_str() {
                    Some(name) => names.push(name.to_string()),
                    None => {
                        result.add_error(
                            schema,
                            format!(
                                "type array element must be a string, got {}",
                                entry.json_type()
                            ),
                            &format!("type/{i}"),
                        );
                        return;
                    }
                }
            }
            if !names.is_empty() {
                result
                    .group
                    .push(Selector::Value, Rule::Type(TypeRule::union(names)));
            }
        }
        _ => result.add_error(schema, "type must be a string or an array of strings", "type"),
    }
}

fn compile_value(schema: &Arc<Schema>, result: &mut CompileResult) {
    let def = schema.definition();
    if let Some(constant) = def.get("const") {
        result.group.push(
            Selector::Value,
            Rule::Const(ConstRule::new(constant.clone())),
        );
    }
    match def.get("enum") {
        Some(DynValue::Array(values)) => {
            result
                .group
                .push(Selector::Value, Rule::Enum(EnumRule::new(values.clone())));
        }
        Some(_) => result.add_error(schema, "enum must be an array", "enum"),
        None => {}
    }
    // `default` is an annotation, not a constraint; it stays in the
    // definition and is exposed through Schema::default_value.
}

fn compile_string(schema: &Arc<Schema>, result: &mut CompileResult) {
    let def = schema.definition();

    if let Some(value) = def.get("minLength") {
        match non_negative_int(value) {
            Some(min) => result.group.push(
                Selector::Value,
                Rule::MinLength(MinLengthRule::new(min as usize)),
            ),
            None => result.add_error(schema, "minLength must be a non-negative integer", "minLength"),
        }
    }
    if let Some(value) = def.get("maxLength") {
        match non_negative_int(value) {
            Some(max) => result.group.push(
                Selector::Value,
                Rule::MaxLength(MaxLengthRule::new(max as usize)),
            ),
            None => result.add_error(schema, "maxLength must be a non-negative integer", "maxLength"),
        }
    }
    if let Some(value) = def.get("pattern") {
        match value.as_str() {
            Some(pattern) => result
                .group
                .push(Selector::Value, Rule::Pattern(PatternRule::new(pattern))),
            None => result.add_error(schema, "pattern must be a string", "pattern"),
        }
    }
    if let Some(value) = def.get("format") {
        match value.as_str() {
            Some(format) => result
                .group
                .push(Selector::Value, Rule::Format(FormatRule::new(format))),
            None => result.add_error(schema, "format must be a string", "format"),
        }
    }
    if let Some(value) = def.get("contentEncoding") {
        match value.as_str() {
            Some(encoding) => result.group.push(
                Selector::Value,
                Rule::ContentEncoding(ContentEncodingRule::new(encoding)),
            ),
            None => result.add_error(schema, "contentEncoding must be a string", "contentEncoding"),
        }
    }
    if let Some(value) = def.get("contentMediaType") {
        match value.as_str() {
            Some(media_type) => result.group.push(
                Selector::Value,
                Rule::ContentMediaType(ContentMediaTypeRule::new(media_type)),
            ),
            None => {
                result.add_error(schema, "contentMediaType must be a string", "contentMediaType")
            }
        }
    }
}

fn compile_numeric(schema: &Arc<Schema>, result: &mut CompileResult) {
    let def = schema.definition();
    let bound = |keyword: &str, build: &dyn Fn(f64) -> Rule, result: &mut CompileResult| {
        if let Some(value) = def.get(keyword) {
            match value.as_f64() {
                Some(number) => result.group.push(Selector::Value, build(number)),
                None => result.add_error(
                    schema,
                    format!("{keyword} must be a number"),
                    keyword,
                ),
            }
        }
    };
    bound("minimum", &|n| Rule::Minimum(MinimumRule::new(n)), result);
    bound("maximum", &|n| Rule::Maximum(MaximumRule::new(n)), result);
    bound(
        "exclusiveMinimum",
        &|n| Rule::ExclusiveMinimum(ExclusiveMinimumRule::new(n)),
        result,
    );
    bound(
        "exclusiveMaximum",
        &|n| Rule::ExclusiveMaximum(ExclusiveMaximumRule::new(n)),
        result,
    );
    bound(
        "multipleOf",
        &|n| Rule::MultipleOf(MultipleOfRule::new(n)),
        result,
    );
}

fn compile_array(schema: &Arc<Schema>, result: &mut CompileResult) {
    let def = schema.definition();

    if let Some(value) = def.get("minItems") {
        match non_negative_int(value) {
            Some(min) => result
                .group
                .push(Selector::Value, Rule::MinItems(MinItemsRule::new(min))),
            None => result.add_error(schema, "minItems must be a non-negative integer", "minItems"),
        }
    }
    if let Some(value) = def.get("maxItems") {
        match non_negative_int(value) {
            Some(max) => result
                .group
                .push(Selector::Value, Rule::MaxItems(MaxItemsRule::new(max))),
            None => result.add_error(schema, "maxItems must be a non-negative integer", "maxItems"),
        }
    }
    match def.get("uniqueItems") {
        Some(DynValue::Bool(true)) => {
            result
                .group
                .push(Selector::Value, Rule::UniqueItems(UniqueItemsRule));
        }
        Some(DynValue::Bool(false)) | None => {}
        Some(_) => result.add_error(schema, "uniqueItems must be a boolean", "uniqueItems"),
    }

    // `items` as a tuple pins per-position schemas and enables
    // `additionalItems`; as a single schema it applies to every element.
    let mut tuple_len: Option<usize> = None;
    match def.get("items") {
        Some(DynValue::Array(tuple)) => {
            tuple_len = Some(tuple.len());
            for i in 0..tuple.len() {
                if let Some(outcome) = compile_child(schema, &format!("items/{i}")) {
                    result.absorb(&outcome);
                    if !outcome.rules.is_empty() {
                        result
                            .group
                            .push(Selector::ArrayItem(i), Rule::Group(outcome.rules));
                    }
                }
            }
        }
        Some(_) => {
            if let Some(outcome) = compile_child(schema, "items") {
                result.absorb(&outcome);
                if !outcome.rules.is_empty() {
                    result
                        .group
                        .push(Selector::ArrayItems, Rule::Group(outcome.rules));
                }
            }
        }
        None => {}
    }

    if let Some(tuple_len) = tuple_len {
        if let Some(outcome) = compile_child(schema, "additionalItems") {
            result.absorb(&outcome);
            if !outcome.rules.is_empty() {
                result.group.push(
                    Selector::AdditionalItems(tuple_len),
                    Rule::Group(outcome.rules),
                );
            }
        }
    }

    if let Some(outcome) = compile_child(schema, "contains") {
        result.absorb(&outcome);
        // Added even for an empty nested group: `contains: true` still
        // rejects empty arrays.
        result.group.push(
            Selector::Value,
            Rule::Contains(ContainsRule::new(outcome.rules)),
        );
    }
}

fn compile_object(schema: &Arc<Schema>, result: &mut CompileResult) {
    let def = schema.definition();

    if let Some(value) = def.get("minProperties") {
        match non_negative_int(value) {
            Some(min) => result.group.push(
                Selector::Value,
                Rule::MinProperties(MinPropertiesRule::new(min as usize)),
            ),
            None => result.add_error(
                schema,
                "minProperties must be a non-negative integer",
                "minProperties",
            ),
        }
    }
    if let Some(value) = def.get("maxProperties") {
        match non_negative_int(value) {
            Some(max) => result.group.push(
                Selector::Value,
                Rule::MaxProperties(MaxPropertiesRule::new(max as usize)),
            ),
            None => result.add_error(
                schema,
                "maxProperties must be a non-negative integer",
                "maxProperties",
            ),
        }
    }

    match def.get("required") {
        Some(DynValue::Array(entries)) => {
            let names: Vec<String> = entries
                .iter()
                .filter_map(DynValue::as_str)
                .map(str::to_string)
                .collect();
            if !names.is_empty() {
                result
                    .group
                    .push(Selector::Value, Rule::Required(RequiredRule::new(names)));
            }
        }
        Some(_) => result.add_error(schema, "required must be an array of strings", "required"),
        None => {}
    }

    if let Some(DynValue::Object(properties)) = def.get("properties") {
        for name in properties.keys() {
            if let Some(outcome) = compile_child(schema, &format!("properties/{name}")) {
                result.absorb(&outcome);
                if !outcome.rules.is_empty() {
                    result
                        .group
                        .push(Selector::property(name.as_str()), Rule::Group(outcome.rules));
                }
            }
        }
    }

    if let Some(outcome) = compile_child(schema, "propertyNames") {
        result.absorb(&outcome);
        if !outcome.rules.is_empty() {
            result
                .group
                .push(Selector::ObjectKeys, Rule::Group(outcome.rules));
        }
    }

    if let Some(DynValue::Object(patterns)) = def.get("patternProperties") {
        for pattern in patterns.keys() {
            if let Some(outcome) = compile_child(schema, &format!("patternProperties/{pattern}")) {
                result.absorb(&outcome);
                if !outcome.rules.is_empty() {
                    result.group.push(
                        Selector::pattern_properties(pattern),
                        Rule::Group(outcome.rules),
                    );
                }
            }
        }
    }

    if let Some(outcome) = compile_child(schema, "additionalProperties") {
        result.absorb(&outcome);
        if !outcome.rules.is_empty() {
            let known: Vec<String> = match def.get("properties") {
                Some(DynValue::Object(properties)) => properties.keys().cloned().collect(),
                _ => Vec::new(),
            };
            let patterns: Vec<String> = match def.get("patternProperties") {
                Some(DynValue::Object(patterns)) => patterns.keys().cloned().collect(),
                _ => Vec::new(),
            };
            result.group.push(
                Selector::additional_properties(known, &patterns),
                Rule::Group(outcome.rules),
            );
        }
    }

    if let Some(DynValue::Object(dependencies)) = def.get("dependencies") {
        for (name, value) in dependencies {
            match value {
                DynValue::Array(entries) => {
                    let required: Vec<String> = entries
                        .iter()
                        .filter_map(DynValue::as_str)
                        .map(str::to_string)
                        .collect();
                    if !required.is_empty() {
                        result.group.push(
                            Selector::Value,
                            Rule::Dependency(DependencyRule::new(
                                name.clone(),
                                DependencyKind::Properties(required),
                            )),
                        );
                    }
                }
                DynValue::Object(_) | DynValue::Bool(_) => {
                    if let Some(outcome) = compile_child(schema, &format!("dependencies/{name}")) {
                        result.absorb(&outcome);
                        if !outcome.rules.is_empty() {
                            result.group.push(
                                Selector::Value,
                                Rule::Dependency(DependencyRule::new(
                                    name.clone(),
                                    DependencyKind::Schema(outcome.rules),
                                )),
                            );
                        }
                    }
                }
                _ => result.add_error(
                    schema,
                    "dependencies entries must be arrays of property names or schemas",
                    &format!("dependencies/{name}"),
                ),
            }
        }
    }
}

fn compile_logical(schema: &Arc<Schema>, result: &mut CompileResult) {
    let def = schema.definition();

    let branches_of = |keyword: &str, result: &mut CompileResult| -> Option<Vec<Arc<RuleGroup>>> {
        match def.get(keyword) {
            Some(DynValue::Array(entries)) => {
                let mut branches = Vec::with_capacity(entries.len());
                for i in 0..entries.len() {
                    if let Some(outcome) = compile_child(schema, &format!("{keyword}/{i}")) {
                        result.absorb(&outcome);
                        branches.push(outcome.rules);
                    }
                }
                Some(branches)
            }
            Some(_) => {
                result.add_error(
                    schema,
                    format!("{keyword} must be an array of schemas"),
                    keyword,
                );
                None
            }
            None => None,
        }
    };

    if let Some(branches) = branches_of("allOf", result) {
        result
            .group
            .push(Selector::Value, Rule::AllOf(AllOfRule::new(branches)));
    }
    if let Some(branches) = branches_of("anyOf", result) {
        result
            .group
            .push(Selector::Value, Rule::AnyOf(AnyOfRule::new(branches)));
    }
    if let Some(branches) = branches_of("oneOf", result) {
        result
            .group
            .push(Selector::Value, Rule::OneOf(OneOfRule::new(branches)));
    }

    if let Some(outcome) = compile_child(schema, "not") {
        result.absorb(&outcome);
        result
            .group
            .push(Selector::Value, Rule::Not(NotRule::new(outcome.rules)));
    }

    if def.has("if") {
        let if_rules = compile_child(schema, "if").map(|outcome| {
            result.absorb(&outcome);
            outcome.rules
        });
        let then_rules = compile_child(schema, "then").map(|outcome| {
            result.absorb(&outcome);
            outcome.rules
        });
        let else_rules = compile_child(schema, "else").map(|outcome| {
            result.absorb(&outcome);
            outcome.rules
        });
        if let Some(if_rules) = if_rules {
            result.group.push(
                Selector::Value,
                Rule::Conditional(ConditionalRule::new(if_rules, then_rules, else_rules)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_schema;
    use veld_value::value::Object;

    fn schema_doc(json: &str) -> DynValue {
        veld_json::parse(json).expect("test schema parses")
    }

    #[test]
    fn identical_definitions_share_compiled_rules() {
        let doc = schema_doc(r#"{"type": "string", "minLength": 2, "pattern": "^a"}"#);
        let first = build_schema(doc.clone(), false);
        let second = build_schema(doc, false);
        let first_rules = first.compiled_rules().unwrap();
        let second_rules = second.compiled_rules().unwrap();
        assert!(Arc::ptr_eq(&first_rules, &second_rules));
    }

    #[test]
    fn structurally_equal_definitions_share_compiled_rules() {
        // Same definition, different key order and numeric flavour.
        let first = build_schema(
            schema_doc(r#"{"minimum": 1, "maximum": 9.0, "type": "number"}"#),
            false,
        );
        let second = build_schema(
            schema_doc(r#"{"type": "number", "maximum": 9, "minimum": 1.0}"#),
            false,
        );
        assert!(Arc::ptr_eq(
            &first.compiled_rules().unwrap(),
            &second.compiled_rules().unwrap()
        ));
    }

    #[test]
    fn invalid_results_are_not_cached() {
        let doc = schema_doc(r#"{"minLength": -3, "veld-cache-probe": 1}"#);
        let first = build_schema(doc.clone(), false);
        assert!(!first.is_valid());
        assert_eq!(first.compile_errors().len(), 1);
        assert_eq!(first.compile_errors()[0].path_string(), "/minLength");

        // A second build re-compiles and reports the same error rather than
        // adopting a cached (error-free) group.
        let second = build_schema(doc, false);
        assert!(!second.is_valid());
        assert_eq!(second.compile_errors().len(), 1);
    }

    #[test]
    fn lenient_integral_float_keywords() {
        let schema = build_schema(schema_doc(r#"{"minLength": 3.0}"#), false);
        assert!(schema.is_valid());
        assert!(!schema
            .validate(&DynValue::Str("ab".into()))
            .is_valid());
    }

    #[test]
    fn wrong_typed_keywords_become_compile_errors() {
        let schema = build_schema(
            schema_doc(r#"{"minimum": "low", "enum": 3, "pattern": 7, "type": 9}"#),
            false,
        );
        assert!(!schema.is_valid());
        let paths: Vec<String> = schema
            .compile_errors()
            .iter()
            .map(CompileError::path_string)
            .collect();
        assert!(paths.contains(&"/minimum".to_string()));
        assert!(paths.contains(&"/enum".to_string()));
        assert!(paths.contains(&"/pattern".to_string()));
        assert!(paths.contains(&"/type".to_string()));
    }

    #[test]
    fn nested_compile_errors_carry_full_paths() {
        let schema = build_schema(
            schema_doc(r#"{"properties": {"age": {"minimum": "x"}}}"#),
            false,
        );
        assert!(!schema.is_valid());
        let error = &schema.compile_errors()[0];
        assert_eq!(error.path_string(), "/properties/age/minimum");
    }

    #[test]
    fn empty_object_compiles_to_empty_group() {
        let schema = build_schema(DynValue::Object(Object::new()), false);
        assert!(schema.is_valid());
        assert!(schema.compiled_rules().unwrap().is_empty());
    }

    #[test]
    fn ref_short_circuits_sibling_keywords() {
        // The sibling minLength would reject "x"; Draft 7 ignores it.
        let target = build_schema(
            schema_doc(r#"{"$id": "tag:veld-ref-sibling", "type": "string"}"#),
            false,
        );
        let _ = target;
        let schema = build_schema(
            schema_doc(r#"{"$ref": "tag:veld-ref-sibling", "minLength": 5}"#),
            false,
        );
        assert!(schema.validate(&DynValue::Str("x".into())).is_valid());
        assert_eq!(schema.compiled_rules().unwrap().len(), 1);
        crate::registry::unregister_schema("tag:veld-ref-sibling");
    }
}
