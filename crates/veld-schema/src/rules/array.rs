//! Array constraints: size bounds, uniqueness and `contains`.

use std::sync::Arc;

use veld_value::DynValue;

use crate::context::ValidationContext;
use crate::rules::RuleGroup;

/// `minItems`.
#[derive(Debug)]
pub(crate) struct MinItemsRule {
    min: i64,
}

impl MinItemsRule {
    pub fn new(min: i64) -> Self {
        MinItemsRule { min }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let size = target.array_len();
        if size < 0 {
            return true;
        }
        if size < self.min {
            ctx.add_error(
                format!("Array has {size} items but minimum is {}", self.min),
                "minItems",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `maxItems`.
#[derive(Debug)]
pub(crate) struct MaxItemsRule {
    max: i64,
}

impl MaxItemsRule {
    pub fn new(max: i64) -> Self {
        MaxItemsRule { max }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let size = target.array_len();
        if size < 0 {
            return true;
        }
        if size > self.max {
            ctx.add_error(
                format!("Array has {size} items but maximum is {}", self.max),
                "maxItems",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `uniqueItems: true`. Uniqueness is structural, so nested arrays and
/// objects compare recursively (and `1` duplicates `1.0`).
///
/// The error is reported at the duplicate element's own path, not at the
/// array.
#[derive(Debug)]
pub(crate) struct UniqueItemsRule;

impl UniqueItemsRule {
    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(items) = target.as_array() else {
            return true;
        };
        for (i, item) in items.iter().enumerate() {
            if items[..i].iter().any(|seen| seen == item) {
                let mut child = ctx.child_instance(&i.to_string());
                child.add_error(
                    format!("Array contains duplicate item at index {i}: {item}"),
                    "uniqueItems",
                    item.clone(),
                );
                ctx.merge(child);
                return false;
            }
        }
        true
    }
}

/// `contains`: at least one element must satisfy the nested schema.
/// Empty arrays fail; non-arrays pass (rule not applicable). An empty
/// nested group means `contains: true`, which any non-empty array satisfies.
#[derive(Debug)]
pub(crate) struct ContainsRule {
    rules: Arc<RuleGroup>,
}

impl ContainsRule {
    pub fn new(rules: Arc<RuleGroup>) -> Self {
        ContainsRule { rules }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(items) = target.as_array() else {
            return true;
        };
        if items.is_empty() {
            ctx.add_error(
                "Empty array cannot contain any items",
                "contains",
                target.clone(),
            );
            return false;
        }
        if self.rules.is_empty() {
            return true;
        }
        for (i, item) in items.iter().enumerate() {
            // Probe in a throwaway context: failed attempts are not errors.
            let mut probe = ctx.child_instance(&i.to_string());
            if self.rules.validate(item, &mut probe) {
                return true;
            }
        }
        ctx.add_error(
            format!(
                "Array with {} items does not contain any item matching the required schema",
                items.len()
            ),
            "contains",
            target.clone(),
        );
        false
    }
}
