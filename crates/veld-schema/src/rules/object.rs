//! Object constraints: property counts, required keys and dependencies.

use std::sync::Arc;

use veld_value::DynValue;

use crate::context::ValidationContext;
use crate::rules::RuleGroup;

/// `minProperties`.
#[derive(Debug)]
pub(crate) struct MinPropertiesRule {
    min: usize,
}

impl MinPropertiesRule {
    pub fn new(min: usize) -> Self {
        MinPropertiesRule { min }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(map) = target.as_object() else {
            return true;
        };
        if map.len() < self.min {
            ctx.add_error(
                format!(
                    "Object has {} properties but minimum is {}",
                    map.len(),
                    self.min
                ),
                "minProperties",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `maxProperties`.
#[derive(Debug)]
pub(crate) struct MaxPropertiesRule {
    max: usize,
}

impl MaxPropertiesRule {
    pub fn new(max: usize) -> Self {
        MaxPropertiesRule { max }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(map) = target.as_object() else {
            return true;
        };
        if map.len() > self.max {
            ctx.add_error(
                format!(
                    "Object has {} properties but maximum is {}",
                    map.len(),
                    self.max
                ),
                "maxProperties",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `required`: every listed key must be present. One error per missing key.
#[derive(Debug)]
pub(crate) struct RequiredRule {
    properties: Vec<String>,
}

impl RequiredRule {
    pub fn new(properties: Vec<String>) -> Self {
        RequiredRule { properties }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(map) = target.as_object() else {
            return true;
        };
        let mut all_present = true;
        for property in &self.properties {
            if !map.contains_key(property) {
                ctx.add_error(
                    format!("Required property \"{property}\" is missing"),
                    "required",
                    DynValue::Null,
                );
                all_present = false;
            }
        }
        all_present
    }
}

#[derive(Debug)]
pub(crate) enum DependencyKind {
    /// Property dependency: these keys must also be present.
    Properties(Vec<String>),
    /// Schema dependency: the whole object must also satisfy this schema.
    Schema(Arc<RuleGroup>),
}

/// One entry of the `dependencies` keyword, triggered only when the object
/// carries the trigger key.
#[derive(Debug)]
pub(crate) struct DependencyRule {
    trigger: String,
    kind: DependencyKind,
}

impl DependencyRule {
    pub fn new(trigger: impl Into<String>, kind: DependencyKind) -> Self {
        DependencyRule {
            trigger: trigger.into(),
            kind,
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(map) = target.as_object() else {
            return true;
        };
        if !map.contains_key(&self.trigger) {
            return true;
        }
        match &self.kind {
            DependencyKind::Properties(required) => {
                let mut all_present = true;
                for property in required {
                    if !map.contains_key(property) {
                        ctx.add_error(
                            format!(
                                "Property '{property}' is required when '{}' is present",
                                self.trigger
                            ),
                            "dependencies",
                            DynValue::Null,
                        );
                        all_present = false;
                    }
                }
                all_present
            }
            DependencyKind::Schema(rules) => {
                let mut child = ctx.child_schema(&format!("dependencies/{}", self.trigger));
                let ok = rules.validate(target, &mut child);
                ctx.merge(child);
                ok
            }
        }
    }
}
