//! Leaf constraints over scalar values: type, const/enum, string and
//! numeric keywords.
//!
//! Every rule here follows the same contract: it constrains only the types
//! it applies to and passes trivially on everything else (`minLength` on an
//! integer passes). Failures append one error to the context and return
//! `false`.

use regex::Regex;
use tracing::warn;
use veld_value::{DynValue, JsonType};

use crate::context::ValidationContext;

/// The `type` keyword, single or union form.
///
/// `integer` is a subset of `number`, and a float with no fractional part
/// satisfies `integer`.
#[derive(Debug)]
pub(crate) struct TypeRule {
    allowed: Vec<String>,
}

impl TypeRule {
    pub fn single(name: impl Into<String>) -> Self {
        TypeRule {
            allowed: vec![name.into()],
        }
    }

    pub fn union(names: Vec<String>) -> Self {
        TypeRule { allowed: names }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let actual = target.json_type();
        if self.allowed.iter().any(|name| type_matches(actual, name)) {
            return true;
        }
        ctx.add_error(
            format!(
                "Value has type {actual} but expected one of: {}",
                self.allowed.join(", ")
            ),
            "type",
            target.clone(),
        );
        false
    }
}

fn type_matches(actual: JsonType, allowed: &str) -> bool {
    match allowed {
        "number" => matches!(actual, JsonType::Number | JsonType::Integer),
        other => actual.to_string() == other,
    }
}

/// The `const` keyword: structural equality against a fixed value.
#[derive(Debug)]
pub(crate) struct ConstRule {
    value: DynValue,
}

impl ConstRule {
    pub fn new(value: DynValue) -> Self {
        ConstRule { value }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        if *target != self.value {
            ctx.add_error(
                format!("Value {target} does not equal required constant {}", self.value),
                "const",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// The `enum` keyword: structural match against any listed value.
#[derive(Debug)]
pub(crate) struct EnumRule {
    values: Vec<DynValue>,
}

impl EnumRule {
    pub fn new(values: Vec<DynValue>) -> Self {
        EnumRule { values }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        if self.values.iter().any(|value| value == target) {
            return true;
        }
        let allowed = self
            .values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        ctx.add_error(
            format!("Value {target} is not one of the allowed values: {allowed}"),
            "enum",
            target.clone(),
        );
        false
    }
}

/// `minLength`, measured in UTF-8 bytes.
#[derive(Debug)]
pub(crate) struct MinLengthRule {
    min: usize,
}

impl MinLengthRule {
    pub fn new(min: usize) -> Self {
        MinLengthRule { min }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(s) = target.as_str() else {
            return true;
        };
        let length = s.len();
        if length < self.min {
            ctx.add_error(
                format!("String length {length} is less than minimum {}", self.min),
                "minLength",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `maxLength`, measured in UTF-8 bytes.
#[derive(Debug)]
pub(crate) struct MaxLengthRule {
    max: usize,
}

impl MaxLengthRule {
    pub fn new(max: usize) -> Self {
        MaxLengthRule { max }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(s) = target.as_str() else {
            return true;
        };
        let length = s.len();
        if length > self.max {
            ctx.add_error(
                format!("String length {length} exceeds maximum {}", self.max),
                "maxLength",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// The `pattern` keyword.
///
/// An invalid pattern does not poison the schema: the rule compiles, passes
/// non-strings, and reports the broken pattern only when a string actually
/// reaches it.
#[derive(Debug)]
pub(crate) struct PatternRule {
    pattern: String,
    regex: Option<Regex>,
}

impl PatternRule {
    pub fn new(pattern: &str) -> Self {
        let regex = match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(pattern, %err, "invalid pattern regex");
                None
            }
        };
        PatternRule {
            pattern: pattern.to_string(),
            regex,
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(s) = target.as_str() else {
            return true;
        };
        let Some(regex) = &self.regex else {
            ctx.add_error(
                format!("Invalid regex pattern '{}'", self.pattern),
                "pattern",
                target.clone(),
            );
            return false;
        };
        if !regex.is_match(s) {
            ctx.add_error(
                format!("String \"{s}\" does not match pattern '{}'", self.pattern),
                "pattern",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `minimum` (inclusive lower bound over the common f64 domain).
#[derive(Debug)]
pub(crate) struct MinimumRule {
    minimum: f64,
}

impl MinimumRule {
    pub fn new(minimum: f64) -> Self {
        MinimumRule { minimum }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(value) = target.as_f64() else {
            return true;
        };
        if value < self.minimum {
            ctx.add_error(
                format!("Value {value} is less than minimum {}", self.minimum),
                "minimum",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `maximum` (inclusive upper bound).
#[derive(Debug)]
pub(crate) struct MaximumRule {
    maximum: f64,
}

impl MaximumRule {
    pub fn new(maximum: f64) -> Self {
        MaximumRule { maximum }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(value) = target.as_f64() else {
            return true;
        };
        if value > self.maximum {
            ctx.add_error(
                format!("Value {value} exceeds maximum {}", self.maximum),
                "maximum",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `exclusiveMinimum` (Draft 7 numeric form).
#[derive(Debug)]
pub(crate) struct ExclusiveMinimumRule {
    bound: f64,
}

impl ExclusiveMinimumRule {
    pub fn new(bound: f64) -> Self {
        ExclusiveMinimumRule { bound }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(value) = target.as_f64() else {
            return true;
        };
        if value <= self.bound {
            ctx.add_error(
                format!(
                    "Value {value} is not greater than exclusive minimum {}",
                    self.bound
                ),
                "exclusiveMinimum",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `exclusiveMaximum` (Draft 7 numeric form).
#[derive(Debug)]
pub(crate) struct ExclusiveMaximumRule {
    bound: f64,
}

impl ExclusiveMaximumRule {
    pub fn new(bound: f64) -> Self {
        ExclusiveMaximumRule { bound }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(value) = target.as_f64() else {
            return true;
        };
        if value >= self.bound {
            ctx.add_error(
                format!(
                    "Value {value} is not less than exclusive maximum {}",
                    self.bound
                ),
                "exclusiveMaximum",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `multipleOf`, with a 1e-10 tolerance on the fmod remainder so that float
/// divisions like 0.3 / 0.1 still count as exact.
#[derive(Debug)]
pub(crate) struct MultipleOfRule {
    factor: f64,
}

impl MultipleOfRule {
    pub fn new(factor: f64) -> Self {
        MultipleOfRule { factor }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(value) = target.as_f64() else {
            return true;
        };
        if self.factor <= 0.0 {
            ctx.add_error(
                "multipleOf must be greater than 0",
                "multipleOf",
                target.clone(),
            );
            return false;
        }
        let remainder = value % self.factor;
        if remainder.abs() > 1e-10 && (remainder.abs() - self.factor).abs() > 1e-10 {
            ctx.add_error(
                format!("Value {value} is not a multiple of {}", self.factor),
                "multipleOf",
                target.clone(),
            );
            return false;
        }
        true
    }
}
