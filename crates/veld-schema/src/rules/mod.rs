//! Validation rules.
//!
//! A compiled schema is a [`RuleGroup`]: an ordered conjunction of
//! `(selector, rule)` pairs. Every pair is evaluated even after a failure so
//! that the error list is complete, and pairs run in compile order, which
//! keeps error lists deterministic for a fixed input.

pub(crate) mod array;
pub(crate) mod content;
pub(crate) mod format;
pub(crate) mod logical;
pub(crate) mod object;
pub(crate) mod reference;
pub(crate) mod scalar;

use std::sync::Arc;

use veld_value::DynValue;

use crate::context::ValidationContext;
use crate::selector::Selector;

use self::array::{ContainsRule, MaxItemsRule, MinItemsRule, UniqueItemsRule};
use self::content::{ContentEncodingRule, ContentMediaTypeRule};
use self::format::FormatRule;
use self::logical::{AllOfRule, AnyOfRule, ConditionalRule, NotRule, OneOfRule};
use self::object::{DependencyRule, MaxPropertiesRule, MinPropertiesRule, RequiredRule};
use self::reference::RefRule;
use self::scalar::{
    ConstRule, EnumRule, ExclusiveMaximumRule, ExclusiveMinimumRule, MaxLengthRule, MaximumRule,
    MinLengthRule, MinimumRule, MultipleOfRule, PatternRule, TypeRule,
};

/// A single unit of validation logic: boolean outcome, errors as a side
/// effect on the context.
#[derive(Debug)]
pub(crate) enum Rule {
    /// The boolean `false` schema: rejects everything.
    False,
    Type(TypeRule),
    Const(ConstRule),
    Enum(EnumRule),
    MinLength(MinLengthRule),
    MaxLength(MaxLengthRule),
    Pattern(PatternRule),
    Format(FormatRule),
    ContentEncoding(ContentEncodingRule),
    ContentMediaType(ContentMediaTypeRule),
    Minimum(MinimumRule),
    Maximum(MaximumRule),
    ExclusiveMinimum(ExclusiveMinimumRule),
    ExclusiveMaximum(ExclusiveMaximumRule),
    MultipleOf(MultipleOfRule),
    MinItems(MinItemsRule),
    MaxItems(MaxItemsRule),
    UniqueItems(UniqueItemsRule),
    Contains(ContainsRule),
    MinProperties(MinPropertiesRule),
    MaxProperties(MaxPropertiesRule),
    Required(RequiredRule),
    Dependency(DependencyRule),
    AllOf(AllOfRule),
    AnyOf(AnyOfRule),
    OneOf(OneOfRule),
    Not(NotRule),
    Conditional(ConditionalRule),
    Ref(RefRule),
    /// A nested compiled group, shared through the compiler cache.
    Group(Arc<RuleGroup>),
}

impl Rule {
    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        match self {
            Rule::False => {
                ctx.add_error(
                    "Value is not allowed by schema: false",
                    "false",
                    target.clone(),
                );
                false
            }
            Rule::Type(rule) => rule.validate(target, ctx),
            Rule::Const(rule) => rule.validate(target, ctx),
            Rule::Enum(rule) => rule.validate(target, ctx),
            Rule::MinLength(rule) => rule.validate(target, ctx),
            Rule::MaxLength(rule) => rule.validate(target, ctx),
            Rule::Pattern(rule) => rule.validate(target, ctx),
            Rule::Format(rule) => rule.validate(target, ctx),
            Rule::ContentEncoding(rule) => rule.validate(target, ctx),
            Rule::ContentMediaType(rule) => rule.validate(target, ctx),
            Rule::Minimum(rule) => rule.validate(target, ctx),
            Rule::Maximum(rule) => rule.validate(target, ctx),
            Rule::ExclusiveMinimum(rule) => rule.validate(target, ctx),
            Rule::ExclusiveMaximum(rule) => rule.validate(target, ctx),
            Rule::MultipleOf(rule) => rule.validate(target, ctx),
            Rule::MinItems(rule) => rule.validate(target, ctx),
            Rule::MaxItems(rule) => rule.validate(target, ctx),
            Rule::UniqueItems(rule) => rule.validate(target, ctx),
            Rule::Contains(rule) => rule.validate(target, ctx),
            Rule::MinProperties(rule) => rule.validate(target, ctx),
            Rule::MaxProperties(rule) => rule.validate(target, ctx),
            Rule::Required(rule) => rule.validate(target, ctx),
            Rule::Dependency(rule) => rule.validate(target, ctx),
            Rule::AllOf(rule) => rule.validate(target, ctx),
            Rule::AnyOf(rule) => rule.validate(target, ctx),
            Rule::OneOf(rule) => rule.validate(target, ctx),
            Rule::Not(rule) => rule.validate(target, ctx),
            Rule::Conditional(rule) => rule.validate(target, ctx),
            Rule::Ref(rule) => rule.validate(target, ctx),
            Rule::Group(group) => group.validate(target, ctx),
        }
    }
}

/// One `(selector, rule)` pair: the rule runs against every target the
/// selector yields, each in a child context carrying the target's segment.
#[derive(Debug)]
pub(crate) struct SelectorRule {
    selector: Selector,
    rule: Rule,
}

impl SelectorRule {
    pub fn new(selector: Selector, rule: Rule) -> Self {
        SelectorRule { selector, rule }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let mut all_valid = true;
        for selection in self.selector.select_targets(target) {
            let mut child = ctx.child_instance(&selection.segment);
            if !self.rule.validate(&selection.value, &mut child) {
                all_valid = false;
                // Keep going: remaining targets still collect their errors.
            }
            ctx.merge(child);
        }
        all_valid
    }
}

/// Ordered conjunction of selector rules. Empty groups pass everything,
/// which is also what breaks compile-time cycles.
#[derive(Debug, Default)]
pub(crate) struct RuleGroup {
    rules: Vec<SelectorRule>,
}

impl RuleGroup {
    pub fn new() -> Self {
        RuleGroup::default()
    }

    pub fn push(&mut self, selector: Selector, rule: Rule) {
        self.rules.push(SelectorRule::new(selector, rule));
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let mut all_valid = true;
        for rule in &self.rules {
            if !rule.validate(target, ctx) {
                all_valid = false;
            }
        }
        all_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_group_passes_everything() {
        let group = RuleGroup::new();
        let mut ctx = ValidationContext::new();
        assert!(group.validate(&DynValue::Null, &mut ctx));
        assert!(!ctx.has_errors());
    }

    #[test]
    fn false_rule_reports_keyword_false() {
        let mut group = RuleGroup::new();
        group.push(Selector::Value, Rule::False);
        let mut ctx = ValidationContext::new();
        assert!(!group.validate(&DynValue::Int(1), &mut ctx));
        let errors = ctx.into_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword, "false");
        assert_eq!(errors[0].invalid_value, DynValue::Int(1));
    }

    #[test]
    fn group_evaluates_all_rules_even_after_failure() {
        let mut group = RuleGroup::new();
        group.push(Selector::Value, Rule::False);
        group.push(Selector::Value, Rule::False);
        let mut ctx = ValidationContext::new();
        assert!(!group.validate(&DynValue::Null, &mut ctx));
        assert_eq!(ctx.into_errors().len(), 2);
    }

    #[test]
    fn selector_rule_reports_at_target_path() {
        let mut group = RuleGroup::new();
        group.push(Selector::ArrayItems, Rule::False);
        let value = DynValue::Array(vec![DynValue::Int(1), DynValue::Int(2)]);
        let mut ctx = ValidationContext::new();
        assert!(!group.validate(&value, &mut ctx));
        let errors = ctx.into_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].instance_path(), "/0");
        assert_eq!(errors[1].instance_path(), "/1");
    }
}
