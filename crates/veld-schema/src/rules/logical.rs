//! Combinators: `allOf`, `anyOf`, `oneOf`, `not` and `if`/`then`/`else`.
//!
//! The combinators differ in how child errors propagate: `allOf` merges
//! every branch, `anyOf`/`oneOf` merge only the first failing branch when
//! nothing matched, `not` and the `if` test discard child errors entirely.

use std::sync::Arc;

use veld_value::DynValue;

use crate::context::ValidationContext;
use crate::rules::RuleGroup;

/// `allOf`: every branch must pass; all branch errors surface.
#[derive(Debug)]
pub(crate) struct AllOfRule {
    branches: Vec<Arc<RuleGroup>>,
}

impl AllOfRule {
    pub fn new(branches: Vec<Arc<RuleGroup>>) -> Self {
        AllOfRule { branches }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let mut failed = 0usize;
        for (i, branch) in self.branches.iter().enumerate() {
            let mut sub = ctx.child_schema(&format!("allOf/{i}"));
            if !branch.validate(target, &mut sub) {
                failed += 1;
            }
            ctx.merge(sub);
        }
        if failed > 0 {
            ctx.add_error(
                format!(
                    "Value failed {failed} of {} allOf schemas",
                    self.branches.len()
                ),
                "allOf",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `anyOf`: first passing branch wins (short-circuit). On total failure the
/// summary error is followed by the first failing branch's errors.
#[derive(Debug)]
pub(crate) struct AnyOfRule {
    branches: Vec<Arc<RuleGroup>>,
}

impl AnyOfRule {
    pub fn new(branches: Vec<Arc<RuleGroup>>) -> Self {
        AnyOfRule { branches }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        if self.branches.is_empty() {
            ctx.add_error(
                "anyOf requires at least one sub-schema",
                "anyOf",
                target.clone(),
            );
            return false;
        }
        let mut first_failure: Option<ValidationContext> = None;
        for (i, branch) in self.branches.iter().enumerate() {
            let mut sub = ctx.child_schema(&format!("anyOf/{i}"));
            if branch.validate(target, &mut sub) {
                return true;
            }
            if first_failure.is_none() {
                first_failure = Some(sub);
            }
        }
        ctx.add_error(
            format!("Value failed all {} anyOf schemas", self.branches.len()),
            "anyOf",
            target.clone(),
        );
        if let Some(failure) = first_failure {
            ctx.merge(failure);
        }
        false
    }
}

/// `oneOf`: exactly one branch must pass; every branch is evaluated to
/// count matches. Multiple matches report the matching indices.
#[derive(Debug)]
pub(crate) struct OneOfRule {
    branches: Vec<Arc<RuleGroup>>,
}

impl OneOfRule {
    pub fn new(branches: Vec<Arc<RuleGroup>>) -> Self {
        OneOfRule { branches }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        if self.branches.is_empty() {
            ctx.add_error(
                "oneOf requires at least one sub-schema",
                "oneOf",
                target.clone(),
            );
            return false;
        }
        let mut passed: Vec<usize> = Vec::new();
        let mut first_failure: Option<ValidationContext> = None;
        for (i, branch) in self.branches.iter().enumerate() {
            let mut sub = ctx.child_schema(&format!("oneOf/{i}"));
            if branch.validate(target, &mut sub) {
                passed.push(i);
            } else if first_failure.is_none() {
                first_failure = Some(sub);
            }
        }
        match passed.len() {
            0 => {
                ctx.add_error(
                    format!("Value failed all {} oneOf schemas", self.branches.len()),
                    "oneOf",
                    target.clone(),
                );
                if let Some(failure) = first_failure {
                    ctx.merge(failure);
                }
                false
            }
            1 => true,
            n => {
                let indices = passed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                ctx.add_error(
                    format!(
                        "Value matched {n} oneOf schemas (indices: {indices}) but exactly 1 is required"
                    ),
                    "oneOf",
                    target.clone(),
                );
                false
            }
        }
    }
}

/// `not`: inverts the nested schema; its errors are never reported.
#[derive(Debug)]
pub(crate) struct NotRule {
    rules: Arc<RuleGroup>,
}

impl NotRule {
    pub fn new(rules: Arc<RuleGroup>) -> Self {
        NotRule { rules }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let mut probe = ctx.child_schema("not");
        if self.rules.validate(target, &mut probe) {
            ctx.add_error(
                "Value matched the negated schema when it should not have",
                "not",
                target.clone(),
            );
            return false;
        }
        true
    }
}

/// `if`/`then`/`else`. The `if` test runs in an isolated context and never
/// contributes errors; only the selected branch does.
#[derive(Debug)]
pub(crate) struct ConditionalRule {
    if_rules: Arc<RuleGroup>,
    then_rules: Option<Arc<RuleGroup>>,
    else_rules: Option<Arc<RuleGroup>>,
}

impl ConditionalRule {
    pub fn new(
        if_rules: Arc<RuleGroup>,
        then_rules: Option<Arc<RuleGroup>>,
        else_rules: Option<Arc<RuleGroup>>,
    ) -> Self {
        ConditionalRule {
            if_rules,
            then_rules,
            else_rules,
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let mut probe = ctx.child_schema("if");
        let condition = self.if_rules.validate(target, &mut probe);

        let branch = if condition {
            (&self.then_rules, "then")
        } else {
            (&self.else_rules, "else")
        };
        let Some(rules) = branch.0 else {
            return true;
        };
        let mut sub = ctx.child_schema(branch.1);
        if !rules.validate(target, &mut sub) {
            ctx.merge(sub);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::scalar::TypeRule;
    use crate::rules::Rule;
    use crate::selector::Selector;

    fn type_group(name: &str) -> Arc<RuleGroup> {
        let mut group = RuleGroup::new();
        group.push(Selector::Value, Rule::Type(TypeRule::single(name)));
        Arc::new(group)
    }

    #[test]
    fn all_of_merges_every_branch_error() {
        let rule = AllOfRule::new(vec![type_group("string"), type_group("integer")]);
        let mut ctx = ValidationContext::new();
        assert!(!rule.validate(&DynValue::Bool(true), &mut ctx));
        let errors = ctx.into_errors();
        // Two branch errors plus the summary.
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].schema_path(), "/allOf/0");
        assert_eq!(errors[1].schema_path(), "/allOf/1");
        assert_eq!(errors[2].keyword, "allOf");
    }

    #[test]
    fn any_of_short_circuits_on_first_pass() {
        let rule = AnyOfRule::new(vec![type_group("string"), type_group("integer")]);
        let mut ctx = ValidationContext::new();
        assert!(rule.validate(&DynValue::Int(1), &mut ctx));
        assert!(!ctx.has_errors());

        let mut ctx = ValidationContext::new();
        assert!(!rule.validate(&DynValue::Bool(true), &mut ctx));
        let errors = ctx.into_errors();
        // Summary first, then only the first failing branch's error.
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].keyword, "anyOf");
        assert_eq!(errors[1].schema_path(), "/anyOf/0");
    }

    #[test]
    fn one_of_counts_matches() {
        let rule = OneOfRule::new(vec![type_group("number"), type_group("integer")]);

        // An integer matches both branches.
        let mut ctx = ValidationContext::new();
        assert!(!rule.validate(&DynValue::Int(3), &mut ctx));
        let errors = ctx.into_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("indices: 0, 1"));

        // A fractional number matches only the first.
        let mut ctx = ValidationContext::new();
        assert!(rule.validate(&DynValue::Num(3.5), &mut ctx));

        // A string matches neither.
        let mut ctx = ValidationContext::new();
        assert!(!rule.validate(&DynValue::Str("x".into()), &mut ctx));
        assert_eq!(ctx.into_errors()[0].keyword, "oneOf");
    }

    #[test]
    fn not_discards_child_errors() {
        let rule = NotRule::new(type_group("string"));
        let mut ctx = ValidationContext::new();
        assert!(rule.validate(&DynValue::Int(1), &mut ctx));
        assert!(!ctx.has_errors());

        let mut ctx = ValidationContext::new();
        assert!(!rule.validate(&DynValue::Str("x".into()), &mut ctx));
        let errors = ctx.into_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword, "not");
    }

    #[test]
    fn conditional_selects_branch_and_silences_if() {
        let rule = ConditionalRule::new(
            type_group("string"),
            Some(type_group("string")),
            Some(type_group("integer")),
        );
        let mut ctx = ValidationContext::new();
        // String: if passes, then passes.
        assert!(rule.validate(&DynValue::Str("x".into()), &mut ctx));
        // Integer: if fails silently, else passes.
        assert!(rule.validate(&DynValue::Int(1), &mut ctx));
        assert!(!ctx.has_errors());

        // Bool: if fails, else fails and reports.
        let mut ctx = ValidationContext::new();
        assert!(!rule.validate(&DynValue::Bool(true), &mut ctx));
        assert_eq!(ctx.into_errors()[0].schema_path(), "/else");
    }

    #[test]
    fn conditional_without_branches_passes() {
        let rule = ConditionalRule::new(type_group("string"), None, None);
        let mut ctx = ValidationContext::new();
        assert!(rule.validate(&DynValue::Int(1), &mut ctx));
        assert!(rule.validate(&DynValue::Str("x".into()), &mut ctx));
    }
}
