//! The `$ref` rule: a URI-addressed, late-bound indirection to another
//! schema.
//!
//! Resolution is attempted once and the outcome cached; the resolved target
//! is held weakly so a reference never owns its target and reference cycles
//! between documents cannot leak. A thread-local depth counter bounds
//! evaluation-time recursion: past [`MAX_VALIDATION_DEPTH`] the rule
//! returns pass, which terminates validation of well-formed
//! self-referential data.

use std::cell::Cell;
use std::sync::{Arc, OnceLock, Weak};

use veld_value::DynValue;

use crate::context::ValidationContext;
use crate::schema::Schema;

pub(crate) const MAX_VALIDATION_DEPTH: usize = 50;

thread_local! {
    static VALIDATION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// RAII depth guard: increments on entry, decrements on every exit path.
struct DepthGuard;

impl DepthGuard {
    /// `None` once the recursion bound is reached.
    fn enter() -> Option<DepthGuard> {
        VALIDATION_DEPTH.with(|depth| {
            if depth.get() >= MAX_VALIDATION_DEPTH {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        VALIDATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[derive(Debug)]
pub(crate) struct RefRule {
    uri: String,
    /// The schema node carrying the `$ref`, used for same-document
    /// resolution. Weak: rules never keep schema trees alive.
    source: Weak<Schema>,
    /// Single-attempt resolution cache. `Some(None)` records a failed
    /// attempt.
    resolved: OnceLock<Option<Weak<Schema>>>,
}

impl RefRule {
    pub fn new(uri: impl Into<String>, source: &Arc<Schema>) -> Self {
        RefRule {
            uri: uri.into(),
            source: Arc::downgrade(source),
            resolved: OnceLock::new(),
        }
    }

    pub fn validate(&self, target: &DynValue, ctx: &mut ValidationContext) -> bool {
        let Some(_guard) = DepthGuard::enter() else {
            // Depth bound reached: assume valid to break the recursion.
            return true;
        };

        let resolved = self.resolved.get_or_init(|| {
            self.source
                .upgrade()
                .and_then(|source| source.resolve_reference(&self.uri))
                .map(|target| Arc::downgrade(&target))
        });
        let Some(target_schema) = resolved.as_ref().and_then(Weak::upgrade) else {
            ctx.add_error(
                format!("Could not resolve reference: {}", self.uri),
                "ref",
                DynValue::Str(self.uri.clone()),
            );
            return false;
        };

        crate::compiler::ensure_compiled(&target_schema);
        let Some(rules) = target_schema.compiled_rules() else {
            ctx.add_error(
                format!("Referenced schema '{}' is not compiled", self.uri),
                "ref",
                DynValue::Str(self.uri.clone()),
            );
            return false;
        };

        let mut ref_ctx = ctx.child_schema_raw(&format!("$ref:{}", self.uri));
        let ok = rules.validate(target, &mut ref_ctx);
        ctx.merge(ref_ctx);
        ok
    }
}
