//! Per-evaluation validation context.
//!
//! A context carries the current instance path, the current schema path and
//! the errors accumulated so far. Rules fork child contexts to isolate or
//! relocate errors (selector targets, combinator branches, `if` tests) and
//! merge them back selectively; that policy is what makes `not` and the
//! `if` branch error-silent while `allOf` propagates everything.

use veld_value::DynValue;

use crate::error::ValidationError;

#[derive(Debug, Default)]
pub(crate) struct ValidationContext {
    instance_parts: Vec<String>,
    schema_parts: Vec<String>,
    errors: Vec<ValidationError>,
}

impl ValidationContext {
    pub fn new() -> Self {
        ValidationContext::default()
    }

    /// Fork with `segment` appended to the instance path. Empty segments
    /// (the identity selector) leave the path untouched.
    pub fn child_instance(&self, segment: &str) -> Self {
        let mut instance_parts = self.instance_parts.clone();
        if !segment.is_empty() {
            instance_parts.push(segment.to_string());
        }
        ValidationContext {
            instance_parts,
            schema_parts: self.schema_parts.clone(),
            errors: Vec::new(),
        }
    }

    /// Fork with `segment` appended to the schema path. Composite keyword
    /// keys (`properties/name`, `anyOf/0`) split into individual pointer
    /// segments so the rendered schema path stays a valid pointer into the
    /// schema document.
    pub fn child_schema(&self, segment: &str) -> Self {
        let mut schema_parts = self.schema_parts.clone();
        schema_parts.extend(
            segment
                .split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_string),
        );
        ValidationContext {
            instance_parts: self.instance_parts.clone(),
            schema_parts,
            errors: Vec::new(),
        }
    }

    /// Like [`Self::child_schema`] but the segment is kept whole, for
    /// pseudo-segments such as `$ref:<uri>` that are not pointer parts.
    pub fn child_schema_raw(&self, segment: &str) -> Self {
        let mut schema_parts = self.schema_parts.clone();
        if !segment.is_empty() {
            schema_parts.push(segment.to_string());
        }
        ValidationContext {
            instance_parts: self.instance_parts.clone(),
            schema_parts,
            errors: Vec::new(),
        }
    }

    pub fn add_error(
        &mut self,
        message: impl Into<String>,
        keyword: impl Into<String>,
        invalid_value: DynValue,
    ) {
        self.errors.push(ValidationError {
            message: message.into(),
            instance_path_parts: self.instance_parts.clone(),
            schema_path_parts: self.schema_parts.clone(),
            keyword: keyword.into(),
            invalid_value,
        });
    }

    /// Absorb all errors collected by a forked child context.
    pub fn merge(&mut self, child: ValidationContext) {
        self.errors.extend(child.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn instance_parts(&self) -> &[String] {
        &self.instance_parts
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}
