//! User-facing validation result: a flat error list plus a success flag.

use core::fmt::{self, Display};

use crate::context::ValidationContext;
use crate::error::ValidationError;

/// The outcome of validating one value against one schema.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// A successful (error-free) result.
    pub fn success() -> Self {
        ValidationResult::default()
    }

    pub(crate) fn from_context(context: ValidationContext) -> Self {
        ValidationResult {
            errors: context.into_errors(),
        }
    }

    pub(crate) fn from_errors(errors: Vec<ValidationError>) -> Self {
        ValidationResult { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn error(&self, index: usize) -> Option<&ValidationError> {
        self.errors.get(index)
    }

    /// Instance paths of all errors, in error order.
    pub fn all_error_paths(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.instance_path()).collect()
    }

    /// The distinct keywords that were violated, in first-seen order.
    pub fn violated_keywords(&self) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for error in &self.errors {
            if !error.keyword.is_empty() && !keywords.contains(&error.keyword) {
                keywords.push(error.keyword.clone());
            }
        }
        keywords
    }

    /// Multi-line report listing every error.
    pub fn summary(&self) -> String {
        if self.is_valid() {
            return "Validation successful - no errors".to_string();
        }
        let mut summary = format!(
            "Schema validation failed with {} error(s):\n",
            self.errors.len()
        );
        for (i, error) in self.errors.iter().enumerate() {
            summary.push_str(&format!("  [{}] {}", i + 1, error));
            if i + 1 < self.errors.len() {
                summary.push('\n');
            }
        }
        summary
    }

    /// Single-line report for logging.
    pub fn brief_summary(&self) -> String {
        if self.is_valid() {
            "Validation successful".to_string()
        } else {
            format!("Validation failed: {} error(s)", self.errors.len())
        }
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.brief_summary())
    }
}
