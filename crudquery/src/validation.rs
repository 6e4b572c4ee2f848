//! Validation Support
//!
//! Field-level errors raised while compiling a list request, plus the
//! [`CompileReport`] that collects conditions the compilers had to drop.
//!
//! Dropping is the permissive default: an unsupported operator or a value with
//! the wrong shape removes that one condition and nothing else. Every drop is
//! logged at `warn` so silently ignored filters can still be spotted. With
//! [`MalformedPolicy::Reject`] the same drops fail the whole request instead.

use serde::Serialize;
use std::fmt;

use crate::config::MalformedPolicy;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// The field (or request parameter) that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Convert to Result
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was collected.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Outcome of one compilation pass: what was dropped and what can never be compiled.
#[derive(Debug, Default)]
pub struct CompileReport {
    dropped: Vec<ValidationError>,
    fatal: Vec<ValidationError>,
}

impl CompileReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a condition, sort token or field that was left out of the plan.
    pub fn drop(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        let error = ValidationError::new(field, reason);
        tracing::warn!(field = %error.field, reason = %error.message, "Dropping malformed query input");
        self.dropped.push(error);
    }

    /// Record a problem that fails the request under every policy.
    pub fn fatal(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.fatal.push(ValidationError::new(field, reason));
    }

    #[must_use]
    pub fn dropped(&self) -> &[ValidationError] {
        &self.dropped
    }

    #[must_use]
    pub fn has_fatal(&self) -> bool {
        !self.fatal.is_empty()
    }

    /// Apply `policy` to what was collected.
    ///
    /// # Errors
    ///
    /// Fails when a fatal problem was recorded, or when anything was dropped
    /// under [`MalformedPolicy::Reject`].
    pub fn finish(self, policy: MalformedPolicy) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for error in self.fatal {
            errors.add(error);
        }
        if policy == MalformedPolicy::Reject {
            for error in self.dropped {
                errors.add(error);
            }
        }
        errors.result()
    }
}

/// Helper validators for common patterns
pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// Validate number is within range
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` naming `field` when `value` is outside `[min, max]`.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(field, format!("Must be at least {min_val}")));
        }

        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(field, format!("Must be at most {max_val}")));
        }

        Ok(())
    }
}
