//! Field validation results and per-field form state.

use serde::{Deserialize, Serialize};

/// Outcome of running a validator against a single value.
///
/// A result carries an error message exactly when it is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    is_valid: bool,
    error: Option<String>,
    suggestions: Vec<String>,
}

impl ValidationResult {
    /// Creates a passing result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
            suggestions: Vec::new(),
        }
    }

    /// Creates a failing result with the message to display.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            suggestions: Vec::new(),
        }
    }

    /// Attaches hints shown alongside the result.
    #[must_use]
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    /// Returns whether the value passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Returns the error message, if the value failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns hints in display order.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        self.suggestions.as_slice()
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}

/// A single validation rule for one field.
pub trait Validator: Send + Sync {
    /// Checks `value` and reports the outcome.
    fn validate(&self, value: &str) -> ValidationResult;
}

impl<F> Validator for F
where
    F: Fn(&str) -> ValidationResult + Send + Sync,
{
    fn validate(&self, value: &str) -> ValidationResult {
        self(value)
    }
}

/// Tracked state of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    value: String,
    error: Option<String>,
    is_valid: bool,
    suggestions: Vec<String>,
    touched: bool,
}

impl FormField {
    /// Creates an untouched field that has not been validated yet.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            error: None,
            is_valid: true,
            suggestions: Vec::new(),
            touched: false,
        }
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }

    /// Returns the displayed error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns whether the last validation pass succeeded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Returns hints from the last validation pass.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        self.suggestions.as_slice()
    }

    /// Returns whether the field has lost focus at least once.
    #[must_use]
    pub fn touched(&self) -> bool {
        self.touched
    }

    /// Replaces the value without validating it.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Records that the field lost focus.
    pub fn mark_touched(&mut self) {
        self.touched = true;
    }

    /// Stores the outcome of a validation pass.
    pub fn apply(&mut self, result: ValidationResult) {
        self.is_valid = result.is_valid;
        self.error = result.error;
        self.suggestions = result.suggestions;
    }

    /// Hides the displayed error. Validity is left to the next validation pass.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Marks the field invalid with an externally supplied message.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.is_valid = false;
    }
}
