//! Validation for batch inputs.
//!
//! Placeholder matching is informational and never blocks a run. Request
//! validation collects every problem at once so a caller can fix them in one go.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use utoipa::ToSchema;

use crate::dataset::Field;

/// Whether a template placeholder has a dataset field of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlaceholderStatus {
    pub name: String,
    pub matched: bool,
}

/// Classify each placeholder as matched or unmatched against `fields`.
pub fn validate_placeholders(placeholders: &[String], fields: &[Field]) -> Vec<PlaceholderStatus> {
    let names: HashSet<&str> = fields.iter().map(|field| field.name.as_str()).collect();
    placeholders
        .iter()
        .map(|name| PlaceholderStatus {
            name: name.clone(),
            matched: names.contains(name.as_str()),
        })
        .collect()
}

/// Validation error with a user-facing message.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The request field that failed validation
    pub field: String,
    pub message: String,
    /// Suggestion for how to fix the error
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn empty_field(field: &str, label: &str) -> Self {
        Self::new(field, format!("{} must not be empty", label))
            .with_suggestion(format!("Provide a value for {}", label.to_lowercase()))
    }

    pub fn invalid_extension(field: &str, value: &str, expected: &[&str]) -> Self {
        Self::new(
            field,
            format!("'{}' does not have a supported extension", value),
        )
        .with_suggestion(format!("Expected one of: .{}", expected.join(", .")))
    }

    pub fn unknown_field(field: &str, value: &str) -> Self {
        Self::new(field, format!("Dataset has no field named '{}'", value))
            .with_suggestion("Pick one of the fields listed by /api/datasets/inspect")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors with formatted output.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn to_message(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }

        let mut parts = vec![format!(
            "Validation failed: {} problem(s) found",
            self.errors.len()
        )];
        for (i, error) in self.errors.iter().enumerate() {
            parts.push(format!("{}. {}", i + 1, error));
        }
        parts.join("\n")
    }

    /// Ok if no errors, otherwise the formatted message.
    pub fn into_result(self) -> Result<(), String> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.to_message())
        }
    }
}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate that a string is not empty after trimming
pub fn validate_required(value: &str, field: &str, label: &str, errors: &mut ValidationErrors) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, label));
    }
}

/// Validate that a path is present and ends in one of `expected` (case-insensitive).
pub fn validate_path_extension(
    value: &str,
    field: &str,
    label: &str,
    expected: &[&str],
    errors: &mut ValidationErrors,
) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(ValidationError::empty_field(field, label));
        return;
    }

    let extension = Path::new(trimmed)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let supported = extension
        .as_deref()
        .is_some_and(|ext| expected.contains(&ext));
    if !supported {
        errors.add(ValidationError::invalid_extension(field, trimmed, expected));
    }
}

/// Validate that the naming field is one of the dataset's fields.
pub fn validate_naming_field(
    value: &str,
    field: &str,
    fields: &[Field],
    errors: &mut ValidationErrors,
) {
    if value.trim().is_empty() {
        errors.add(ValidationError::empty_field(field, "Naming field"));
        return;
    }
    if !fields.iter().any(|f| f.name == value) {
        errors.add(ValidationError::unknown_field(field, value));
    }
}
