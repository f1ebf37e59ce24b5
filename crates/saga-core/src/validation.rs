//! Validation utilities.

use crate::AccountError;
use validator::{Validate, ValidationErrors};

/// Extension trait for validation.
pub trait ValidateExt: Validate {
    /// Validates the struct and returns an `AccountError` on failure.
    fn validate_input(&self) -> Result<(), AccountError> {
        self.validate().map_err(validation_errors_to_account_error)
    }
}

impl<T: Validate> ValidateExt for T {}

/// Flattens `validator::ValidationErrors` into a single `AccountError::Validation`.
#[must_use]
pub fn validation_errors_to_account_error(errors: ValidationErrors) -> AccountError {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_ref()
                    .map_or_else(|| error.code.to_string(), ToString::to_string);
                format!("{field}: {message}")
            })
        })
        .collect();

    // Nested structs report through `errors()`, not `field_errors()`.
    if fields.is_empty() {
        fields.push(errors.to_string());
    }
    fields.sort();

    AccountError::Validation(fields.join("; "))
}
