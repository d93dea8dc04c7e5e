//! Error types for form operations

use thiserror::Error;

/// Errors raised by the form API itself.
///
/// User-facing validation failures are not errors of the API; they are
/// reported as `ValidationError` values by the validation crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    /// Path could not be parsed
    #[error("Invalid field path: {0}")]
    InvalidPath(String),

    /// Path is not declared in the schema
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Path is declared but is not an array field
    #[error("Field is not an array: {0}")]
    NotAnArray(String),

    /// Array index past the end
    #[error("Index {index} out of range for array {path} (length {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// Removal would leave fewer entries than allowed
    #[error("Array {path} must keep at least {min} entries")]
    ArrayMinimum { path: String, min: usize },

    /// Schema definition is inconsistent
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Value cannot be represented as a form value
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Async validation needs a running executor
    #[error("No async runtime available: {0}")]
    Runtime(String),
}

/// Result type for form operations
pub type FormResult<T> = Result<T, FormError>;
