// Formwork - a UI-agnostic form engine for Rust
//
// This library holds form values, runs sync and async validation rules with
// stale-response protection, manages dynamic field arrays and orchestrates
// validate-then-submit. Rendering is left to the caller.

// Re-export core functionality
pub use formwork_core::*;

// Re-export the form crates
pub use formwork_config;
pub use formwork_form;
pub use formwork_log;
pub use formwork_validation;

pub use formwork_config::{DisabledPolicy, FormConfig, InputEvent, ValidationMode};
pub use formwork_form::{
    ChangeKind, EntryId, Field, FieldArray, FieldArrayDef, FieldArrayEntry, FieldState,
    FormChange, FormSchema, FormStore, SetValueOptions, SubmissionController, SubmitOutcome,
    SubmitPhase, Subscription, ValidationEngine,
};
pub use formwork_validation::{
    AsyncValidator, ValidationContext, ValidationErrorKind, ValidationErrors, ValidationRule,
    Validator, validators,
};

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        // Configuration
        DisabledPolicy,
        // Form state
        Field,
        FieldArray,
        FieldArrayDef,
        FieldPath,
        FieldValue,
        FormConfig,
        FormError,
        FormResult,
        FormSchema,
        FormStore,
        FormValues,
        SetValueOptions,
        SubmissionController,
        SubmitOutcome,
        // Validation
        ValidationContext,
        ValidationErrors,
        ValidationMode,
        ValidationRule,
        validators,
    };
}
