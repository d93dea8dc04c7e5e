//! Validation rules for Formwork
//!
//! Rules are a tagged enum (`Required`, `Pattern`, `Custom`, `Async`)
//! evaluated in declaration order; the first failing rule produces the
//! field's error. Async rules (remote availability checks and the like) are
//! injected as [`AsyncValidator`] implementations or closures returning
//! futures.
//!
//! # Examples
//!
//! ```
//! use formwork_core::{FieldPath, FieldValue, FormValues};
//! use formwork_validation::{validators, ChainOutcome, ValidationContext, ValidationRule, ValidationRules};
//! use formwork_validation::validators::NotEqual;
//!
//! let rules = ValidationRules::new()
//!     .add(ValidationRule::required("Email is required"))
//!     .add(validators::email("Invalid email format"))
//!     .add(ValidationRule::custom(
//!         "notAdmin",
//!         NotEqual::new("admin@example.com").message("Enter a different email address"),
//!     ));
//!
//! let ctx = ValidationContext::from_values(FieldPath::parse("email").unwrap(), FormValues::new());
//!
//! match rules.evaluate_sync(&FieldValue::from("admin@example.com"), &ctx) {
//!     ChainOutcome::Invalid(error) => assert_eq!(error.message, "Enter a different email address"),
//!     _ => unreachable!(),
//! }
//! assert_eq!(
//!     rules.evaluate_sync(&FieldValue::from("neo@example.com"), &ctx),
//!     ChainOutcome::Valid
//! );
//! ```

mod errors;
mod rules;
mod traits;
pub mod validators;

pub use errors::*;
pub use rules::*;
pub use traits::*;
