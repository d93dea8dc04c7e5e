//! Core types for Formwork
//!
//! Field paths, field values with input coercion, flat value snapshots and
//! the error type shared by the form crates.
//!
//! # Examples
//!
//! ```
//! use formwork_core::{FieldPath, FieldValue, FormValues, ValueKind};
//!
//! let path = FieldPath::parse("phNumbers.0.number").unwrap();
//! assert_eq!(path.template(), "phNumbers.*.number");
//!
//! assert_eq!(ValueKind::Number.coerce("42"), FieldValue::Number(42.0));
//! assert_eq!(ValueKind::Number.coerce(""), FieldValue::Null);
//!
//! let values = FormValues::new().with("social.twitter", "@neo").unwrap();
//! assert_eq!(values.to_json()["social"]["twitter"], "@neo");
//! ```

mod error;
mod path;
mod value;
mod values;

pub use error::*;
pub use path::*;
pub use value::*;
pub use values::*;
