//! Form state for Formwork
//!
//! A [`FormStore`] holds the values, dirty/touched flags and errors of a
//! form described by a [`FormSchema`]. The [`ValidationEngine`] runs field
//! rules against it (async rules in spawned tokio tasks, guarded against
//! stale responses), [`FieldArray`] manages dynamic array fields with stable
//! entry ids, and [`SubmissionController`] drives validate-then-submit.
//!
//! # Examples
//!
//! ```
//! use formwork_form::{Field, FieldArrayDef, FormSchema, FormStore, SetValueOptions};
//!
//! let schema = FormSchema::builder()
//!     .field(Field::text("username").required("Username is required"))
//!     .field(Field::text("channel"))
//!     .field(
//!         Field::text("social.twitter")
//!             .required("Twitter account is required")
//!             .disabled_when(|values| values.get("channel").is_none_or(|v| v.is_empty())),
//!     )
//!     .array(FieldArrayDef::new("phNumbers").item(Field::text("number")))
//!     .field(Field::number("age").default_value(0).required("Age is required"))
//!     .build()
//!     .unwrap();
//!
//! let store = FormStore::new(schema);
//! store.change("age", "").unwrap();
//! assert!(store.get_value("age").unwrap().is_empty());
//!
//! store.set_value("username", "neo", SetValueOptions::all()).unwrap();
//! assert!(store.field_state("social.twitter").unwrap().is_disabled);
//! ```

mod engine;
mod field_array;
mod schema;
mod store;
mod submit;
mod subscription;

pub use engine::ValidationEngine;
pub use field_array::{EntryId, FieldArray, FieldArrayEntry};
pub use schema::{ArrayDef, DisabledPredicate, Field, FieldArrayDef, FieldDef, FormSchema, FormSchemaBuilder};
pub use store::{FieldState, FormStore, SetValueOptions};
pub use submit::{SubmissionController, SubmitOutcome, SubmitPhase};
pub use subscription::{ChangeKind, FormChange, Subscription};
