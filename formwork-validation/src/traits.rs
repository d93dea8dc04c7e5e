// Validation traits

use async_trait::async_trait;
use formwork_core::{FieldPath, FieldValue, FormValues};
use std::future::Future;
use std::sync::Arc;

/// Read access to committed form values.
///
/// Implemented by the form store so cross-field rules see the latest values
/// at the moment they run, including after an async rule has resumed.
pub trait FieldReader: Send + Sync {
    /// Value at `path`
    fn read(&self, path: &FieldPath) -> Option<FieldValue>;

    /// Every value
    fn snapshot(&self) -> FormValues;
}

impl FieldReader for FormValues {
    fn read(&self, path: &FieldPath) -> Option<FieldValue> {
        self.get_path(path).cloned()
    }

    fn snapshot(&self) -> FormValues {
        self.clone()
    }
}

/// Context handed to every validator
#[derive(Clone)]
pub struct ValidationContext {
    field: FieldPath,
    reader: Arc<dyn FieldReader>,
}

impl ValidationContext {
    pub fn new(field: FieldPath, reader: Arc<dyn FieldReader>) -> Self {
        Self { field, reader }
    }

    /// Context over a fixed set of values
    pub fn from_values(field: FieldPath, values: FormValues) -> Self {
        Self::new(field, Arc::new(values))
    }

    /// Path of the field being validated
    pub fn field(&self) -> &FieldPath {
        &self.field
    }

    /// Current value of another field
    pub fn value_of(&self, path: &str) -> Option<FieldValue> {
        FieldPath::parse(path)
            .ok()
            .and_then(|path| self.reader.read(&path))
    }

    /// Current value of a field next to this one, e.g. another key of the
    /// same array entry
    pub fn sibling(&self, key: &str) -> Option<FieldValue> {
        let segments = self.field.segments();
        if segments.is_empty() {
            return None;
        }
        let parent = FieldPath::from_segments(segments[..segments.len() - 1].to_vec());
        self.reader.read(&parent.child(key))
    }

    /// Snapshot of all current values
    pub fn values(&self) -> FormValues {
        self.reader.snapshot()
    }
}

impl std::fmt::Debug for ValidationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationContext")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Synchronous field validator.
///
/// Returns the message to show on failure. Closures of the form
/// `|value, ctx| -> Result<(), String>` implement this trait.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String>;
}

impl<F> Validator for F
where
    F: Fn(&FieldValue, &ValidationContext) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        self(value, ctx)
    }
}

/// Asynchronous field validator, e.g. a remote availability check
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    async fn validate_async(
        &self,
        value: &FieldValue,
        ctx: &ValidationContext,
    ) -> Result<(), String>;
}

/// Adapts a closure returning a future into an [`AsyncValidator`]
pub struct AsyncFn<F>(pub F);

#[async_trait]
impl<F, Fut> AsyncValidator for AsyncFn<F>
where
    F: Fn(FieldValue, ValidationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    async fn validate_async(
        &self,
        value: &FieldValue,
        ctx: &ValidationContext,
    ) -> Result<(), String> {
        (self.0)(value.clone(), ctx.clone()).await
    }
}
