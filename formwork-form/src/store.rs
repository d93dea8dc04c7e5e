//! Form store: values, field meta state and change notification

use crate::engine::ValidationEngine;
use crate::field_array::{EntryId, FieldArray};
use crate::schema::{FieldDef, FormSchema};
use crate::subscription::{ChangeKind, FormChange, Subscribers, Subscription};
use formwork_config::{FormConfig, InputEvent};
use formwork_core::{FieldPath, FieldValue, FormError, FormResult, FormValues};
use formwork_log::targets;
use formwork_validation::{FieldReader, ValidationError, ValidationErrors};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// Side effects of [`FormStore::set_value`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Validate the field after setting it
    pub should_validate: bool,
    /// Recompute the dirty flag against the baseline
    pub should_dirty: bool,
    /// Mark the field touched
    pub should_touch: bool,
}

impl SetValueOptions {
    /// All side effects enabled
    pub fn all() -> Self {
        Self {
            should_validate: true,
            should_dirty: true,
            should_touch: true,
        }
    }

    pub fn validate(mut self) -> Self {
        self.should_validate = true;
        self
    }

    pub fn dirty(mut self) -> Self {
        self.should_dirty = true;
        self
    }

    pub fn touch(mut self) -> Self {
        self.should_touch = true;
        self
    }
}

/// Snapshot of one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldState {
    pub value: FieldValue,
    pub is_dirty: bool,
    pub is_touched: bool,
    /// An async validation is in flight
    pub is_validating: bool,
    pub is_disabled: bool,
    pub error: Option<ValidationError>,
}

/// Per-path bookkeeping
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldMeta {
    pub(crate) dirty: bool,
    pub(crate) touched: bool,
    pub(crate) error: Option<ValidationError>,
    /// Validation request token; results carrying another token are stale
    pub(crate) token: u64,
    pub(crate) pending: bool,
}

impl FieldMeta {
    fn is_blank(&self) -> bool {
        !self.dirty && !self.touched && !self.pending && self.error.is_none()
    }
}

pub(crate) struct StoreState {
    pub(crate) values: FormValues,
    /// Values as of the last reset; dirty state compares against these
    pub(crate) baseline: FormValues,
    pub(crate) meta: BTreeMap<FieldPath, FieldMeta>,
    pub(crate) arrays: BTreeMap<FieldPath, Vec<EntryId>>,
    next_token: u64,
    pub(crate) submitted: bool,
}

impl StoreState {
    /// Issue a fresh token for `path`, superseding any in-flight validation
    pub(crate) fn bump_token(&mut self, path: &FieldPath) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        let meta = self.meta.entry(path.clone()).or_default();
        meta.token = token;
        meta.pending = false;
        token
    }

    pub(crate) fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub(crate) fn token(&self, path: &FieldPath) -> u64 {
        self.meta.get(path).map(|meta| meta.token).unwrap_or(0)
    }

    pub(crate) fn array_len(&self, path: &FieldPath) -> usize {
        self.arrays.get(path).map(Vec::len).unwrap_or(0)
    }

    /// Drop meta entries that carry no state. A dropped entry reads as
    /// token 0, which no validation request ever holds.
    fn prune(&mut self) {
        self.meta.retain(|_, meta| !meta.is_blank());
    }
}

pub(crate) struct StoreInner {
    pub(crate) schema: Arc<FormSchema>,
    pub(crate) config: FormConfig,
    pub(crate) state: RwLock<StoreState>,
    subscribers: Subscribers,
    pub(crate) tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared handle to a form's state.
///
/// Cloning is cheap; every clone sees the same values. The internal lock is
/// never held while subscriber callbacks or validators run.
///
/// ```
/// use formwork_form::{Field, FormSchema, FormStore, SetValueOptions};
///
/// let schema = FormSchema::builder()
///     .field(Field::text("username").required("Username is required"))
///     .build()
///     .unwrap();
/// let store = FormStore::new(schema);
///
/// store.set_value("username", "", SetValueOptions::all()).unwrap();
/// assert_eq!(
///     store.errors().message("username"),
///     Some("Username is required")
/// );
///
/// store.set_value("username", "neo", SetValueOptions::all()).unwrap();
/// assert!(store.errors().is_empty());
/// assert!(store.is_dirty());
/// ```
#[derive(Clone)]
pub struct FormStore {
    pub(crate) inner: Arc<StoreInner>,
}

impl FormStore {
    /// Store with the default configuration
    pub fn new(schema: FormSchema) -> Self {
        Self::with_config(schema, FormConfig::default())
    }

    pub fn with_config(schema: FormSchema, config: FormConfig) -> Self {
        let values = schema.default_values();
        let arrays = schema
            .arrays()
            .iter()
            .map(|array| {
                let ids = (0..array.default_len()).map(|_| EntryId::new()).collect();
                (array.path().clone(), ids)
            })
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                schema: Arc::new(schema),
                config,
                state: RwLock::new(StoreState {
                    baseline: values.clone(),
                    values,
                    meta: BTreeMap::new(),
                    arrays,
                    next_token: 0,
                    submitted: false,
                }),
                subscribers: Subscribers::default(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.inner.schema
    }

    pub fn config(&self) -> &FormConfig {
        &self.inner.config
    }

    /// Validation entry points for this store
    pub fn engine(&self) -> ValidationEngine {
        ValidationEngine::new(self.clone())
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Set a field value.
    ///
    /// The value is conformed to the field's kind. Subscribers are notified
    /// before validation starts; async rules continue in a spawned task.
    pub fn set_value(
        &self,
        path: &str,
        value: impl Into<FieldValue>,
        options: SetValueOptions,
    ) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        self.set_path(&path, value.into(), options)
    }

    pub(crate) fn set_path(
        &self,
        path: &FieldPath,
        value: FieldValue,
        options: SetValueOptions,
    ) -> FormResult<()> {
        let values = {
            let mut state = self.inner.state.write();
            let def = self.declared(&state, path)?;
            let value = def.kind().conform(value);

            let dirty = state.baseline.get_path(path) != Some(&value);
            state.values.insert(path.clone(), value);
            state.bump_token(path);

            let meta = state.meta.entry(path.clone()).or_default();
            if options.should_dirty {
                meta.dirty = dirty;
            }
            if options.should_touch {
                meta.touched = true;
            }
            state.values.clone()
        };

        formwork_log::trace!(target: targets::STORE, "set {}", path);
        self.notify(FormChange {
            path: Some(path.clone()),
            kind: ChangeKind::Value,
            values,
        });

        if options.should_validate {
            self.engine().validate_path(path)?;
        }
        Ok(())
    }

    /// Snapshot of every value. Does not notify anyone.
    pub fn get_values(&self) -> FormValues {
        self.inner.state.read().values.clone()
    }

    /// Current value of one field
    pub fn get_value(&self, path: &str) -> Option<FieldValue> {
        let path = FieldPath::parse(path).ok()?;
        self.inner.state.read().values.get_path(&path).cloned()
    }

    /// Values the form was last reset to
    pub fn default_values(&self) -> FormValues {
        self.inner.state.read().baseline.clone()
    }

    // ========================================================================
    // Input events
    // ========================================================================

    /// Raw input from a UI control.
    ///
    /// The text is coerced with the field's value kind; whether the field is
    /// validated follows the configured validation modes.
    pub fn change(&self, path: &str, raw: &str) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        let (value, touched, submitted) = {
            let state = self.inner.state.read();
            let def = self.declared(&state, &path)?;
            let touched = state.meta.get(&path).is_some_and(|meta| meta.touched);
            (def.kind().coerce(raw), touched, state.submitted)
        };

        let should_validate =
            self.inner
                .config
                .should_validate(InputEvent::Change, touched, submitted);
        self.set_path(
            &path,
            value,
            SetValueOptions {
                should_validate,
                should_dirty: true,
                should_touch: false,
            },
        )
    }

    /// A UI control lost focus
    pub fn blur(&self, path: &str) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        let (touched, submitted) = {
            let mut state = self.inner.state.write();
            self.declared(&state, &path)?;
            let submitted = state.submitted;
            let meta = state.meta.entry(path.clone()).or_default();
            let touched = meta.touched;
            meta.touched = true;
            (touched, submitted)
        };

        if self
            .inner
            .config
            .should_validate(InputEvent::Blur, touched, submitted)
        {
            self.engine().validate_path(&path)?;
        }
        Ok(())
    }

    /// Mark a field touched without validating
    pub fn touch(&self, path: &str) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        let mut state = self.inner.state.write();
        self.declared(&state, &path)?;
        state.meta.entry(path).or_default().touched = true;
        Ok(())
    }

    // ========================================================================
    // Field state
    // ========================================================================

    pub fn field_state(&self, path: &str) -> FormResult<FieldState> {
        let path = FieldPath::parse(path)?;
        let state = self.inner.state.read();
        let def = self.declared(&state, &path)?;
        let meta = state.meta.get(&path).cloned().unwrap_or_default();

        Ok(FieldState {
            value: state.values.get_path(&path).cloned().unwrap_or_default(),
            is_dirty: meta.dirty,
            is_touched: meta.touched,
            is_validating: meta.pending,
            is_disabled: def.is_disabled(&state.values),
            error: meta.error,
        })
    }

    /// Current errors in path order
    pub fn errors(&self) -> ValidationErrors {
        self.inner
            .state
            .read()
            .meta
            .values()
            .filter_map(|meta| meta.error.clone())
            .collect()
    }

    /// Error of one field
    pub fn error(&self, path: &str) -> Option<ValidationError> {
        let path = FieldPath::parse(path).ok()?;
        self.inner
            .state
            .read()
            .meta
            .get(&path)
            .and_then(|meta| meta.error.clone())
    }

    pub fn dirty_fields(&self) -> Vec<FieldPath> {
        self.collect_meta(|meta| meta.dirty)
    }

    pub fn touched_fields(&self) -> Vec<FieldPath> {
        self.collect_meta(|meta| meta.touched)
    }

    fn collect_meta(&self, predicate: impl Fn(&FieldMeta) -> bool) -> Vec<FieldPath> {
        self.inner
            .state
            .read()
            .meta
            .iter()
            .filter(|(_, meta)| predicate(meta))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Any value differs from the baseline, including array lengths
    pub fn is_dirty(&self) -> bool {
        let state = self.inner.state.read();
        state.values != state.baseline
    }

    /// No errors recorded and every enabled field satisfies its `required` rules
    pub fn is_valid(&self) -> bool {
        let state = self.inner.state.read();
        if state.meta.values().any(|meta| meta.error.is_some()) {
            return false;
        }

        let skip_disabled =
            self.inner.config.disabled_policy == formwork_config::DisabledPolicy::Skip;
        self.leaf_paths(&state).iter().all(|path| {
            let Some(def) = self.inner.schema.field(path) else {
                return true;
            };
            if skip_disabled && def.is_disabled(&state.values) {
                return true;
            }
            let value = state.values.get_path(path).cloned().unwrap_or_default();
            def.rules().required_satisfied(&value)
        })
    }

    /// Any async validation in flight
    pub fn is_validating(&self) -> bool {
        self.inner
            .state
            .read()
            .meta
            .values()
            .any(|meta| meta.pending)
    }

    /// Whether the form has been submitted since the last reset
    pub fn is_submitted(&self) -> bool {
        self.inner.state.read().submitted
    }

    pub(crate) fn mark_submitted(&self) {
        self.inner.state.write().submitted = true;
    }

    // ========================================================================
    // Manual errors
    // ========================================================================

    /// Record an error by hand, e.g. one returned by a server
    pub fn set_error(&self, path: &str, message: impl Into<String>) -> FormResult<()> {
        let path = FieldPath::parse(path)?;
        let mut state = self.inner.state.write();
        if self.declared(&state, &path).is_err() && self.inner.schema.array(&path).is_none() {
            return Err(FormError::UnknownField(path.to_string()));
        }

        let error = ValidationError::new(path.to_string(), message).with_constraint("manual");
        state.meta.entry(path).or_default().error = Some(error);
        Ok(())
    }

    /// Clear errors of the given paths and their descendants, or all errors
    pub fn clear_errors(&self, paths: Option<&[&str]>) -> FormResult<()> {
        let prefixes = match paths {
            Some(paths) => Some(
                paths
                    .iter()
                    .map(|path| FieldPath::parse(path))
                    .collect::<FormResult<Vec<_>>>()?,
            ),
            None => None,
        };

        let mut state = self.inner.state.write();
        for (path, meta) in state.meta.iter_mut() {
            let matches = prefixes
                .as_ref()
                .is_none_or(|prefixes| prefixes.iter().any(|prefix| path.starts_with(prefix)));
            if matches {
                meta.error = None;
            }
        }
        state.prune();
        Ok(())
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Restore values and clear dirty, touched, error and pending state.
    ///
    /// With `Some(values)` those values become the new baseline; otherwise
    /// the current baseline is restored. Every in-flight validation is
    /// superseded. Array entries keep the ids of positions that survive.
    pub fn reset(&self, values: Option<FormValues>) -> FormResult<()> {
        let baseline = match values {
            Some(values) => Some(self.normalize(values)?),
            None => None,
        };

        let values = {
            let mut state = self.inner.state.write();
            if let Some(baseline) = baseline {
                state.baseline = baseline;
            }
            state.values = state.baseline.clone();

            let lengths: Vec<(FieldPath, usize)> = self
                .inner
                .schema
                .arrays()
                .iter()
                .map(|array| (array.path().clone(), state.baseline.array_len(array.path())))
                .collect();
            for (path, len) in lengths {
                let ids = state.arrays.entry(path).or_default();
                ids.truncate(len);
                while ids.len() < len {
                    ids.push(EntryId::new());
                }
            }

            // Tokens are global and monotonic; dropping meta supersedes every
            // in-flight validation.
            state.meta.clear();
            state.submitted = false;
            state.values.clone()
        };

        formwork_log::debug!(target: targets::STORE, "reset to {} values", values.len());
        self.notify(FormChange {
            path: None,
            kind: ChangeKind::Reset,
            values,
        });
        Ok(())
    }

    /// Check caller supplied values against the schema and fill gaps with
    /// defaults
    fn normalize(&self, values: FormValues) -> FormResult<FormValues> {
        let schema = &self.inner.schema;
        let mut normalized = FormValues::new();

        for (path, value) in values {
            let def = schema
                .field(&path)
                .ok_or_else(|| FormError::UnknownField(path.to_string()))?;
            normalized.insert(path, def.kind().conform(value));
        }

        for def in schema.fields() {
            if !normalized.contains(def.relative()) {
                normalized.insert(def.relative().clone(), def.default_value().clone());
            }
        }

        for array in schema.arrays() {
            let len = normalized.array_len(array.path());
            let len = if len == 0 && !values_mention(&normalized, array.path()) {
                array.default_len()
            } else {
                len
            };
            for index in 0..len {
                let entry = array.path().index(index);
                for def in array.items() {
                    let path = entry.join(def.relative());
                    if !normalized.contains(&path) {
                        normalized.insert(path, def.default_value().clone());
                    }
                }
            }
        }

        Ok(normalized)
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Call `callback` after every value change, array mutation and reset
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FormChange) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(callback))
    }

    /// Like [`subscribe`](Self::subscribe), limited to changes affecting the
    /// given paths, their ancestors or descendants
    pub fn watch<F>(&self, paths: &[&str], callback: F) -> FormResult<Subscription>
    where
        F: Fn(&FormChange) + Send + Sync + 'static,
    {
        let watched = paths
            .iter()
            .map(|path| FieldPath::parse(path))
            .collect::<FormResult<Vec<_>>>()?;

        Ok(self.subscribe(move |change| {
            if watched.iter().any(|path| change.affects(path)) {
                callback(change);
            }
        }))
    }

    pub(crate) fn notify(&self, change: FormChange) {
        self.inner.subscribers.notify(&change);
    }

    // ========================================================================
    // Arrays
    // ========================================================================

    /// Controller for a declared array field
    pub fn field_array(&self, path: &str) -> FormResult<FieldArray> {
        let path = FieldPath::parse(path)?;
        if self.inner.schema.array(&path).is_some() {
            return Ok(FieldArray::new(self.clone(), path));
        }
        if self.inner.schema.field(&path).is_some() {
            return Err(FormError::NotAnArray(path.to_string()));
        }
        Err(FormError::UnknownField(path.to_string()))
    }

    // ========================================================================
    // Internals shared with the engine and array controller
    // ========================================================================

    /// Declaration of a leaf path that currently exists
    pub(crate) fn declared(&self, state: &StoreState, path: &FieldPath) -> FormResult<Arc<FieldDef>> {
        let def = self
            .inner
            .schema
            .field(path)
            .ok_or_else(|| FormError::UnknownField(path.to_string()))?;

        if let Some((array, index)) = self.inner.schema.array_entry(path) {
            let len = state.array_len(array.path());
            if index >= len {
                return Err(FormError::IndexOutOfRange {
                    path: array.path().to_string(),
                    index,
                    len,
                });
            }
        }
        Ok(def.clone())
    }

    /// Every leaf path that currently exists, in path order
    pub(crate) fn leaf_paths(&self, state: &StoreState) -> Vec<FieldPath> {
        let schema = &self.inner.schema;
        let mut paths: Vec<FieldPath> = schema
            .fields()
            .iter()
            .map(|def| def.relative().clone())
            .collect();

        for array in schema.arrays() {
            for index in 0..state.array_len(array.path()) {
                let entry = array.path().index(index);
                paths.extend(array.items().iter().map(|def| entry.join(def.relative())));
            }
        }
        paths.sort();
        paths
    }

    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }
}

fn values_mention(values: &FormValues, path: &FieldPath) -> bool {
    values.paths().any(|p| p.starts_with(path))
}

impl FieldReader for FormStore {
    fn read(&self, path: &FieldPath) -> Option<FieldValue> {
        self.inner.state.read().values.get_path(path).cloned()
    }

    fn snapshot(&self) -> FormValues {
        self.get_values()
    }
}

impl std::fmt::Debug for FormStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("FormStore")
            .field("values", &state.values)
            .field("submitted", &state.submitted)
            .field("subscribers", &self.inner.subscribers.len())
            .finish_non_exhaustive()
    }
}

/// Store handle that does not keep the store alive.
///
/// Spawned validation tasks hold this so a hanging validator cannot leak
/// the store.
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<FormStore> {
        self.0.upgrade().map(|inner| FormStore { inner })
    }
}

impl FieldReader for WeakStore {
    fn read(&self, path: &FieldPath) -> Option<FieldValue> {
        self.upgrade().and_then(|store| store.read(path))
    }

    fn snapshot(&self) -> FormValues {
        self.upgrade()
            .map(|store| store.get_values())
            .unwrap_or_default()
    }
}
