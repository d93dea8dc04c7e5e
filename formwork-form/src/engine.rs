//! Validation engine
//!
//! Runs field rule chains against the store. Synchronous rules run inline;
//! when a chain reaches an async rule the rest of it continues in a spawned
//! task. Every request carries a token and a result is written back only if
//! the field's token has not moved since, so a slow response for an old
//! value never overwrites the state of a newer one.

use crate::store::FormStore;
use formwork_config::DisabledPolicy;
use formwork_core::{FieldPath, FormError, FormResult};
use formwork_log::targets;
use formwork_validation::{ChainOutcome, ValidationContext, ValidationError, ValidationErrorKind, ValidationErrors};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Validation entry points bound to a store
#[derive(Clone)]
pub struct ValidationEngine {
    store: FormStore,
}

impl ValidationEngine {
    pub(crate) fn new(store: FormStore) -> Self {
        Self { store }
    }

    /// Validate one field.
    ///
    /// Returns once the synchronous part of the chain has run. If the chain
    /// reaches an async rule the field is marked validating and the rest runs
    /// on the current tokio runtime; without one this fails with
    /// [`FormError::Runtime`].
    pub fn validate_field(&self, path: &str) -> FormResult<()> {
        self.validate_path(&FieldPath::parse(path)?)
    }

    pub(crate) fn validate_path(&self, path: &FieldPath) -> FormResult<()> {
        let (def, value, token) = {
            let mut state = self.store.inner.state.write();
            let def = self.store.declared(&state, path)?;
            let token = state.bump_token(path);

            if self.skips(&def, &state.values) {
                if let Some(meta) = state.meta.get_mut(path) {
                    meta.error = None;
                }
                drop(state);
                formwork_log::debug!(target: targets::VALIDATION, "{} is disabled, skipped", path);
                return Ok(());
            }

            let value = state.values.get_path(path).cloned().unwrap_or_default();
            (def, value, token)
        };

        let ctx = self.context(path);
        match def.rules().evaluate_sync(&value, &ctx) {
            ChainOutcome::Valid => {
                self.commit(path, token, None);
            }
            ChainOutcome::Invalid(error) => {
                self.commit(path, token, Some(error));
            }
            ChainOutcome::Suspended { resume_at } => {
                let handle = Handle::try_current().map_err(|e| FormError::Runtime(e.to_string()))?;
                self.mark_pending(path, token);

                let store = self.store.downgrade();
                let path = path.clone();
                let task = handle.spawn(async move {
                    let error = def.rules().evaluate_from(resume_at, &value, &ctx).await;
                    if let Some(store) = store.upgrade() {
                        ValidationEngine::new(store).commit(&path, token, error);
                    }
                });
                self.store.track(task);
            }
        }
        Ok(())
    }

    /// Validate every field and every array's minimum length.
    ///
    /// Async rules of all fields are awaited concurrently; failures in one
    /// field never stop the others. Results are committed under the usual
    /// token check and returned in path order, array errors last.
    pub async fn validate_all(&self) -> ValidationErrors {
        let paths = {
            let state = self.store.inner.state.read();
            self.store.leaf_paths(&state)
        };

        let mut errors = self.run_pass(paths).await;
        let arrays: Vec<FieldPath> = self
            .store
            .schema()
            .arrays()
            .iter()
            .map(|array| array.path().clone())
            .collect();
        for array in arrays {
            if let Some(error) = self.check_array(&array) {
                errors.add(error);
            }
        }
        errors
    }

    /// Validate the given fields, or all fields for `None`, and report
    /// whether they all passed.
    ///
    /// A path may name a leaf, an object prefix such as `social`, or an array.
    pub async fn trigger(&self, paths: Option<&[&str]>) -> FormResult<bool> {
        let Some(paths) = paths else {
            return Ok(self.validate_all().await.is_empty());
        };

        let requested = paths
            .iter()
            .map(|path| FieldPath::parse(path))
            .collect::<FormResult<Vec<_>>>()?;

        let (leaves, arrays) = {
            let state = self.store.inner.state.read();
            let all = self.store.leaf_paths(&state);
            let mut leaves: Vec<FieldPath> = Vec::new();
            let mut arrays: Vec<FieldPath> = Vec::new();

            for prefix in &requested {
                let matched: Vec<&FieldPath> =
                    all.iter().filter(|path| path.starts_with(prefix)).collect();
                let is_array = self.store.schema().array(prefix).is_some();
                if matched.is_empty() && !is_array {
                    return Err(FormError::UnknownField(prefix.to_string()));
                }
                if is_array {
                    arrays.push(prefix.clone());
                }
                for path in matched {
                    if !leaves.contains(path) {
                        leaves.push(path.clone());
                    }
                }
            }
            leaves.sort();
            (leaves, arrays)
        };

        let mut valid = self.run_pass(leaves).await.is_empty();
        for array in arrays {
            valid &= self.check_array(&array).is_none();
        }
        Ok(valid)
    }

    /// Wait until every spawned validation task has finished
    pub async fn settle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.store.inner.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(err) = task.await {
                    formwork_log::error!(target: targets::VALIDATION, "validation task failed: {}", err);
                }
            }
        }
    }

    /// Validate `paths` concurrently and report the committed failures in
    /// path order.
    ///
    /// A field edited while its chain was running gets a stale result,
    /// which is discarded; the field is then validated again at its current
    /// value so the report always matches the store.
    async fn run_pass(&self, paths: Vec<FieldPath>) -> ValidationErrors {
        let mut failed = BTreeMap::new();
        let mut round = paths;

        while !round.is_empty() {
            let (errors, superseded) = self.run_round(round).await;
            for path in &superseded {
                failed.remove(path);
            }
            failed.extend(errors);
            round = superseded;
        }
        failed.into_values().collect()
    }

    async fn run_round(
        &self,
        paths: Vec<FieldPath>,
    ) -> (Vec<(FieldPath, ValidationError)>, Vec<FieldPath>) {
        let jobs = {
            let mut state = self.store.inner.state.write();
            let mut jobs = Vec::with_capacity(paths.len());

            for path in paths {
                // Entries removed since the path was listed are gone
                let Ok(def) = self.store.declared(&state, &path) else {
                    continue;
                };
                let token = state.bump_token(&path);

                if self.skips(&def, &state.values) {
                    if let Some(meta) = state.meta.get_mut(&path) {
                        meta.error = None;
                    }
                    continue;
                }

                if def.rules().has_async() {
                    if let Some(meta) = state.meta.get_mut(&path) {
                        meta.pending = true;
                    }
                }
                let value = state.values.get_path(&path).cloned().unwrap_or_default();
                jobs.push((path, def, value, token));
            }
            jobs
        };

        let results = join_all(jobs.into_iter().map(|(path, def, value, token)| {
            let ctx = self.context(&path);
            async move {
                let error = def.rules().evaluate(&value, &ctx).await;
                (path, token, error)
            }
        }))
        .await;

        let mut errors = Vec::new();
        let mut superseded = Vec::new();
        for (path, token, error) in results {
            if !self.commit(&path, token, error.clone()) {
                superseded.push(path);
            } else if let Some(error) = error {
                errors.push((path, error));
            }
        }
        (errors, superseded)
    }

    /// Check an array against the configured minimum and record the result
    /// on the array path
    fn check_array(&self, array: &FieldPath) -> Option<ValidationError> {
        let min = self.store.config().min_array_entries;
        let mut state = self.store.inner.state.write();
        let len = state.array_len(array);

        let error = (len < min).then(|| {
            ValidationError::new(
                array.to_string(),
                format!("{} must have at least {} entries", array, min),
            )
            .with_kind(ValidationErrorKind::ArrayMinimumViolation)
            .with_constraint("min_entries")
            .with_value(len.to_string())
        });

        state.bump_token(array);
        if let Some(meta) = state.meta.get_mut(array) {
            meta.error = error.clone();
        }
        error
    }

    /// Write a result if `token` is still current for `path`
    pub(crate) fn commit(&self, path: &FieldPath, token: u64, error: Option<ValidationError>) -> bool {
        let mut state = self.store.inner.state.write();
        if state.token(path) != token {
            drop(state);
            formwork_log::debug!(
                target: targets::VALIDATION,
                "discarding superseded result for {}",
                path
            );
            return false;
        }

        if let Some(meta) = state.meta.get_mut(path) {
            meta.pending = false;
            meta.error = error;
            match &meta.error {
                Some(error) => formwork_log::debug!(
                    target: targets::VALIDATION,
                    "{} invalid: {}",
                    path,
                    error.message
                ),
                None => formwork_log::debug!(target: targets::VALIDATION, "{} valid", path),
            }
        }
        true
    }

    fn mark_pending(&self, path: &FieldPath, token: u64) {
        let mut state = self.store.inner.state.write();
        if state.token(path) == token {
            if let Some(meta) = state.meta.get_mut(path) {
                meta.pending = true;
            }
        }
    }

    fn skips(&self, def: &crate::schema::FieldDef, values: &formwork_core::FormValues) -> bool {
        self.store.config().disabled_policy == DisabledPolicy::Skip && def.is_disabled(values)
    }

    fn context(&self, path: &FieldPath) -> ValidationContext {
        ValidationContext::new(path.clone(), Arc::new(self.store.downgrade()))
    }
}

impl std::fmt::Debug for ValidationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationEngine").finish_non_exhaustive()
    }
}
