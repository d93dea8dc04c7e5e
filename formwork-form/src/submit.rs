//! Submission orchestration

use crate::store::FormStore;
use formwork_core::FormValues;
use formwork_log::targets;
use formwork_validation::ValidationErrors;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Where a submission currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitPhase {
    #[default]
    Idle,
    /// Running full validation
    Validating,
    /// Awaiting the success handler
    Submitting,
}

/// How a call to [`SubmissionController::submit`] ended
#[derive(Debug)]
pub enum SubmitOutcome<E> {
    /// Validation passed and the handler returned `Ok`
    Submitted,
    /// Validation failed; the error handler ran
    Invalid(ValidationErrors),
    /// Validation passed but the handler returned an error
    Failed(E),
    /// Another submission was still running; no handler ran
    Rejected,
}

impl<E> SubmitOutcome<E> {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, SubmitOutcome::Rejected)
    }
}

#[derive(Debug, Default)]
struct SubmitState {
    phase: SubmitPhase,
    submit_count: u32,
    submitted: bool,
    successful: bool,
}

/// Runs submissions against a store:
/// `Idle -> Validating -> Submitting -> Idle`, or back to `Idle` straight
/// from `Validating` when validation fails.
///
/// ```no_run
/// use formwork_form::{FormStore, SubmissionController};
///
/// # async fn example(store: FormStore) {
/// let submitter = SubmissionController::new(store);
/// let outcome = submitter
///     .submit(
///         |values| async move {
///             println!("submitted {}", values.to_json());
///             Ok::<(), std::io::Error>(())
///         },
///         |errors| println!("invalid: {}", errors),
///     )
///     .await;
/// assert!(outcome.is_submitted());
/// # }
/// ```
#[derive(Clone)]
pub struct SubmissionController {
    store: FormStore,
    state: Arc<Mutex<SubmitState>>,
}

impl SubmissionController {
    pub fn new(store: FormStore) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(SubmitState::default())),
        }
    }

    pub fn store(&self) -> &FormStore {
        &self.store
    }

    /// Validate everything, then call `on_valid` with the values or
    /// `on_invalid` with the errors.
    ///
    /// `on_valid` receives the values the validation pass accepted.
    /// On `Ok` the store is reset when `reset_on_success` is configured.
    /// A call made while another submission is running is rejected.
    pub async fn submit<V, Fut, E, I>(&self, on_valid: V, on_invalid: I) -> SubmitOutcome<E>
    where
        V: FnOnce(FormValues) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        I: FnOnce(&ValidationErrors),
    {
        let _guard = match self.begin() {
            Some(guard) => guard,
            None => {
                formwork_log::warn!(
                    target: targets::SUBMIT,
                    "submit rejected: a submission is already running"
                );
                return SubmitOutcome::Rejected;
            }
        };

        self.store.mark_submitted();
        let errors = self.store.engine().validate_all().await;

        if !errors.is_empty() {
            formwork_log::info!(
                target: targets::SUBMIT,
                "validation failed for {} field(s)",
                errors.len()
            );
            on_invalid(&errors);
            return SubmitOutcome::Invalid(errors);
        }

        self.set_phase(SubmitPhase::Submitting);
        let values = self.store.get_values();
        formwork_log::info!(target: targets::SUBMIT, "submitting");

        match on_valid(values).await {
            Ok(()) => {
                self.state.lock().successful = true;
                formwork_log::info!(target: targets::SUBMIT, "submitted");
                if self.store.config().reset_on_success {
                    if let Err(err) = self.store.reset(None) {
                        formwork_log::error!(target: targets::SUBMIT, "reset after submit failed: {}", err);
                    }
                }
                SubmitOutcome::Submitted
            }
            Err(err) => {
                formwork_log::info!(target: targets::SUBMIT, "submit handler failed");
                SubmitOutcome::Failed(err)
            }
        }
    }

    pub fn phase(&self) -> SubmitPhase {
        self.state.lock().phase
    }

    /// Validating or awaiting the handler
    pub fn is_submitting(&self) -> bool {
        self.phase() != SubmitPhase::Idle
    }

    /// At least one submission has started
    pub fn is_submitted(&self) -> bool {
        self.state.lock().submitted
    }

    /// The last submission passed validation and its handler returned `Ok`
    pub fn is_submit_successful(&self) -> bool {
        self.state.lock().successful
    }

    pub fn submit_count(&self) -> u32 {
        self.state.lock().submit_count
    }

    fn begin(&self) -> Option<PhaseGuard> {
        let mut state = self.state.lock();
        if state.phase != SubmitPhase::Idle {
            return None;
        }
        state.phase = SubmitPhase::Validating;
        state.submit_count += 1;
        state.submitted = true;
        state.successful = false;
        drop(state);

        formwork_log::info!(target: targets::SUBMIT, "validating");
        Some(PhaseGuard {
            state: self.state.clone(),
        })
    }

    fn set_phase(&self, phase: SubmitPhase) {
        self.state.lock().phase = phase;
    }
}

impl fmt::Debug for SubmissionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionController")
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Returns the controller to `Idle` however the submission ends, including
/// when the submit future is dropped mid-way
struct PhaseGuard {
    state: Arc<Mutex<SubmitState>>,
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.state.lock().phase = SubmitPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FormSchema};
    use crate::store::SetValueOptions;
    use formwork_core::FieldValue;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn store() -> FormStore {
        let schema = FormSchema::builder()
            .field(Field::text("username").required("Username is required"))
            .build()
            .unwrap();
        FormStore::new(schema)
    }

    #[tokio::test]
    async fn test_invalid_submit() {
        let submitter = SubmissionController::new(store());
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let mut seen = None;

        let outcome = submitter
            .submit(
                |_| async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok::<(), Infallible>(())
                },
                |errors| seen = Some(errors.to_map()),
            )
            .await;

        assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(seen.unwrap()["username"], "Username is required");
        assert_eq!(submitter.phase(), SubmitPhase::Idle);
        assert!(submitter.is_submitted());
        assert!(!submitter.is_submit_successful());
        assert_eq!(submitter.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_handler_keeps_values() {
        let store = store();
        store.set_value("username", "neo", SetValueOptions::default()).unwrap();
        let submitter = SubmissionController::new(store.clone());

        let outcome = submitter
            .submit(|_| async { Err("server down") }, |_| {})
            .await;

        assert!(matches!(outcome, SubmitOutcome::Failed("server down")));
        assert!(!submitter.is_submit_successful());
        assert_eq!(store.get_value("username"), Some(FieldValue::from("neo")));
    }

    #[tokio::test]
    async fn test_reset_on_success() {
        let store = store();
        store.set_value("username", "neo", SetValueOptions::default()).unwrap();
        let submitter = SubmissionController::new(store.clone());

        let outcome = submitter
            .submit(|_| async { Ok::<(), Infallible>(()) }, |_| {})
            .await;

        assert!(outcome.is_submitted());
        assert!(submitter.is_submit_successful());
        assert_eq!(store.get_value("username"), Some(FieldValue::from("")));
        assert!(!store.is_submitted());
    }
}
