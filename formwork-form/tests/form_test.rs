//! Integration tests for formwork-form

use formwork_core::{FieldValue, FormValues};
use formwork_form::*;
use formwork_log::{Level, capture};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Barrier, oneshot};

type Gates = Arc<Mutex<HashMap<String, oneshot::Receiver<Result<(), String>>>>>;

/// Email field whose async check for a value waits until the test answers
/// through the gate registered for that value
fn gated_store() -> (FormStore, Gates) {
    let gates: Gates = Arc::new(Mutex::new(HashMap::new()));
    let lookup = gates.clone();

    let schema = FormSchema::builder()
        .field(
            Field::text("email")
                .required("Email is required")
                .validate_async("emailAvailable", move |value: FieldValue, _| {
                    let gate = lookup.lock().unwrap().remove(&value.to_string());
                    async move {
                        match gate {
                            Some(gate) => gate.await.unwrap_or(Ok(())),
                            None => Ok(()),
                        }
                    }
                }),
        )
        .build()
        .unwrap();

    (FormStore::new(schema), gates)
}

fn gate(gates: &Gates, value: &str) -> oneshot::Sender<Result<(), String>> {
    let (tx, rx) = oneshot::channel();
    gates.lock().unwrap().insert(value.to_string(), rx);
    tx
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_stale_async_result_never_overwrites_newer_value() {
    let (store, gates) = gated_store();
    let answer_a = gate(&gates, "a");
    let answer_b = gate(&gates, "b");

    capture::start(Level::Debug);

    store.set_value("email", "a", SetValueOptions::all()).unwrap();
    store.set_value("email", "b", SetValueOptions::all()).unwrap();
    assert!(store.field_state("email").unwrap().is_validating);

    answer_b.send(Ok(())).unwrap();
    wait_until(|| !store.is_validating()).await;

    answer_a.send(Err("Email already exists".to_string())).unwrap();
    store.engine().settle().await;

    let lines = capture::take();
    let state = store.field_state("email").unwrap();
    assert_eq!(state.value, FieldValue::from("b"));
    assert!(state.error.is_none());
    assert!(!state.is_validating);
    assert!(
        lines
            .iter()
            .any(|line| line.contains("discarding superseded result for email")),
        "{:?}",
        lines
    );
}

#[tokio::test]
async fn test_async_failure_is_committed() {
    let (store, gates) = gated_store();
    let answer = gate(&gates, "taken@example.com");

    store
        .set_value("email", "taken@example.com", SetValueOptions::all())
        .unwrap();
    answer.send(Err("Email already exists".to_string())).unwrap();
    store.engine().settle().await;

    let error = store.error("email").unwrap();
    assert_eq!(error.message, "Email already exists");
    assert_eq!(error.kind, formwork_validation::ValidationErrorKind::AsyncRuleFailed);
}

#[tokio::test]
async fn test_sync_failure_skips_async_rule() {
    let (store, _gates) = gated_store();

    store.set_value("email", "", SetValueOptions::all()).unwrap();
    assert!(!store.is_validating());
    assert_eq!(store.errors().message("email"), Some("Email is required"));
}

#[tokio::test]
async fn test_reset_supersedes_in_flight_validation() {
    let (store, gates) = gated_store();
    let answer = gate(&gates, "x@example.com");

    store
        .set_value("email", "x@example.com", SetValueOptions::all())
        .unwrap();
    store.reset(None).unwrap();
    assert!(!store.is_validating());

    answer.send(Err("Email already exists".to_string())).unwrap();
    store.engine().settle().await;

    assert!(store.errors().is_empty());
    assert_eq!(store.get_value("email"), Some(FieldValue::from("")));
}

fn profile_store() -> FormStore {
    let schema = FormSchema::builder()
        .field(Field::text("username").required("Username is required"))
        .field(Field::text("channel"))
        .array(FieldArrayDef::new("phNumbers").item(Field::text("number")))
        .build()
        .unwrap();
    FormStore::new(schema)
}

#[tokio::test]
async fn test_reset_twice_equals_once() {
    let store = profile_store();
    let phones = store.field_array("phNumbers").unwrap();
    phones
        .append(FormValues::new().with("number", "555").unwrap())
        .unwrap();
    store.set_value("username", "neo", SetValueOptions::all()).unwrap();
    store.set_error("channel", "Taken").unwrap();

    store.reset(None).unwrap();
    let once = (
        store.get_values(),
        phones.ids(),
        store.errors(),
        store.dirty_fields(),
        store.touched_fields(),
        store.is_dirty(),
    );

    store.reset(None).unwrap();
    let twice = (
        store.get_values(),
        phones.ids(),
        store.errors(),
        store.dirty_fields(),
        store.touched_fields(),
        store.is_dirty(),
    );

    assert_eq!(once, twice);
    assert_eq!(phones.len(), 1);
}

#[tokio::test]
async fn test_reset_keeps_surviving_entry_ids() {
    let store = profile_store();
    let phones = store.field_array("phNumbers").unwrap();
    let first = phones.ids()[0];
    phones.append(FormValues::new()).unwrap();

    store.reset(None).unwrap();
    assert_eq!(phones.ids(), vec![first]);
}

#[tokio::test]
async fn test_array_changes_notify_subscribers() {
    let store = profile_store();
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = kinds.clone();
    let subscription = store
        .watch(&["phNumbers.1.number"], move |change: &FormChange| {
            sink.lock().unwrap().push(change.kind.clone());
        })
        .unwrap();

    let phones = store.field_array("phNumbers").unwrap();
    phones.append(FormValues::new()).unwrap();
    store
        .set_value("phNumbers.1.number", "555", SetValueOptions::default())
        .unwrap();
    store
        .set_value("username", "neo", SetValueOptions::default())
        .unwrap();
    phones.remove(1).unwrap();

    subscription.unsubscribe();
    phones.append(FormValues::new()).unwrap();

    assert_eq!(
        *kinds.lock().unwrap(),
        vec![
            ChangeKind::ArrayAppend { index: 1 },
            ChangeKind::Value,
            ChangeKind::ArrayRemove { index: 1 },
        ]
    );
}

#[tokio::test]
async fn test_validate_all_awaits_async_rules_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let first = barrier.clone();
    let second = barrier.clone();

    let schema = FormSchema::builder()
        .field(Field::text("email").validate_async("slow", move |_, _| {
            let barrier = first.clone();
            async move {
                barrier.wait().await;
                Err("Email already exists".to_string())
            }
        }))
        .field(Field::text("username").validate_async("slow", move |_, _| {
            let barrier = second.clone();
            async move {
                barrier.wait().await;
                Ok(())
            }
        }))
        .build()
        .unwrap();
    let store = FormStore::new(schema);

    let errors = tokio::time::timeout(Duration::from_secs(5), store.engine().validate_all())
        .await
        .expect("async rules did not run concurrently");

    assert_eq!(errors.len(), 1);
    assert_eq!(errors.message("email"), Some("Email already exists"));
    assert!(!store.is_validating());
}

#[tokio::test]
async fn test_cross_field_rule_sees_latest_values() {
    let schema = FormSchema::builder()
        .field(Field::text("password"))
        .field(Field::text("confirm").validate(
            "matches",
            formwork_validation::validators::MatchesField::new("password")
                .message("Passwords do not match"),
        ))
        .build()
        .unwrap();
    let store = FormStore::new(schema);

    store
        .set_value("password", "hunter2", SetValueOptions::default())
        .unwrap();
    store
        .set_value("confirm", "hunter2", SetValueOptions::all())
        .unwrap();
    assert!(store.error("confirm").is_none());

    store
        .set_value("password", "hunter3", SetValueOptions::default())
        .unwrap();
    assert!(!store.engine().trigger(Some(&["confirm"][..])).await.unwrap());
    assert_eq!(store.errors().message("confirm"), Some("Passwords do not match"));
}

#[tokio::test]
async fn test_concurrent_submit_is_rejected() {
    let store = profile_store();
    store
        .set_value("username", "neo", SetValueOptions::default())
        .unwrap();
    let submitter = SubmissionController::new(store.clone());
    let (release, gate) = oneshot::channel::<()>();

    let running = submitter.clone();
    let first = tokio::spawn(async move {
        running
            .submit(
                |_| async move {
                    let _ = gate.await;
                    Ok::<(), Infallible>(())
                },
                |_| {},
            )
            .await
    });

    wait_until(|| submitter.phase() == SubmitPhase::Submitting).await;
    assert!(submitter.is_submitting());

    let second = submitter
        .submit(|_| async { Ok::<(), Infallible>(()) }, |_| {})
        .await;
    assert!(second.is_rejected());

    release.send(()).unwrap();
    assert!(first.await.unwrap().is_submitted());
    assert_eq!(submitter.submit_count(), 1);
    assert_eq!(submitter.phase(), SubmitPhase::Idle);
}

#[tokio::test]
async fn test_submit_without_reset_on_success() {
    let schema = FormSchema::builder()
        .field(Field::text("username").required("Username is required"))
        .build()
        .unwrap();
    let config = formwork_config::FormConfig::builder()
        .reset_on_success(false)
        .build()
        .unwrap();
    let store = FormStore::with_config(schema, config);
    store
        .set_value("username", "neo", SetValueOptions::default())
        .unwrap();

    let outcome = SubmissionController::new(store.clone())
        .submit(|_| async { Ok::<(), Infallible>(()) }, |_| {})
        .await;

    assert!(outcome.is_submitted());
    assert_eq!(store.get_value("username"), Some(FieldValue::from("neo")));
    assert!(store.is_submitted());
}

#[tokio::test]
async fn test_submit_during_validation_is_rejected() {
    let (store, gates) = gated_store();
    let answer = gate(&gates, "a@example.com");
    store
        .set_value("email", "a@example.com", SetValueOptions::default())
        .unwrap();
    let submitter = SubmissionController::new(store.clone());

    let running = submitter.clone();
    let first = tokio::spawn(async move {
        running
            .submit(|_| async { Ok::<(), Infallible>(()) }, |_| {})
            .await
    });

    wait_until(|| submitter.phase() == SubmitPhase::Validating && store.is_validating()).await;

    let second = submitter
        .submit(|_| async { Ok::<(), Infallible>(()) }, |_| {})
        .await;
    assert!(second.is_rejected());
    assert_eq!(submitter.phase(), SubmitPhase::Validating);

    answer.send(Ok(())).unwrap();
    assert!(first.await.unwrap().is_submitted());
    assert_eq!(submitter.submit_count(), 1);
}

#[tokio::test]
async fn test_edit_during_submit_validation_uses_current_value() {
    let (store, gates) = gated_store();
    let answer = gate(&gates, "a@example.com");
    store
        .set_value("email", "a@example.com", SetValueOptions::default())
        .unwrap();
    let submitter = SubmissionController::new(store.clone());
    let submitted: Arc<Mutex<Option<FormValues>>> = Arc::new(Mutex::new(None));
    let invalid = Arc::new(Mutex::new(false));

    let running = submitter.clone();
    let received = submitted.clone();
    let rejected = invalid.clone();
    let first = tokio::spawn(async move {
        running
            .submit(
                move |values| async move {
                    *received.lock().unwrap() = Some(values);
                    Ok::<(), Infallible>(())
                },
                move |_| *rejected.lock().unwrap() = true,
            )
            .await
    });

    wait_until(|| store.is_validating()).await;
    store
        .set_value("email", "b@example.com", SetValueOptions::default())
        .unwrap();
    answer.send(Err("Email already exists".to_string())).unwrap();

    assert!(first.await.unwrap().is_submitted());
    assert!(!*invalid.lock().unwrap());
    assert!(store.errors().is_empty());
    let values = submitted.lock().unwrap().take().unwrap();
    assert_eq!(values.get("email"), Some(&FieldValue::from("b@example.com")));
}

#[test]
fn test_validate_all_reports_array_minimum() {
    let schema = FormSchema::builder()
        .field(Field::text("username").required("Username is required"))
        .array(FieldArrayDef::new("phNumbers").item(Field::text("number")))
        .build()
        .unwrap();
    let config = formwork_config::FormConfig::builder()
        .min_array_entries(2)
        .build()
        .unwrap();
    let store = FormStore::with_config(schema, config);
    store
        .field_array("phNumbers")
        .unwrap()
        .append(FormValues::new())
        .unwrap();

    let errors = tokio_test::block_on(store.engine().validate_all());

    assert_eq!(errors.len(), 2);
    assert_eq!(errors.message("username"), Some("Username is required"));
    let array = errors.get("phNumbers").unwrap();
    assert_eq!(
        array.kind,
        formwork_validation::ValidationErrorKind::ArrayMinimumViolation
    );
    assert_eq!(array.message, "phNumbers must have at least 2 entries");
    assert_eq!(store.errors().get("phNumbers"), Some(array));
}
