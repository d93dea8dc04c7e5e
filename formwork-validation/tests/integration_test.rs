//! Integration tests for formwork-validation

use formwork_core::{FieldPath, FieldValue, FormValues};
use formwork_validation::validators::{NotEndsWith, NotEqual};
use formwork_validation::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn email_rules(lookups: Arc<AtomicUsize>) -> ValidationRules {
    ValidationRules::new()
        .add(validators::email("Invalid email format"))
        .add(ValidationRule::custom(
            "notAdmin",
            NotEqual::new("admin@example.com").message("Enter a different email address"),
        ))
        .add(ValidationRule::custom(
            "notBlackListed",
            NotEndsWith::new("baddomain.com").message("This domain is not supported"),
        ))
        .add(ValidationRule::async_fn("emailAvailable", move |value: FieldValue, _| {
            let lookups = lookups.clone();
            async move {
                lookups.fetch_add(1, Ordering::SeqCst);
                if value.as_str() == Some("taken@example.com") {
                    Err("Email already exists".to_string())
                } else {
                    Ok(())
                }
            }
        }))
}

fn email_ctx() -> ValidationContext {
    ValidationContext::from_values(FieldPath::parse("email").unwrap(), FormValues::new())
}

#[test]
fn test_sync_failures_never_reach_async_rule() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let rules = email_rules(lookups.clone());

    for (input, message) in [
        ("not an email", "Invalid email format"),
        ("admin@example.com", "Enter a different email address"),
        ("neo@baddomain.com", "This domain is not supported"),
    ] {
        match rules.evaluate_sync(&FieldValue::from(input), &email_ctx()) {
            ChainOutcome::Invalid(error) => assert_eq!(error.message, message),
            other => panic!("{} gave {:?}", input, other),
        }
    }
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_async_rule_runs_after_sync_prefix() {
    let lookups = Arc::new(AtomicUsize::new(0));
    let rules = email_rules(lookups.clone());

    assert_eq!(
        rules.evaluate_sync(&FieldValue::from("neo@example.com"), &email_ctx()),
        ChainOutcome::Suspended { resume_at: 3 }
    );

    let error = rules
        .evaluate(&FieldValue::from("taken@example.com"), &email_ctx())
        .await
        .unwrap();
    assert_eq!(error.kind, ValidationErrorKind::AsyncRuleFailed);
    assert_eq!(error.constraint, "emailAvailable");
    assert_eq!(error.value.as_deref(), Some("taken@example.com"));

    assert!(rules
        .evaluate(&FieldValue::from("neo@example.com"), &email_ctx())
        .await
        .is_none());
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cross_field_rule_reads_context() {
    let values = FormValues::new().with("channel", "").unwrap();
    let ctx = ValidationContext::from_values(FieldPath::parse("social.twitter").unwrap(), values);

    let rule = ValidationRule::custom(
        "needsChannel",
        |value: &FieldValue, ctx: &ValidationContext| -> Result<(), String> {
            let channel = ctx.value_of("channel").unwrap_or_default();
            if !value.is_empty() && channel.is_empty() {
                Err("Set a channel first".to_string())
            } else {
                Ok(())
            }
        },
    );

    assert!(matches!(
        rule.check(&FieldValue::from("@neo"), &ctx),
        RuleOutcome::Failed(ValidationError { ref message, .. }) if message == "Set a channel first"
    ));
    assert_eq!(rule.check(&FieldValue::from(""), &ctx), RuleOutcome::Passed);
}

struct Availability {
    taken: Vec<String>,
}

#[async_trait::async_trait]
impl AsyncValidator for Availability {
    async fn validate_async(
        &self,
        value: &FieldValue,
        _ctx: &ValidationContext,
    ) -> Result<(), String> {
        tokio::task::yield_now().await;
        match value.as_str() {
            Some(text) if self.taken.iter().any(|t| t == text) => {
                Err("Username is taken".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[tokio::test]
async fn test_trait_based_async_validator() {
    let rules = ValidationRules::new()
        .add(ValidationRule::required("Username is required"))
        .add(ValidationRule::async_rule(
            "available",
            Availability {
                taken: vec!["trinity".to_string()],
            },
        ));
    let ctx = ValidationContext::from_values(FieldPath::parse("username").unwrap(), FormValues::new());

    let error = rules.evaluate(&FieldValue::from(""), &ctx).await.unwrap();
    assert_eq!(error.kind, ValidationErrorKind::RequiredMissing);

    let error = rules.evaluate(&FieldValue::from("trinity"), &ctx).await.unwrap();
    assert_eq!(error.message, "Username is taken");

    assert!(rules.evaluate(&FieldValue::from("neo"), &ctx).await.is_none());
}

#[test]
fn test_errors_collection() {
    let errors: ValidationErrors = vec![
        ValidationError::new("username", "Username is required")
            .with_kind(ValidationErrorKind::RequiredMissing),
        ValidationError::new("phNumbers", "At least one phone number")
            .with_kind(ValidationErrorKind::ArrayMinimumViolation),
    ]
    .into_iter()
    .collect();

    assert_eq!(errors.len(), 2);
    assert_eq!(errors.fields(), vec!["username", "phNumbers"]);
    assert_eq!(errors.to_json()["errors"][1]["kind"], "array_minimum_violation");
}
