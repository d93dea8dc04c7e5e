// Validation rules and rule chains

use crate::{AsyncFn, AsyncValidator, ValidationContext, ValidationError, ValidationErrorKind, Validator};
use formwork_core::{FieldValue, FormError, FormResult};
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A single validation rule.
///
/// Every variant goes through [`ValidationRule::check`] (or
/// [`ValidationRule::check_async`]); there is no per-variant evaluation path.
#[derive(Clone)]
pub enum ValidationRule {
    /// Value must not be empty
    Required { message: String },

    /// Non-empty text must match; empty values are left to `Required`
    Pattern { regex: Regex, message: String },

    /// Synchronous validator returning its own message
    Custom {
        name: String,
        validator: Arc<dyn Validator>,
    },

    /// Asynchronous validator; the rest of the chain waits for it
    Async {
        name: String,
        validator: Arc<dyn AsyncValidator>,
    },
}

/// Result of running one rule synchronously
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Passed,
    Failed(ValidationError),
    /// The rule is async and has to be awaited
    Deferred,
}

impl ValidationRule {
    pub fn required(message: impl Into<String>) -> Self {
        ValidationRule::Required {
            message: message.into(),
        }
    }

    /// Compile a pattern rule; a bad expression is a schema error
    pub fn pattern(pattern: &str, message: impl Into<String>) -> FormResult<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| FormError::InvalidSchema(format!("bad pattern {:?}: {}", pattern, e)))?;
        Ok(Self::pattern_regex(regex, message))
    }

    pub fn pattern_regex(regex: Regex, message: impl Into<String>) -> Self {
        ValidationRule::Pattern {
            regex,
            message: message.into(),
        }
    }

    pub fn custom<V>(name: impl Into<String>, validator: V) -> Self
    where
        V: Validator + 'static,
    {
        ValidationRule::Custom {
            name: name.into(),
            validator: Arc::new(validator),
        }
    }

    pub fn async_rule<V>(name: impl Into<String>, validator: V) -> Self
    where
        V: AsyncValidator + 'static,
    {
        ValidationRule::Async {
            name: name.into(),
            validator: Arc::new(validator),
        }
    }

    /// Async rule from a closure returning a future
    pub fn async_fn<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(FieldValue, ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self::async_rule(name, AsyncFn(check))
    }

    /// Constraint name reported in errors
    pub fn name(&self) -> &str {
        match self {
            ValidationRule::Required { .. } => "required",
            ValidationRule::Pattern { .. } => "pattern",
            ValidationRule::Custom { name, .. } | ValidationRule::Async { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ValidationErrorKind {
        match self {
            ValidationRule::Required { .. } => ValidationErrorKind::RequiredMissing,
            ValidationRule::Pattern { .. } => ValidationErrorKind::PatternMismatch,
            ValidationRule::Custom { .. } => ValidationErrorKind::CustomRuleFailed,
            ValidationRule::Async { .. } => ValidationErrorKind::AsyncRuleFailed,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self, ValidationRule::Async { .. })
    }

    pub fn is_required(&self) -> bool {
        matches!(self, ValidationRule::Required { .. })
    }

    /// Run the rule without awaiting
    pub fn check(&self, value: &FieldValue, ctx: &ValidationContext) -> RuleOutcome {
        let failure = match self {
            ValidationRule::Required { message } => value.is_empty().then(|| message.clone()),
            ValidationRule::Pattern { regex, message } => {
                if value.is_empty() {
                    None
                } else {
                    let text = value.to_string();
                    (!regex.is_match(&text)).then(|| message.clone())
                }
            }
            ValidationRule::Custom { validator, .. } => validator.validate(value, ctx).err(),
            ValidationRule::Async { .. } => return RuleOutcome::Deferred,
        };

        match failure {
            Some(message) => RuleOutcome::Failed(self.error(value, ctx, message)),
            None => RuleOutcome::Passed,
        }
    }

    /// Run the rule, awaiting it if async
    pub async fn check_async(
        &self,
        value: &FieldValue,
        ctx: &ValidationContext,
    ) -> Result<(), ValidationError> {
        match self {
            ValidationRule::Async { validator, .. } => validator
                .validate_async(value, ctx)
                .await
                .map_err(|message| self.error(value, ctx, message)),
            _ => match self.check(value, ctx) {
                RuleOutcome::Failed(error) => Err(error),
                RuleOutcome::Passed | RuleOutcome::Deferred => Ok(()),
            },
        }
    }

    fn error(&self, value: &FieldValue, ctx: &ValidationContext, message: String) -> ValidationError {
        let error = ValidationError::new(ctx.field().to_string(), message)
            .with_kind(self.kind())
            .with_constraint(self.name());
        if value.is_empty() {
            error
        } else {
            error.with_value(value.to_string())
        }
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Required { message } => {
                f.debug_struct("Required").field("message", message).finish()
            }
            ValidationRule::Pattern { regex, message } => f
                .debug_struct("Pattern")
                .field("regex", &regex.as_str())
                .field("message", message)
                .finish(),
            ValidationRule::Custom { name, .. } => {
                f.debug_struct("Custom").field("name", name).finish()
            }
            ValidationRule::Async { name, .. } => f.debug_struct("Async").field("name", name).finish(),
        }
    }
}

/// Result of running a chain up to its first async rule
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    Valid,
    Invalid(ValidationError),
    /// Rules before `resume_at` passed; the async rule at `resume_at` and
    /// everything after it still have to run
    Suspended { resume_at: usize },
}

/// Ordered rules of one field. The first failing rule ends evaluation.
#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    rules: Vec<ValidationRule>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: ValidationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn has_async(&self) -> bool {
        self.rules.iter().any(ValidationRule::is_async)
    }

    /// Run synchronous rules in order, stopping at the first failure or the
    /// first async rule
    pub fn evaluate_sync(&self, value: &FieldValue, ctx: &ValidationContext) -> ChainOutcome {
        for (index, rule) in self.rules.iter().enumerate() {
            match rule.check(value, ctx) {
                RuleOutcome::Passed => continue,
                RuleOutcome::Failed(error) => return ChainOutcome::Invalid(error),
                RuleOutcome::Deferred => return ChainOutcome::Suspended { resume_at: index },
            }
        }
        ChainOutcome::Valid
    }

    /// Run rules from `start` to the end, awaiting async ones
    pub async fn evaluate_from(
        &self,
        start: usize,
        value: &FieldValue,
        ctx: &ValidationContext,
    ) -> Option<ValidationError> {
        for rule in self.rules.iter().skip(start) {
            if let Err(error) = rule.check_async(value, ctx).await {
                return Some(error);
            }
        }
        None
    }

    /// Run the whole chain
    pub async fn evaluate(&self, value: &FieldValue, ctx: &ValidationContext) -> Option<ValidationError> {
        match self.evaluate_sync(value, ctx) {
            ChainOutcome::Valid => None,
            ChainOutcome::Invalid(error) => Some(error),
            ChainOutcome::Suspended { resume_at } => self.evaluate_from(resume_at, value, ctx).await,
        }
    }

    /// Whether every `Required` rule accepts `value`
    pub fn required_satisfied(&self, value: &FieldValue) -> bool {
        !self
            .rules
            .iter()
            .any(|rule| rule.is_required() && value.is_empty())
    }
}

impl From<Vec<ValidationRule>> for ValidationRules {
    fn from(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formwork_core::{FieldPath, FormValues};

    fn ctx(field: &str) -> ValidationContext {
        ValidationContext::from_values(FieldPath::parse(field).unwrap(), FormValues::new())
    }

    #[test]
    fn test_required() {
        let rule = ValidationRule::required("Username is required");
        let ctx = ctx("username");

        assert_eq!(rule.check(&FieldValue::from("neo"), &ctx), RuleOutcome::Passed);
        match rule.check(&FieldValue::from(""), &ctx) {
            RuleOutcome::Failed(error) => {
                assert_eq!(error.message, "Username is required");
                assert_eq!(error.kind, ValidationErrorKind::RequiredMissing);
                assert_eq!(error.field, "username");
                assert_eq!(error.constraint, "required");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(matches!(rule.check(&FieldValue::Null, &ctx), RuleOutcome::Failed(_)));
    }

    #[test]
    fn test_pattern_skips_empty() {
        let rule = ValidationRule::pattern(r"^\d+$", "digits only").unwrap();
        let ctx = ctx("phone");

        assert_eq!(rule.check(&FieldValue::from(""), &ctx), RuleOutcome::Passed);
        assert_eq!(rule.check(&FieldValue::from("123"), &ctx), RuleOutcome::Passed);
        assert!(matches!(
            rule.check(&FieldValue::from("12a"), &ctx),
            RuleOutcome::Failed(ValidationError { kind: ValidationErrorKind::PatternMismatch, .. })
        ));
    }

    #[test]
    fn test_bad_pattern_is_schema_error() {
        assert!(matches!(
            ValidationRule::pattern("(unclosed", "x"),
            Err(FormError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_first_failure_wins() {
        let rules = ValidationRules::new()
            .add(ValidationRule::required("first"))
            .add(ValidationRule::custom("never", |_: &FieldValue, _: &ValidationContext| -> Result<(), String> {
                Err("second".to_string())
            }));

        match rules.evaluate_sync(&FieldValue::Null, &ctx("f")) {
            ChainOutcome::Invalid(error) => assert_eq!(error.message, "first"),
            other => panic!("unexpected outcome {:?}", other),
        }
        match rules.evaluate_sync(&FieldValue::from("x"), &ctx("f")) {
            ChainOutcome::Invalid(error) => {
                assert_eq!(error.message, "second");
                assert_eq!(error.constraint, "never");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_suspends_at_async_rule() {
        let rules = ValidationRules::new()
            .add(ValidationRule::required("required"))
            .add(ValidationRule::async_fn("available", |_, _| async { Ok(()) }))
            .add(ValidationRule::required("unreachable"));

        assert_eq!(
            rules.evaluate_sync(&FieldValue::from("x"), &ctx("f")),
            ChainOutcome::Suspended { resume_at: 1 }
        );
        assert!(rules.has_async());
    }

    #[tokio::test]
    async fn test_evaluate_runs_async_tail() {
        let rules = ValidationRules::new()
            .add(ValidationRule::async_fn("available", |value: FieldValue, _| async move {
                if value.as_str() == Some("taken") {
                    Err("Email already exists".to_string())
                } else {
                    Ok(())
                }
            }))
            .add(ValidationRule::custom("tail", |value: &FieldValue, _: &ValidationContext| {
                if value.as_str() == Some("bad") {
                    Err("tail failed".to_string())
                } else {
                    Ok(())
                }
            }));

        let taken = rules.evaluate(&FieldValue::from("taken"), &ctx("email")).await.unwrap();
        assert_eq!(taken.kind, ValidationErrorKind::AsyncRuleFailed);
        assert_eq!(taken.message, "Email already exists");

        let bad = rules.evaluate(&FieldValue::from("bad"), &ctx("email")).await.unwrap();
        assert_eq!(bad.message, "tail failed");

        assert!(rules.evaluate(&FieldValue::from("ok"), &ctx("email")).await.is_none());
    }

    #[test]
    fn test_required_satisfied() {
        let rules = ValidationRules::new().add(ValidationRule::required("Age is required"));
        assert!(!rules.required_satisfied(&FieldValue::Null));
        assert!(rules.required_satisfied(&FieldValue::Number(0.0)));
        assert!(ValidationRules::new().required_satisfied(&FieldValue::Null));
    }
}
