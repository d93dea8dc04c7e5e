// Built-in validators

use crate::{ValidationContext, ValidationRule, Validator};
use formwork_core::FieldValue;
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*$").unwrap()
});

/// Pattern rule accepting email addresses
pub fn email(message: impl Into<String>) -> ValidationRule {
    ValidationRule::pattern_regex(EMAIL_REGEX.clone(), message)
}

/// Whether `value` looks like an email address
pub fn is_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Rejects one specific value
pub struct NotEqual {
    value: String,
    message: Option<String>,
}

impl NotEqual {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for NotEqual {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        if value.as_str() == Some(self.value.as_str()) {
            Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} must not be {}", ctx.field(), self.value)))
        } else {
            Ok(())
        }
    }
}

/// Rejects text ending with a suffix, e.g. a blocked domain
pub struct NotEndsWith {
    suffix: String,
    message: Option<String>,
}

impl NotEndsWith {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for NotEndsWith {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        match value.as_str() {
            Some(text) if text.ends_with(&self.suffix) => Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} must not end with {}", ctx.field(), self.suffix))),
            _ => Ok(()),
        }
    }
}

/// Requires the value to equal another field's current value
pub struct MatchesField {
    other: String,
    message: Option<String>,
}

impl MatchesField {
    pub fn new(other: impl Into<String>) -> Self {
        Self {
            other: other.into(),
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for MatchesField {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        let other = ctx.value_of(&self.other).unwrap_or_default();
        if *value == other {
            Ok(())
        } else {
            Err(self
                .message
                .clone()
                .unwrap_or_else(|| format!("{} must match {}", ctx.field(), self.other)))
        }
    }
}

/// Validates minimum text length
pub struct MinLength(pub usize);

impl Validator for MinLength {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        match value.as_str() {
            Some(text) if text.chars().count() < self.0 => Err(format!(
                "{} must be at least {} characters",
                ctx.field(),
                self.0
            )),
            _ => Ok(()),
        }
    }
}

/// Validates maximum text length
pub struct MaxLength(pub usize);

impl Validator for MaxLength {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        match value.as_str() {
            Some(text) if text.chars().count() > self.0 => Err(format!(
                "{} must be at most {} characters",
                ctx.field(),
                self.0
            )),
            _ => Ok(()),
        }
    }
}

/// Validates minimum numeric value
pub struct Min(pub f64);

impl Validator for Min {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        match value.as_number() {
            Some(n) if n < self.0 => Err(format!("{} must be at least {}", ctx.field(), self.0)),
            _ => Ok(()),
        }
    }
}

/// Validates maximum numeric value
pub struct Max(pub f64);

impl Validator for Max {
    fn validate(&self, value: &FieldValue, ctx: &ValidationContext) -> Result<(), String> {
        match value.as_number() {
            Some(n) if n > self.0 => Err(format!("{} must be at most {}", ctx.field(), self.0)),
            _ => Ok(()),
        }
    }
}
