//! Field values and input coercion

use crate::{FormError, FormResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format used for date inputs and their JSON form
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Value held by a single form field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value
    #[default]
    Null,
    /// Text input
    Text(String),
    /// Numeric input
    Number(f64),
    /// Checkbox style input
    Bool(bool),
    /// Calendar date
    Date(NaiveDate),
}

impl FieldValue {
    /// Whether the value counts as missing for `required` checks
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Number(n) => n.is_nan(),
            FieldValue::Bool(_) | FieldValue::Date(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Convert to JSON; dates become `YYYY-MM-DD` strings
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Text(text) => serde_json::Value::String(text.clone()),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Date(date) => {
                serde_json::Value::String(date.format(DATE_FORMAT).to_string())
            }
        }
    }

    /// Convert a scalar JSON value. Objects and arrays are not leaf values.
    pub fn from_json(value: &serde_json::Value) -> FormResult<Self> {
        match value {
            serde_json::Value::Null => Ok(FieldValue::Null),
            serde_json::Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| FormError::InvalidValue(n.to_string())),
            serde_json::Value::String(s) => Ok(FieldValue::Text(s.clone())),
            other => Err(FormError::InvalidValue(format!(
                "expected a scalar, found {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// How raw input text is turned into a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Keep the text as entered
    #[default]
    Text,
    /// Parse as a number; empty or malformed input becomes `Null`
    Number,
    /// Parse as `YYYY-MM-DD`; empty or malformed input becomes `Null`
    Date,
    /// `true`/`on`/`1` are checked, everything else unchecked
    Bool,
}

impl ValueKind {
    /// Coerce raw input text
    pub fn coerce(&self, raw: &str) -> FieldValue {
        match self {
            ValueKind::Text => FieldValue::Text(raw.to_string()),
            ValueKind::Number => {
                let trimmed = raw.trim();
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => FieldValue::Number(n),
                    _ => FieldValue::Null,
                }
            }
            ValueKind::Date => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
                .map(FieldValue::Date)
                .unwrap_or(FieldValue::Null),
            ValueKind::Bool => FieldValue::Bool(matches!(
                raw.trim().to_lowercase().as_str(),
                "true" | "on" | "1" | "yes"
            )),
        }
    }

    /// Bring an already typed value in line with this kind.
    ///
    /// Text is coerced; values already of the right kind and `Null` are kept.
    /// Non-finite numbers become `Null`, as they do when parsed from text.
    pub fn conform(&self, value: FieldValue) -> FieldValue {
        match (self, value) {
            (_, FieldValue::Number(n)) if !n.is_finite() => FieldValue::Null,
            (ValueKind::Text, FieldValue::Number(n)) => FieldValue::Text(n.to_string()),
            (ValueKind::Text, value) => value,
            (kind, FieldValue::Text(text)) => kind.coerce(&text),
            (_, value) => value,
        }
    }
}
