//! Form schema: declared fields, defaults, value kinds and rules

use formwork_core::{FieldPath, FieldValue, FormError, FormResult, FormValues, ValueKind};
use formwork_validation::{AsyncValidator, ValidationContext, ValidationRule, ValidationRules, Validator};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Predicate over current values deciding whether a field is disabled
pub type DisabledPredicate = Arc<dyn Fn(&FormValues) -> bool + Send + Sync>;

/// Builder for one field declaration
///
/// ```
/// use formwork_form::Field;
///
/// let username = Field::text("username").required("Username is required");
/// let age = Field::number("age").default_value(0).required("Age is required");
/// ```
#[derive(Clone)]
pub struct Field {
    name: String,
    kind: ValueKind,
    default: FieldValue,
    rules: ValidationRules,
    disabled_when: Option<DisabledPredicate>,
    invalid: Option<FormError>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let default = match kind {
            ValueKind::Text => FieldValue::Text(String::new()),
            ValueKind::Bool => FieldValue::Bool(false),
            ValueKind::Number | ValueKind::Date => FieldValue::Null,
        };
        Self {
            name: name.into(),
            kind,
            default,
            rules: ValidationRules::new(),
            disabled_when: None,
            invalid: None,
        }
    }

    /// Text input, default `""`
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Text)
    }

    /// Numeric input, default empty
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Number)
    }

    /// Date input, default empty
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Date)
    }

    /// Checkbox, default unchecked
    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Bool)
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = self.kind.conform(value.into());
        self
    }

    pub fn required(self, message: impl Into<String>) -> Self {
        self.rule(ValidationRule::required(message))
    }

    /// Pattern rule; a bad expression fails schema build
    pub fn pattern(mut self, pattern: &str, message: impl Into<String>) -> Self {
        match ValidationRule::pattern(pattern, message) {
            Ok(rule) => self.rules.push(rule),
            Err(err) => {
                self.invalid.get_or_insert(err);
            }
        }
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Named synchronous rule
    pub fn validate<V>(self, name: impl Into<String>, validator: V) -> Self
    where
        V: Validator + 'static,
    {
        self.rule(ValidationRule::custom(name, validator))
    }

    /// Named async rule from a closure returning a future
    pub fn validate_async<F, Fut>(self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(FieldValue, ValidationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.rule(ValidationRule::async_fn(name, check))
    }

    /// Named async rule from an [`AsyncValidator`]
    pub fn validate_with<V>(self, name: impl Into<String>, validator: V) -> Self
    where
        V: AsyncValidator + 'static,
    {
        self.rule(ValidationRule::async_rule(name, validator))
    }

    pub fn disabled_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&FormValues) -> bool + Send + Sync + 'static,
    {
        self.disabled_when = Some(Arc::new(predicate));
        self
    }
}

/// Builder for an array field whose entries share item fields
///
/// ```
/// use formwork_form::{Field, FieldArrayDef};
///
/// let phones = FieldArrayDef::new("phNumbers").item(Field::text("number"));
/// ```
#[derive(Clone)]
pub struct FieldArrayDef {
    name: String,
    items: Vec<Field>,
    default_len: usize,
}

impl FieldArrayDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            default_len: 1,
        }
    }

    /// Add an item field; its name is relative to the entry
    pub fn item(mut self, field: Field) -> Self {
        self.items.push(field);
        self
    }

    /// Entries present in the default values
    pub fn default_len(mut self, len: usize) -> Self {
        self.default_len = len;
        self
    }
}

/// A resolved field declaration
pub struct FieldDef {
    template: String,
    kind: ValueKind,
    default: FieldValue,
    rules: ValidationRules,
    disabled_when: Option<DisabledPredicate>,
    array: Option<FieldPath>,
    relative: FieldPath,
}

impl FieldDef {
    /// Path with array indices replaced by `*`
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_value(&self) -> &FieldValue {
        &self.default
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Array this field is an item of
    pub fn array(&self) -> Option<&FieldPath> {
        self.array.as_ref()
    }

    /// Path relative to the array entry, or the full path for plain fields
    pub fn relative(&self) -> &FieldPath {
        &self.relative
    }

    pub fn is_disabled(&self, values: &FormValues) -> bool {
        self.disabled_when
            .as_ref()
            .is_some_and(|predicate| predicate(values))
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("template", &self.template)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("rules", &self.rules)
            .field("conditionally_disabled", &self.disabled_when.is_some())
            .finish()
    }
}

/// A resolved array declaration
#[derive(Debug)]
pub struct ArrayDef {
    path: FieldPath,
    items: Vec<Arc<FieldDef>>,
    default_len: usize,
}

impl ArrayDef {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn items(&self) -> &[Arc<FieldDef>] {
        &self.items
    }

    pub fn default_len(&self) -> usize {
        self.default_len
    }

    /// Item declaration for a path relative to an entry
    pub fn item(&self, relative: &FieldPath) -> Option<&Arc<FieldDef>> {
        self.items.iter().find(|def| &def.relative == relative)
    }

    /// Default record for a new entry, relative to the entry
    pub fn default_entry(&self) -> FormValues {
        self.items
            .iter()
            .map(|def| (def.relative.clone(), def.default.clone()))
            .collect()
    }
}

/// Fixed set of fields and array fields a form store manages
#[derive(Debug)]
pub struct FormSchema {
    fields: Vec<Arc<FieldDef>>,
    arrays: Vec<ArrayDef>,
    by_template: HashMap<String, Arc<FieldDef>>,
}

impl FormSchema {
    pub fn builder() -> FormSchemaBuilder {
        FormSchemaBuilder::default()
    }

    /// Plain (non-array) fields in declaration order
    pub fn fields(&self) -> &[Arc<FieldDef>] {
        &self.fields
    }

    pub fn arrays(&self) -> &[ArrayDef] {
        &self.arrays
    }

    pub fn array(&self, path: &FieldPath) -> Option<&ArrayDef> {
        self.arrays.iter().find(|array| &array.path == path)
    }

    /// Declaration matching a concrete leaf path, ignoring array bounds
    pub fn field(&self, path: &FieldPath) -> Option<&Arc<FieldDef>> {
        self.by_template.get(&path.template())
    }

    /// Array containing `path`, with the entry index
    pub fn array_entry(&self, path: &FieldPath) -> Option<(&ArrayDef, usize)> {
        self.arrays.iter().find_map(|array| {
            if path.len() > array.path.len() && path.starts_with(&array.path) {
                path.index_at(array.path.len()).map(|index| (array, index))
            } else {
                None
            }
        })
    }

    /// Values the form starts with
    pub fn default_values(&self) -> FormValues {
        let mut values = FormValues::new();
        for def in &self.fields {
            values.insert(def.relative.clone(), def.default.clone());
        }
        for array in &self.arrays {
            for index in 0..array.default_len {
                let entry = array.path.index(index);
                for def in &array.items {
                    values.insert(entry.join(&def.relative), def.default.clone());
                }
            }
        }
        values
    }
}

/// Collects declarations and checks them on [`build`](FormSchemaBuilder::build)
#[derive(Default)]
pub struct FormSchemaBuilder {
    fields: Vec<Field>,
    arrays: Vec<FieldArrayDef>,
}

impl FormSchemaBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn array(mut self, array: FieldArrayDef) -> Self {
        self.arrays.push(array);
        self
    }

    pub fn build(self) -> FormResult<FormSchema> {
        let mut fields = Vec::new();
        let mut arrays = Vec::new();
        let mut by_template: HashMap<String, Arc<FieldDef>> = HashMap::new();
        let mut declared: Vec<FieldPath> = Vec::new();

        for field in self.fields {
            let path = parse_named(&field.name)?;
            let def = Arc::new(resolve(field, path.clone(), None)?);
            claim(&mut declared, path)?;
            by_template.insert(def.template.clone(), def.clone());
            fields.push(def);
        }

        for array in self.arrays {
            let path = parse_named(&array.name)?;
            if array.items.is_empty() {
                return Err(FormError::InvalidSchema(format!(
                    "array {} declares no item fields",
                    path
                )));
            }
            claim(&mut declared, path.clone())?;

            let mut items: Vec<Arc<FieldDef>> = Vec::new();
            for item in array.items {
                let relative = parse_named(&item.name)?;
                if items.iter().any(|def| {
                    def.relative.starts_with(&relative) || relative.starts_with(&def.relative)
                }) {
                    return Err(FormError::InvalidSchema(format!(
                        "duplicate item field {} in array {}",
                        relative, path
                    )));
                }
                let def = Arc::new(resolve(item, relative, Some(path.clone()))?);
                by_template.insert(def.template.clone(), def.clone());
                items.push(def);
            }

            arrays.push(ArrayDef {
                path,
                items,
                default_len: array.default_len,
            });
        }

        Ok(FormSchema {
            fields,
            arrays,
            by_template,
        })
    }
}

/// Field and array names are plain dotted keys without indices
fn parse_named(name: &str) -> FormResult<FieldPath> {
    let path = FieldPath::parse(name)?;
    if path.template().contains('*') {
        return Err(FormError::InvalidSchema(format!(
            "{} must not contain array indices",
            name
        )));
    }
    Ok(path)
}

/// Record a declared path, rejecting duplicates and paths nested in each other
fn claim(declared: &mut Vec<FieldPath>, path: FieldPath) -> FormResult<()> {
    if let Some(existing) = declared
        .iter()
        .find(|other| other.starts_with(&path) || path.starts_with(other))
    {
        return Err(FormError::InvalidSchema(if *existing == path {
            format!("duplicate field {}", path)
        } else {
            format!("{} overlaps {}", path, existing)
        }));
    }
    declared.push(path);
    Ok(())
}

fn resolve(field: Field, relative: FieldPath, array: Option<FieldPath>) -> FormResult<FieldDef> {
    if let Some(err) = field.invalid {
        return Err(err);
    }
    let template = match &array {
        Some(array) => format!("{}.*.{}", array, relative),
        None => relative.to_string(),
    };
    Ok(FieldDef {
        template,
        kind: field.kind,
        default: field.default,
        rules: field.rules,
        disabled_when: field.disabled_when,
        array,
        relative,
    })
}
