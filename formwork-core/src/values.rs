//! Flat snapshot of form values keyed by field path

use crate::{FieldPath, FieldValue, FormError, FormResult, Segment};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Leaf values of a form, ordered by path.
///
/// Nested JSON such as `{"social": {"twitter": ""}, "phNumbers": [{"number": ""}]}`
/// is stored flat as `social.twitter` and `phNumbers.0.number`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    entries: BTreeMap<FieldPath, FieldValue>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a nested JSON object
    pub fn from_json(value: &serde_json::Value) -> FormResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            FormError::InvalidValue("form values must be a JSON object".to_string())
        })?;

        let mut values = Self::new();
        for (key, child) in object {
            let path = FieldPath::from_segments(vec![Segment::Key(key.clone())]);
            flatten_into(&mut values, path, child)?;
        }
        Ok(values)
    }

    /// Rebuild the nested JSON form
    pub fn to_json(&self) -> serde_json::Value {
        let mut root = serde_json::Value::Object(serde_json::Map::new());
        for (path, value) in &self.entries {
            insert_nested(&mut root, path.segments(), value.to_json());
        }
        root
    }

    /// Insert or replace a value
    pub fn insert(&mut self, path: FieldPath, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.entries.insert(path, value.into())
    }

    /// Builder style insert from a dotted path
    pub fn with(mut self, path: &str, value: impl Into<FieldValue>) -> FormResult<Self> {
        self.insert(FieldPath::parse(path)?, value);
        Ok(self)
    }

    pub fn remove(&mut self, path: &FieldPath) -> Option<FieldValue> {
        self.entries.remove(path)
    }

    /// Value at a dotted path
    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        FieldPath::parse(path)
            .ok()
            .and_then(|path| self.entries.get(&path))
    }

    pub fn get_path(&self, path: &FieldPath) -> Option<&FieldValue> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &FieldValue)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.entries.keys()
    }

    /// Values below `prefix`, with paths made relative to it
    pub fn subtree(&self, prefix: &FieldPath) -> FormValues {
        self.entries
            .iter()
            .filter_map(|(path, value)| {
                path.strip_prefix(prefix)
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest, value.clone()))
            })
            .collect()
    }

    /// Remove every value below `prefix`
    pub fn remove_subtree(&mut self, prefix: &FieldPath) {
        self.entries.retain(|path, _| !path.starts_with(prefix));
    }

    /// Number of entries of the array at `path`, derived from the indices present
    pub fn array_len(&self, path: &FieldPath) -> usize {
        let depth = path.len();
        self.entries
            .keys()
            .filter(|key| key.starts_with(path))
            .filter_map(|key| key.index_at(depth))
            .map(|index| index + 1)
            .max()
            .unwrap_or(0)
    }
}

impl FromIterator<(FieldPath, FieldValue)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (FieldPath, FieldValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FormValues {
    type Item = (FieldPath, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<FieldPath, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for FormValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn flatten_into(
    values: &mut FormValues,
    path: FieldPath,
    value: &serde_json::Value,
) -> FormResult<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                flatten_into(values, path.child(key.clone()), child)?;
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(values, path.index(index), child)?;
            }
        }
        scalar => {
            values.insert(path, FieldValue::from_json(scalar)?);
        }
    }
    Ok(())
}

fn insert_nested(node: &mut serde_json::Value, segments: &[Segment], leaf: serde_json::Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = leaf;
        return;
    };

    match head {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = serde_json::Value::Object(serde_json::Map::new());
            }
            if let Some(map) = node.as_object_mut() {
                let child = map.entry(key.clone()).or_insert(serde_json::Value::Null);
                insert_nested(child, rest, leaf);
            }
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = serde_json::Value::Array(Vec::new());
            }
            if let Some(items) = node.as_array_mut() {
                if items.len() <= *index {
                    items.resize(*index + 1, serde_json::Value::Null);
                }
                insert_nested(&mut items[*index], rest, leaf);
            }
        }
    }
}
