//! Dynamic array fields with stable entry identities

use crate::store::FormStore;
use crate::subscription::{ChangeKind, FormChange};
use formwork_core::{FieldPath, FormError, FormResult, FormValues};
use formwork_log::targets;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identity of an array entry, generated on insertion and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of an array field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArrayEntry {
    pub id: EntryId,
    pub index: usize,
    /// Entry values with paths relative to the entry (`number`, not
    /// `phNumbers.0.number`)
    pub value: FormValues,
}

/// Controller for one array field of a store
///
/// ```
/// use formwork_form::{Field, FieldArrayDef, FormSchema, FormStore};
/// use formwork_core::FormValues;
///
/// let schema = FormSchema::builder()
///     .array(FieldArrayDef::new("phNumbers").item(Field::text("number")))
///     .build()
///     .unwrap();
/// let store = FormStore::new(schema);
/// let phones = store.field_array("phNumbers").unwrap();
///
/// phones.append(FormValues::new().with("number", "555-0100").unwrap()).unwrap();
/// assert_eq!(phones.len(), 2);
///
/// phones.remove(0).unwrap();
/// assert!(phones.remove(0).is_err());
/// ```
#[derive(Clone)]
pub struct FieldArray {
    store: FormStore,
    path: FieldPath,
}

impl FieldArray {
    pub(crate) fn new(store: FormStore, path: FieldPath) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Entries in order
    pub fn fields(&self) -> Vec<FieldArrayEntry> {
        let state = self.store.inner.state.read();
        state
            .arrays
            .get(&self.path)
            .map(|ids| {
                ids.iter()
                    .enumerate()
                    .map(|(index, id)| FieldArrayEntry {
                        id: *id,
                        index,
                        value: state.values.subtree(&self.path.index(index)),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entry ids in order
    pub fn ids(&self) -> Vec<EntryId> {
        self.store
            .inner
            .state
            .read()
            .arrays
            .get(&self.path)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.store.inner.state.read().array_len(&self.path)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add an entry at the end.
    ///
    /// `record` holds values relative to the entry; item fields it leaves
    /// out get their defaults. Other entries are not validated.
    pub fn append(&self, record: FormValues) -> FormResult<EntryId> {
        let schema = self.store.schema();
        let array = schema
            .array(&self.path)
            .ok_or_else(|| FormError::UnknownField(self.path.to_string()))?;

        let mut entry = array.default_entry();
        for (relative, value) in record {
            let def = array
                .item(&relative)
                .ok_or_else(|| FormError::UnknownField(format!("{}.*.{}", self.path, relative)))?;
            entry.insert(relative, def.kind().conform(value));
        }

        let min = self.store.config().min_array_entries;
        let (index, id, values) = {
            let mut state = self.store.inner.state.write();
            let index = state.array_len(&self.path);
            let base = self.path.index(index);

            for (relative, value) in entry {
                let path = base.join(&relative);
                let dirty = state.baseline.get_path(&path) != Some(&value);
                state.values.insert(path.clone(), value);
                if dirty {
                    state.meta.entry(path).or_default().dirty = true;
                }
            }

            let id = EntryId::new();
            state.arrays.entry(self.path.clone()).or_default().push(id);

            if index + 1 >= min {
                if let Some(meta) = state.meta.get_mut(&self.path) {
                    meta.error = None;
                }
            }
            (index, id, state.values.clone())
        };

        formwork_log::debug!(target: targets::ARRAY, "appended {} at {}[{}]", id, self.path, index);
        self.store.notify(FormChange {
            path: Some(self.path.clone()),
            kind: ChangeKind::ArrayAppend { index },
            values,
        });
        Ok(id)
    }

    /// Append from a JSON object such as `{"number": ""}`
    pub fn append_json(&self, record: &serde_json::Value) -> FormResult<EntryId> {
        self.append(FormValues::from_json(record)?)
    }

    /// Remove the entry at `index`.
    ///
    /// Later entries move down by one and carry their dirty, touched and
    /// error state with them; their in-flight validations are restarted at
    /// the new position. Removing when only the configured minimum remains
    /// does nothing and returns [`FormError::ArrayMinimum`].
    pub fn remove(&self, index: usize) -> FormResult<()> {
        let min = self.store.config().min_array_entries;
        let depth = self.path.len();

        let (values, restart) = {
            let mut state = self.store.inner.state.write();
            let len = state.array_len(&self.path);
            if index >= len {
                return Err(FormError::IndexOutOfRange {
                    path: self.path.to_string(),
                    index,
                    len,
                });
            }
            if len <= min {
                drop(state);
                formwork_log::warn!(
                    target: targets::ARRAY,
                    "refusing to remove {}[{}]: at least {} entries required",
                    self.path,
                    index,
                    min
                );
                return Err(FormError::ArrayMinimum {
                    path: self.path.to_string(),
                    min,
                });
            }

            let values = std::mem::take(&mut state.values);
            state.values = values
                .into_iter()
                .filter_map(|(path, value)| {
                    match entry_index(&self.path, depth, &path) {
                        Some(i) if i == index => None,
                        Some(i) if i > index => Some((path.with_index_at(depth, i - 1), value)),
                        _ => Some((path, value)),
                    }
                })
                .collect();

            let mut restart = Vec::new();
            let mut meta = BTreeMap::new();
            for (path, mut field) in std::mem::take(&mut state.meta) {
                match entry_index(&self.path, depth, &path) {
                    // Dropped with its token; late results for it are stale
                    Some(i) if i == index => {}
                    Some(i) if i > index => {
                        let moved = path.with_index_at(depth, i - 1);
                        field.token = state.next_token();
                        if field.pending {
                            field.pending = false;
                            restart.push(moved.clone());
                        }
                        if let Some(error) = field.error.as_mut() {
                            error.field = moved.to_string();
                        }
                        meta.insert(moved, field);
                    }
                    _ => {
                        meta.insert(path, field);
                    }
                }
            }
            state.meta = meta;

            let items: Vec<FieldPath> = state
                .values
                .paths()
                .filter(|path| path.starts_with(&self.path))
                .cloned()
                .collect();
            for path in items {
                let dirty = state.baseline.get_path(&path) != state.values.get_path(&path);
                if dirty || state.meta.contains_key(&path) {
                    state.meta.entry(path).or_default().dirty = dirty;
                }
            }

            if let Some(ids) = state.arrays.get_mut(&self.path) {
                let id = ids.remove(index);
                formwork_log::debug!(target: targets::ARRAY, "removed {} from {}[{}]", id, self.path, index);
            }
            (state.values.clone(), restart)
        };

        self.store.notify(FormChange {
            path: Some(self.path.clone()),
            kind: ChangeKind::ArrayRemove { index },
            values,
        });

        let engine = self.store.engine();
        for path in restart {
            engine.validate_path(&path)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FieldArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArray")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

/// Entry index of `path` within the array at `array`, if it lies inside it
fn entry_index(array: &FieldPath, depth: usize, path: &FieldPath) -> Option<usize> {
    if path.len() > depth && path.starts_with(array) {
        path.index_at(depth)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldArrayDef, FormSchema};
    use crate::store::SetValueOptions;
    use formwork_config::FormConfig;
    use formwork_core::FieldValue;

    fn store_with(config: FormConfig) -> FormStore {
        let schema = FormSchema::builder()
            .field(Field::text("username"))
            .array(
                FieldArrayDef::new("phNumbers")
                    .item(Field::text("number").required("Phone number is required"))
                    .item(Field::text("label").default_value("mobile")),
            )
            .build()
            .unwrap();
        FormStore::with_config(schema, config)
    }

    fn store() -> FormStore {
        store_with(FormConfig::default())
    }

    fn number(store: &FormStore, index: usize) -> Option<FieldValue> {
        store.get_value(&format!("phNumbers.{}.number", index))
    }

    #[test]
    fn test_append_fills_defaults() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();

        let id = phones
            .append(FormValues::new().with("number", "555").unwrap())
            .unwrap();

        let fields = phones.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].id, id);
        assert_eq!(fields[1].index, 1);
        assert_eq!(fields[1].value.get("number"), Some(&FieldValue::from("555")));
        assert_eq!(fields[1].value.get("label"), Some(&FieldValue::from("mobile")));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_append_rejects_unknown_item() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        let result = phones.append(FormValues::new().with("extension", "12").unwrap());

        assert!(matches!(result, Err(FormError::UnknownField(_))));
        assert_eq!(phones.len(), 1);
    }

    #[test]
    fn test_append_json() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        phones
            .append_json(&serde_json::json!({ "number": "" }))
            .unwrap();
        assert_eq!(phones.len(), 2);
    }

    #[test]
    fn test_remove_keeps_other_ids() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        phones.append(FormValues::new()).unwrap();
        phones.append(FormValues::new()).unwrap();

        let before = phones.ids();
        phones.remove(1).unwrap();
        assert_eq!(phones.ids(), vec![before[0], before[2]]);
    }

    #[test]
    fn test_remove_shifts_values_and_state() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        phones.append(FormValues::new().with("number", "b").unwrap()).unwrap();
        phones.append(FormValues::new().with("number", "c").unwrap()).unwrap();

        store
            .set_value("phNumbers.2.number", "", SetValueOptions::all())
            .unwrap();
        assert!(store.error("phNumbers.2.number").is_some());

        phones.remove(1).unwrap();

        assert_eq!(phones.len(), 2);
        assert_eq!(number(&store, 1), Some(FieldValue::from("")));
        assert_eq!(number(&store, 2), None);

        let moved = store.field_state("phNumbers.1.number").unwrap();
        assert!(moved.is_touched);
        assert_eq!(moved.error.unwrap().field, "phNumbers.1.number");
        assert!(store.error("phNumbers.2.number").is_none());
    }

    #[test]
    fn test_remove_sole_entry_is_noop() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        let ids = phones.ids();

        assert!(matches!(
            phones.remove(0),
            Err(FormError::ArrayMinimum { min: 1, .. })
        ));
        assert_eq!(phones.ids(), ids);
        assert_eq!(number(&store, 0), Some(FieldValue::from("")));
    }

    #[test]
    fn test_remove_out_of_range() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        assert!(matches!(
            phones.remove(4),
            Err(FormError::IndexOutOfRange { index: 4, len: 1, .. })
        ));
    }

    #[test]
    fn test_zero_minimum_allows_empty() {
        let config = FormConfig::builder().min_array_entries(0).build().unwrap();
        let store = store_with(config);
        let phones = store.field_array("phNumbers").unwrap();

        phones.remove(0).unwrap();
        assert!(phones.is_empty());
        assert!(store.is_dirty());
    }

    #[test]
    fn test_append_then_remove_restores_ids() {
        let store = store();
        let phones = store.field_array("phNumbers").unwrap();
        let before = phones.ids();

        phones.append(FormValues::new()).unwrap();
        phones.remove(1).unwrap();

        assert_eq!(phones.ids(), before);
        assert!(!store.is_dirty());
    }
}
