use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

/// One stored object: field name to JSON value.
pub type Record = Map<String, Value>;

/// Fields managed by the storage engine; client input never sets these
/// directly (`_ownerId` is pre-set by the CRUD layer before `add`).
pub const SYSTEM_FIELDS: &[&str] = &["_id", "_createdOn", "_updatedOn", "_ownerId"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Collection does not exist: {0}")]
    MissingCollection(String),

    #[error("Entry does not exist: {0}")]
    MissingEntry(String),

    #[error("{0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// In-memory, collection-keyed record store.
///
/// Every value returned to a caller is a fresh deep copy (`Record::clone`),
/// so callers can never alias or mutate internal state. Each operation holds
/// the write lock for its full duration, which keeps check-then-act
/// sequences (unique-id generation, replace-after-fetch) atomic.
pub struct Store {
    collections: RwLock<BTreeMap<String, BTreeMap<String, Record>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Populate one collection from seed data shaped as `{id: record}`.
    /// Non-object entries are skipped.
    pub fn load_seed(&self, collection_name: &str, entries: &Value) {
        let mut collections = self.collections.write();
        let collection = collections.entry(collection_name.to_string()).or_default();
        if let Value::Object(entries) = entries {
            for (id, record) in entries {
                if let Value::Object(record) = record {
                    collection.insert(id.clone(), record.clone());
                }
            }
        }
    }

    /// Sorted list of existing collection names.
    pub fn collections(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// All records in a collection, each annotated with its `_id`.
    pub fn list(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        Ok(target
            .iter()
            .map(|(id, record)| annotate(record, id))
            .collect())
    }

    /// Single-record fetch by id.
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        let record = target
            .get(id)
            .ok_or_else(|| StoreError::MissingEntry(id.to_string()))?;
        Ok(annotate(record, id))
    }

    /// Create a record; the collection is created on demand. Client-supplied
    /// system fields are stripped, except a pre-set `_ownerId`. The generated
    /// id is regenerated on (unlikely) collision.
    pub fn add(&self, collection: &str, data: &Record) -> StoreResult<Record> {
        let mut record = Record::new();
        if let Some(owner) = data.get("_ownerId") {
            record.insert("_ownerId".to_string(), owner.clone());
        }
        assign_clean(&mut record, data);
        record.insert("_createdOn".to_string(), Value::from(now_millis()));

        let mut collections = self.collections.write();
        let target = collections.entry(collection.to_string()).or_default();
        let mut id = Uuid::new_v4().to_string();
        while target.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        target.insert(id.clone(), record.clone());
        Ok(annotate(&record, &id))
    }

    /// Full replace. System fields come from the existing record, never from
    /// the caller's payload; `_updatedOn` is stamped fresh.
    pub fn set(&self, collection: &str, id: &str, data: &Record) -> StoreResult<Record> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        let existing = target
            .get(id)
            .ok_or_else(|| StoreError::MissingEntry(id.to_string()))?;

        let mut record = Record::new();
        assign_clean(&mut record, data);
        assign_system(&mut record, existing);
        record.insert("_updatedOn".to_string(), Value::from(now_millis()));
        target.insert(id.to_string(), record.clone());
        Ok(annotate(&record, id))
    }

    /// Shallow merge of non-system fields into the existing record.
    pub fn merge(&self, collection: &str, id: &str, data: &Record) -> StoreResult<Record> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        let existing = target
            .get(id)
            .ok_or_else(|| StoreError::MissingEntry(id.to_string()))?;

        let mut record = existing.clone();
        assign_clean(&mut record, data);
        record.insert("_updatedOn".to_string(), Value::from(now_millis()));
        target.insert(id.to_string(), record.clone());
        Ok(annotate(&record, id))
    }

    /// Unconditional removal; returns the deletion timestamp.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let mut collections = self.collections.write();
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;
        if target.remove(id).is_none() {
            return Err(StoreError::MissingEntry(id.to_string()));
        }
        let mut result = Record::new();
        result.insert("_deletedOn".to_string(), Value::from(now_millis()));
        Ok(result)
    }

    /// Linear scan; every key of `query` must equal the record's field,
    /// case-insensitively when both sides are strings.
    pub fn query(&self, collection: &str, query: &Record) -> StoreResult<Vec<Record>> {
        let collections = self.collections.read();
        let target = collections
            .get(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;

        let mut result = Vec::new();
        for (id, record) in target.iter() {
            let matches = query.iter().all(|(prop, wanted)| {
                match (record.get(prop), wanted) {
                    (Some(Value::String(have)), Value::String(want)) => {
                        have.to_lowercase() == want.to_lowercase()
                    }
                    (Some(have), want) => have == want,
                    (None, _) => false,
                }
            });
            if matches {
                result.push(annotate(record, id));
            }
        }
        Ok(result)
    }
}

/// Copy of `record` with `_id` set to the collection key.
fn annotate(record: &Record, id: &str) -> Record {
    let mut copy = record.clone();
    copy.insert("_id".to_string(), Value::from(id));
    copy
}

/// Copy every non-system field of `source` into `target` (deep copies).
fn assign_clean(target: &mut Record, source: &Record) {
    for (key, value) in source {
        if !SYSTEM_FIELDS.contains(&key.as_str()) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Copy the system fields the existing record carries into `target`.
fn assign_system(target: &mut Record, existing: &Record) {
    for field in SYSTEM_FIELDS {
        if let Some(value) = existing.get(*field) {
            target.insert(field.to_string(), value.clone());
        } else {
            target.remove(*field);
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
