use std::{collections::BTreeMap, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    cache::fingerprint::CallFingerprint,
    runtime::{
        digest::{Digest, hash_file_or_missing},
        effects::EffectFootprint,
        value::Value,
    },
};

/// A committed call result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: CallFingerprint,
    pub value: Value,
    pub footprint: EffectFootprint,
}

impl CacheEntry {
    /// Content hashes of the files the call wrote.
    pub fn files_written(&self) -> &BTreeMap<PathBuf, Digest> {
        &self.footprint.files_written
    }

    /// Whether every file the call wrote still has the content it wrote.
    pub fn outputs_intact(&self, root: &Path) -> bool {
        self.files_written().iter().all(|(path, expected)| {
            matches!(hash_file_or_missing(&root.join(path)), Ok(actual) if actual == *expected)
        })
    }
}

/// The persisted form of a result value. Functions have no stable
/// representation, so results containing them stay in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum StoredValue {
    Int(i64),
    String(String),
    Bool(bool),
    List(Vec<StoredValue>),
    Unit,
}

impl StoredValue {
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(match value {
            Value::Int(n) => StoredValue::Int(*n),
            Value::String(s) => StoredValue::String(s.to_string()),
            Value::Bool(b) => StoredValue::Bool(*b),
            Value::List(items) => StoredValue::List(
                items
                    .iter()
                    .map(StoredValue::from_value)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Function(_) => return None,
            Value::Unit => StoredValue::Unit,
        })
    }

    pub fn into_value(self) -> Value {
        match self {
            StoredValue::Int(n) => Value::Int(n),
            StoredValue::String(s) => Value::from(s),
            StoredValue::Bool(b) => Value::Bool(b),
            StoredValue::List(items) => {
                Value::list(items.into_iter().map(StoredValue::into_value).collect())
            }
            StoredValue::Unit => Value::Unit,
        }
    }
}

/// One entry file on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub fingerprint: CallFingerprint,
    pub value: StoredValue,
    pub footprint: EffectFootprint,
}

impl EntryRecord {
    pub fn from_entry(entry: &CacheEntry) -> Option<Self> {
        Some(Self {
            fingerprint: entry.fingerprint.clone(),
            value: StoredValue::from_value(&entry.value)?,
            footprint: entry.footprint.clone(),
        })
    }

    pub fn into_entry(self) -> CacheEntry {
        CacheEntry {
            fingerprint: self.fingerprint,
            value: self.value.into_value(),
            footprint: self.footprint,
        }
    }
}
