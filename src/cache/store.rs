use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    cache::{CacheError, entry::EntryRecord, fingerprint::FunctionId, shape::FootprintShape},
    runtime::digest::Digest,
};

/// On-disk layout version. Bump it when any persisted format changes; older
/// layouts are simply ignored.
pub const CACHE_VERSION: u32 = 1;

const ENTRIES_DIR: &str = "entries";
const SHAPES_FILE: &str = "shapes.json";
const VALIDATED_FILE: &str = "validated.json";

#[derive(Serialize, Deserialize)]
struct ShapeRecord {
    function: FunctionId,
    shape: FootprintShape,
}

/// Directory-backed persistence for the call cache:
///
/// ```text
/// <dir>/v1/entries/<2 hex>/<62 hex>.json
/// <dir>/v1/shapes.json
/// <dir>/v1/validated.json
/// ```
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn init(&self) -> Result<(), CacheError> {
        let entries = self.version_dir().join(ENTRIES_DIR);
        fs::create_dir_all(&entries).map_err(|source| CacheError::io(&entries, source))
    }

    fn version_dir(&self) -> PathBuf {
        self.dir.join(format!("v{}", CACHE_VERSION))
    }

    fn entry_path(&self, key: &Digest) -> PathBuf {
        let hex = key.to_hex();
        self.version_dir()
            .join(ENTRIES_DIR)
            .join(&hex[..2])
            .join(format!("{}.json", &hex[2..]))
    }

    pub fn has_entry(&self, key: &Digest) -> bool {
        self.entry_path(key).is_file()
    }

    pub fn load_entry(&self, key: &Digest) -> Result<Option<EntryRecord>, CacheError> {
        let path = self.entry_path(key);
        read_json(&path)
    }

    pub fn store_entry(&self, key: &Digest, record: &EntryRecord) -> Result<(), CacheError> {
        write_json(&self.entry_path(key), record)
    }

    pub fn remove_entry(&self, key: &Digest) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(CacheError::io(&path, err)),
            _ => Ok(()),
        }
    }

    /// Keys of every entry file. Files whose names are not digests are
    /// skipped.
    pub fn entry_keys(&self) -> Result<Vec<Digest>, CacheError> {
        let entries = self.version_dir().join(ENTRIES_DIR);
        let mut keys = Vec::new();
        for prefix in read_dir_or_empty(&entries)? {
            let Some(prefix_name) = file_name(&prefix) else {
                continue;
            };
            for file in read_dir_or_empty(&prefix)? {
                let Some(name) = file_name(&file) else {
                    continue;
                };
                let Some(rest) = name.strip_suffix(".json") else {
                    continue;
                };
                if let Some(key) = Digest::from_hex(&format!("{}{}", prefix_name, rest)) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Total size in bytes of all entry files.
    pub fn entries_size(&self) -> Result<u64, CacheError> {
        let mut total = 0;
        for key in self.entry_keys()? {
            let path = self.entry_path(&key);
            if let Ok(meta) = fs::metadata(&path) {
                total += meta.len();
            }
        }
        Ok(total)
    }

    pub fn load_shapes(&self) -> Result<HashMap<FunctionId, FootprintShape>, CacheError> {
        let records: Vec<ShapeRecord> =
            read_json(&self.version_dir().join(SHAPES_FILE))?.unwrap_or_default();
        Ok(records
            .into_iter()
            .map(|record| (record.function, record.shape))
            .collect())
    }

    pub fn store_shapes(
        &self,
        shapes: &HashMap<FunctionId, FootprintShape>,
    ) -> Result<(), CacheError> {
        let mut records: Vec<ShapeRecord> = shapes
            .iter()
            .map(|(function, shape)| ShapeRecord {
                function: *function,
                shape: shape.clone(),
            })
            .collect();
        records.sort_by_key(|record| record.function);
        write_json(&self.version_dir().join(SHAPES_FILE), &records)
    }

    pub fn load_validated(&self) -> Result<BTreeMap<Digest, u64>, CacheError> {
        let stamps: BTreeMap<String, u64> =
            read_json(&self.version_dir().join(VALIDATED_FILE))?.unwrap_or_default();
        Ok(stamps
            .into_iter()
            .filter_map(|(hex, stamp)| Digest::from_hex(&hex).map(|key| (key, stamp)))
            .collect())
    }

    pub fn store_validated(&self, validated: &BTreeMap<Digest, u64>) -> Result<(), CacheError> {
        let stamps: BTreeMap<String, u64> = validated
            .iter()
            .map(|(key, stamp)| (key.to_hex(), *stamp))
            .collect();
        write_json(&self.version_dir().join(VALIDATED_FILE), &stamps)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, CacheError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(CacheError::io(path, err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| CacheError::Corrupted {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

/// Writes through a temporary sibling and renames it into place, so readers
/// never observe a half-written file.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CacheError::io(parent, source))?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| CacheError::Corrupted {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, bytes).map_err(|source| CacheError::io(&tmp, source))?;
    fs::rename(&tmp, path).map_err(|source| CacheError::io(path, source))
}

fn read_dir_or_empty(dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    match fs::read_dir(dir) {
        Ok(entries) => Ok(entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(CacheError::io(dir, err)),
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{
            entry::{CacheEntry, StoredValue},
            fingerprint::CallFingerprint,
        },
        runtime::{effects::EffectFootprint, value::Value},
    };

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "kiln_store_{}_{}_{}",
            name,
            std::process::id(),
            nanos
        ))
    }

    fn record(value: Value) -> EntryRecord {
        let entry = CacheEntry {
            fingerprint: CallFingerprint {
                function: FunctionId(Digest::of(b"fn f() {}")),
                args: vec![],
                env: BTreeMap::new(),
                files: BTreeMap::new(),
            },
            value,
            footprint: EffectFootprint::default(),
        };
        EntryRecord::from_entry(&entry).unwrap()
    }

    #[test]
    fn entries_are_sharded_by_prefix() {
        let store = DiskStore::new(temp_dir("layout"));
        store.init().unwrap();
        let key = Digest::of(b"key");
        store
            .store_entry(&key, &record(Value::from("out.o")))
            .unwrap();

        let hex = key.to_hex();
        let expected = store
            .dir()
            .join("v1")
            .join("entries")
            .join(&hex[..2])
            .join(format!("{}.json", &hex[2..]));
        assert!(expected.is_file());
        assert!(store.has_entry(&key));
        assert_eq!(store.entry_keys().unwrap(), vec![key]);

        let loaded = store.load_entry(&key).unwrap().unwrap();
        assert_eq!(loaded.value, StoredValue::String("out.o".to_string()));

        store.remove_entry(&key).unwrap();
        assert!(store.load_entry(&key).unwrap().is_none());
        store.remove_entry(&key).unwrap();
    }

    #[test]
    fn corrupted_entry_is_reported() {
        let store = DiskStore::new(temp_dir("corrupt"));
        let key = Digest::of(b"bad");
        let path = store.entry_path(&key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            store.load_entry(&key),
            Err(CacheError::Corrupted { .. })
        ));
    }

    #[test]
    fn shapes_and_stamps_persist() {
        let store = DiskStore::new(temp_dir("shapes"));
        let function = FunctionId(Digest::of(b"fn g() {}"));
        let mut shape = FootprintShape::default();
        shape.env_names.insert("CC".to_string());
        store
            .store_shapes(&HashMap::from([(function, shape.clone())]))
            .unwrap();
        assert_eq!(store.load_shapes().unwrap().get(&function), Some(&shape));

        let stamps = BTreeMap::from([(Digest::of(b"a"), 7u64)]);
        store.store_validated(&stamps).unwrap();
        assert_eq!(store.load_validated().unwrap(), stamps);
    }

    #[test]
    fn missing_files_load_as_empty() {
        let store = DiskStore::new(temp_dir("empty"));
        assert!(store.load_shapes().unwrap().is_empty());
        assert!(store.load_validated().unwrap().is_empty());
        assert!(store.entry_keys().unwrap().is_empty());
    }
}
