//! Content-addressed store of call results.
//!
//! Entries are keyed by [`CallFingerprint::key`]. Each function identity
//! also owns a learned [`FootprintShape`] naming the env vars and files its
//! fingerprint must cover; the first execution of an identity seeds it.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    io,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;

use crate::runtime::{
    digest::{Digest, hash_file},
    effects::EffectFootprint,
    env::EnvSource,
    value::Value,
};

pub mod entry;
pub mod fingerprint;
pub mod shape;
pub mod store;

pub use entry::{CacheEntry, StoredValue};
pub use fingerprint::{CallFingerprint, FunctionId, env_value_digest};
pub use shape::FootprintShape;
pub use store::DiskStore;

use entry::EntryRecord;

const SHARD_COUNT: usize = 16;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("declared input `{}` no longer exists", path.display())]
    StaleInput { path: PathBuf },

    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupted cache file {}: {message}", path.display())]
    Corrupted { path: PathBuf, message: String },
}

impl CacheError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        CacheError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Counters since the cache was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub commits: u64,
}

/// Summary of a persistent cache, for `kiln cache info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub dir: Option<PathBuf>,
    pub entries: usize,
    pub shapes: usize,
    pub bytes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    commits: AtomicU64,
}

type Shard = RwLock<HashMap<Digest, Arc<CacheEntry>>>;

/// Call cache shared by every worker of a run.
///
/// Entries live in sharded maps (shard = first key byte), so lookups on
/// unrelated fingerprints rarely touch the same lock. With a [`DiskStore`]
/// attached, misses fall through to disk and commits are written through.
#[derive(Debug)]
pub struct CallCache {
    shards: Vec<Shard>,
    shapes: RwLock<HashMap<FunctionId, FootprintShape>>,
    validated: Mutex<BTreeMap<Digest, u64>>,
    clock: AtomicU64,
    shapes_dirty: AtomicBool,
    counters: Counters,
    store: Option<DiskStore>,
    root: PathBuf,
}

impl CallCache {
    /// A cache that forgets everything when dropped. `root` is where
    /// relative declared paths resolve.
    pub fn in_memory(root: impl Into<PathBuf>) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::default()).collect(),
            shapes: RwLock::default(),
            validated: Mutex::default(),
            clock: AtomicU64::new(0),
            shapes_dirty: AtomicBool::new(false),
            counters: Counters::default(),
            store: None,
            root: root.into(),
        }
    }

    /// Opens (creating if needed) a persistent cache in `dir`.
    pub fn open(dir: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let store = DiskStore::new(dir);
        store.init()?;

        let mut cache = Self::in_memory(root);
        cache.shapes = RwLock::new(store.load_shapes().unwrap_or_else(|err| {
            log::warn!("ignoring unreadable footprint shapes: {}", err);
            HashMap::new()
        }));
        let validated = store.load_validated().unwrap_or_else(|err| {
            log::warn!("ignoring unreadable validation stamps: {}", err);
            BTreeMap::new()
        });
        let newest = validated.values().copied().max().unwrap_or(0);
        cache.clock = AtomicU64::new(newest);
        cache.validated = Mutex::new(validated);
        log::debug!("opened call cache at {}", store.dir().display());
        cache.store = Some(store);
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> Option<&Path> {
        self.store.as_ref().map(DiskStore::dir)
    }

    fn shard(&self, key: &Digest) -> &Shard {
        &self.shards[key.as_bytes()[0] as usize % SHARD_COUNT]
    }

    /// Finds the entry committed under `fingerprint`, if its outputs are
    /// still on disk as written. Has no effect beyond warming memory from
    /// disk and bumping the hit/miss counters.
    pub fn lookup(&self, fingerprint: &CallFingerprint) -> Option<Arc<CacheEntry>> {
        let key = fingerprint.key();
        let found = self.lookup_key(&key).filter(|entry| {
            if entry.fingerprint != *fingerprint {
                log::warn!("cache key {} collides with a different fingerprint", key.short());
                return false;
            }
            if !entry.outputs_intact(&self.root) {
                log::debug!("cache entry {} has stale outputs", key.short());
                return false;
            }
            true
        });

        let counter = match found {
            Some(_) => &self.counters.hits,
            None => &self.counters.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn lookup_key(&self, key: &Digest) -> Option<Arc<CacheEntry>> {
        if let Some(entry) = self
            .shard(key)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Some(entry.clone());
        }

        let store = self.store.as_ref()?;
        match store.load_entry(key) {
            Ok(Some(record)) => {
                let entry = Arc::new(record.into_entry());
                self.shard(key)
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(*key)
                    .or_insert_with(|| entry.clone());
                Some(entry)
            }
            Ok(None) => None,
            Err(err) => {
                log::warn!("treating unreadable cache entry as a miss: {}", err);
                None
            }
        }
    }

    /// Hashes the arguments and the current state of every declared input.
    pub fn resolve_fingerprint(
        &self,
        function: FunctionId,
        args: &[Value],
        env_names: &BTreeSet<String>,
        file_paths: &BTreeSet<PathBuf>,
        env: &dyn EnvSource,
    ) -> Result<CallFingerprint, CacheError> {
        let env = env_names
            .iter()
            .map(|name| {
                let value = env.var(name);
                (name.clone(), env_value_digest(value.as_deref()))
            })
            .collect();

        let mut files = BTreeMap::new();
        for path in file_paths {
            let absolute = self.root.join(path);
            let digest = hash_file(&absolute).map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => CacheError::StaleInput { path: path.clone() },
                _ => CacheError::io(&absolute, err),
            })?;
            files.insert(path.clone(), digest);
        }

        Ok(CallFingerprint {
            function,
            args: args.iter().map(Value::content_hash).collect(),
            env,
            files,
        })
    }

    /// Stores a result. An existing entry for the same fingerprint is kept
    /// and the new one dropped; volatile results are never stored. Returns
    /// whether a new entry was written.
    pub fn commit(
        &self,
        fingerprint: CallFingerprint,
        value: Value,
        footprint: EffectFootprint,
    ) -> Result<bool, CacheError> {
        if footprint.volatile {
            return Ok(false);
        }

        let key = fingerprint.key();
        if self.store.as_ref().is_some_and(|store| store.has_entry(&key)) {
            return Ok(false);
        }

        let entry = Arc::new(CacheEntry {
            fingerprint,
            value,
            footprint,
        });
        {
            let mut shard = self
                .shard(&key)
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if shard.contains_key(&key) {
                return Ok(false);
            }
            shard.insert(key, entry.clone());
        }
        self.counters.commits.fetch_add(1, Ordering::Relaxed);
        self.mark_validated(&key);
        log::debug!("committed {} for {}", key.short(), entry.fingerprint.function);

        if let Some(store) = &self.store {
            match EntryRecord::from_entry(&entry) {
                Some(record) => store.store_entry(&key, &record)?,
                None => log::debug!("result of {} holds a function; kept in memory", key.short()),
            }
        }
        Ok(true)
    }

    /// Records that the entry under `key` was just used.
    pub fn mark_validated(&self, key: &Digest) {
        let stamp = self.tick();
        self.validated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*key, stamp);
    }

    /// Wall-clock nanoseconds, forced strictly increasing so every stamp
    /// orders distinctly.
    fn tick(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0);
        let previous = self
            .clock
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }

    pub fn shape(&self, function: &FunctionId) -> Option<FootprintShape> {
        self.shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(function)
            .cloned()
    }

    /// Folds an execution's footprint into the function's shape and returns
    /// the result.
    pub fn learn_shape(&self, function: FunctionId, footprint: &EffectFootprint) -> FootprintShape {
        let observed = FootprintShape::from_footprint(footprint);
        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        let shape = shapes.entry(function).or_default();
        if shape.absorb(&observed) {
            self.shapes_dirty.store(true, Ordering::Relaxed);
            log::debug!("shape of {} grew to {:?}", function, shape);
        }
        shape.clone()
    }

    pub fn forget_shape(&self, function: &FunctionId) {
        let removed = self
            .shapes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(function);
        if removed.is_some() {
            self.shapes_dirty.store(true, Ordering::Relaxed);
        }
    }

    /// Writes shapes and validation stamps to disk. A no-op in memory.
    pub fn flush(&self) -> Result<(), CacheError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if self.shapes_dirty.swap(false, Ordering::Relaxed) {
            let shapes = self.shapes.read().unwrap_or_else(PoisonError::into_inner);
            store.store_shapes(&shapes)?;
        }
        let validated = self.validated.lock().unwrap_or_else(PoisonError::into_inner);
        store.store_validated(&validated)
    }

    /// Removes all but the `keep` most recently validated entries. Entries
    /// never validated count as oldest. Returns how many were removed.
    pub fn collect_garbage(&self, keep: usize) -> Result<usize, CacheError> {
        let mut keys: BTreeSet<Digest> = BTreeSet::new();
        for shard in &self.shards {
            keys.extend(shard.read().unwrap_or_else(PoisonError::into_inner).keys());
        }
        if let Some(store) = &self.store {
            keys.extend(store.entry_keys()?);
        }
        if keys.len() <= keep {
            return Ok(0);
        }

        let mut validated = self.validated.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ordered: Vec<(u64, Digest)> = keys
            .into_iter()
            .map(|key| (validated.get(&key).copied().unwrap_or(0), key))
            .collect();
        ordered.sort();
        let doomed = ordered.len() - keep;

        for (_, key) in &ordered[..doomed] {
            self.shard(key)
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
            if let Some(store) = &self.store {
                store.remove_entry(key)?;
            }
            validated.remove(key);
        }
        log::info!("removed {} cache entries, kept {}", doomed, keep);
        drop(validated);

        self.flush()?;
        Ok(doomed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            commits: self.counters.commits.load(Ordering::Relaxed),
        }
    }

    pub fn info(&self) -> Result<CacheInfo, CacheError> {
        let shapes = self
            .shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        match &self.store {
            Some(store) => Ok(CacheInfo {
                dir: Some(store.dir().to_path_buf()),
                entries: store.entry_keys()?.len(),
                shapes,
                bytes: store.entries_size()?,
            }),
            None => Ok(CacheInfo {
                dir: None,
                entries: self
                    .shards
                    .iter()
                    .map(|shard| shard.read().unwrap_or_else(PoisonError::into_inner).len())
                    .sum(),
                shapes,
                bytes: 0,
            }),
        }
    }
}

#[cfg(test)]
mod cache_test;
