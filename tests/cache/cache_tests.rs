use std::{collections::BTreeSet, fs, path::Path};

use kiln::{
    cache::{CallCache, CallFingerprint, FunctionId},
    runtime::{Digest, EffectFootprint, MapEnv, Value},
};

#[path = "../common/mod.rs"]
mod common;

fn fingerprint(cache: &CallCache, name: &str) -> CallFingerprint {
    cache
        .resolve_fingerprint(
            FunctionId(Digest::of(b"fn step(name) { name }")),
            &[Value::from(name)],
            &BTreeSet::new(),
            &BTreeSet::new(),
            &MapEnv::new(),
        )
        .unwrap()
}

fn entry_file(dir: &Path, key: &Digest) -> std::path::PathBuf {
    let hex = key.to_hex();
    dir.join("v1")
        .join("entries")
        .join(&hex[..2])
        .join(format!("{}.json", &hex[2..]))
}

#[test]
fn layout_is_versioned_and_sharded() {
    let root = common::temp_root("layout");
    let dir = root.join(".kiln-cache");
    let cache = CallCache::open(&dir, &root).unwrap();
    let fp = fingerprint(&cache, "a");
    let mut footprint = EffectFootprint::default();
    footprint.env_reads.insert("CC".to_string());
    cache.commit(fp.clone(), Value::from("a.o"), footprint.clone()).unwrap();
    cache.learn_shape(fp.function, &footprint);
    cache.flush().unwrap();

    let file = entry_file(&dir, &fp.key());
    assert!(file.is_file(), "missing {}", file.display());
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(json["value"]["type"], "String");
    assert!(dir.join("v1/shapes.json").is_file());
    assert!(dir.join("v1/validated.json").is_file());
}

#[test]
fn corrupted_entry_reads_as_a_miss() {
    let root = common::temp_root("corrupt");
    let dir = root.join("cache");
    let fp;
    {
        let cache = CallCache::open(&dir, &root).unwrap();
        fp = fingerprint(&cache, "a");
        cache
            .commit(fp.clone(), Value::Int(1), EffectFootprint::default())
            .unwrap();
    }
    fs::write(entry_file(&dir, &fp.key()), "{ not json").unwrap();

    let cache = CallCache::open(&dir, &root).unwrap();
    assert!(cache.lookup(&fp).is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn garbage_collection_uses_persisted_stamps() {
    let root = common::temp_root("gc");
    let dir = root.join("cache");
    let (old, fresh) = {
        let cache = CallCache::open(&dir, &root).unwrap();
        let old = fingerprint(&cache, "old");
        let fresh = fingerprint(&cache, "fresh");
        cache
            .commit(old.clone(), Value::Unit, EffectFootprint::default())
            .unwrap();
        cache
            .commit(fresh.clone(), Value::Unit, EffectFootprint::default())
            .unwrap();
        cache.flush().unwrap();
        (old, fresh)
    };

    let cache = CallCache::open(&dir, &root).unwrap();
    assert_eq!(cache.collect_garbage(1).unwrap(), 1);
    assert!(!entry_file(&dir, &old.key()).exists());
    assert!(cache.lookup(&fresh).is_some());
    assert_eq!(cache.info().unwrap().entries, 1);
}

#[test]
fn unknown_layout_versions_are_ignored() {
    let root = common::temp_root("version");
    let dir = root.join("cache");
    fs::create_dir_all(dir.join("v0/entries")).unwrap();
    fs::write(dir.join("v0/shapes.json"), "garbage").unwrap();

    let cache = CallCache::open(&dir, &root).unwrap();
    let info = cache.info().unwrap();
    assert_eq!(info.entries, 0);
    assert_eq!(info.shapes, 0);
}
