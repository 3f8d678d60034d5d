use std::{
    collections::BTreeSet,
    fs,
    path::PathBuf,
    sync::Arc,
};

use super::*;
use crate::runtime::{
    digest::Digest,
    env::MapEnv,
    value::{Closure, Function},
};
use crate::syntax::{block::Block, position::Span};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "kiln_cache_{}_{}_{}",
        name,
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn function(text: &str) -> FunctionId {
    FunctionId(Digest::of(text.as_bytes()))
}

fn fingerprint(cache: &CallCache, arg: i64) -> CallFingerprint {
    cache
        .resolve_fingerprint(
            function("fn build(x) { x }"),
            &[Value::Int(arg)],
            &BTreeSet::new(),
            &BTreeSet::new(),
            &MapEnv::new(),
        )
        .unwrap()
}

#[test]
fn commit_then_lookup_hits() {
    let cache = CallCache::in_memory(temp_dir("hit"));
    let fp = fingerprint(&cache, 1);
    assert!(cache.lookup(&fp).is_none());

    assert!(
        cache
            .commit(fp.clone(), Value::from("a.o"), EffectFootprint::default())
            .unwrap()
    );
    let entry = cache.lookup(&fp).unwrap();
    assert_eq!(entry.value, Value::from("a.o"));
    assert!(cache.lookup(&fingerprint(&cache, 2)).is_none());

    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 2,
            commits: 1
        }
    );
}

#[test]
fn first_commit_wins() {
    let cache = CallCache::in_memory(temp_dir("first"));
    let fp = fingerprint(&cache, 1);
    assert!(
        cache
            .commit(fp.clone(), Value::Int(1), EffectFootprint::default())
            .unwrap()
    );
    assert!(
        !cache
            .commit(fp.clone(), Value::Int(2), EffectFootprint::default())
            .unwrap()
    );
    assert_eq!(cache.lookup(&fp).unwrap().value, Value::Int(1));
}

#[test]
fn volatile_results_are_not_stored() {
    let cache = CallCache::in_memory(temp_dir("volatile"));
    let fp = fingerprint(&cache, 1);
    let footprint = EffectFootprint {
        volatile: true,
        ..EffectFootprint::default()
    };
    assert!(!cache.commit(fp.clone(), Value::Int(1), footprint).unwrap());
    assert!(cache.lookup(&fp).is_none());
}

#[test]
fn resolve_reports_stale_input() {
    let root = temp_dir("stale");
    let cache = CallCache::in_memory(&root);
    let files = BTreeSet::from([PathBuf::from("src/missing.c")]);
    let err = cache
        .resolve_fingerprint(
            function("fn f() {}"),
            &[],
            &BTreeSet::new(),
            &files,
            &MapEnv::new(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::StaleInput { path } if path == PathBuf::from("src/missing.c")
    ));
}

#[test]
fn resolve_tracks_env_and_file_content() {
    let root = temp_dir("inputs");
    fs::write(root.join("a.c"), "one").unwrap();
    let cache = CallCache::in_memory(&root);
    let names = BTreeSet::from(["TOKEN".to_string()]);
    let files = BTreeSet::from([PathBuf::from("a.c")]);
    let resolve = |env: &MapEnv| {
        cache
            .resolve_fingerprint(function("fn f() {}"), &[], &names, &files, env)
            .unwrap()
    };

    let unset = resolve(&MapEnv::new());
    let empty = resolve(&MapEnv::new().with("TOKEN", ""));
    let set = resolve(&MapEnv::new().with("TOKEN", "abc"));
    assert_ne!(unset, empty);
    assert_ne!(empty, set);
    assert_eq!(set, resolve(&MapEnv::new().with("TOKEN", "abc")));

    fs::write(root.join("a.c"), "two").unwrap();
    assert_ne!(set, resolve(&MapEnv::new().with("TOKEN", "abc")));
}

#[test]
fn modified_outputs_turn_a_hit_into_a_miss() {
    let root = temp_dir("outputs");
    fs::write(root.join("a.o"), "object").unwrap();
    let cache = CallCache::in_memory(&root);
    let fp = fingerprint(&cache, 1);
    let mut footprint = EffectFootprint::default();
    footprint
        .files_written
        .insert(PathBuf::from("a.o"), Digest::of(b"object"));
    cache.commit(fp.clone(), Value::Unit, footprint).unwrap();
    assert!(cache.lookup(&fp).is_some());

    fs::write(root.join("a.o"), "tampered").unwrap();
    assert!(cache.lookup(&fp).is_none());

    fs::remove_file(root.join("a.o")).unwrap();
    assert!(cache.lookup(&fp).is_none());
}

#[test]
fn persistent_cache_survives_reopen() {
    let root = temp_dir("persist_root");
    let dir = root.join(".kiln-cache");
    let fid = function("fn build(x) { x }");
    let fp;
    {
        let cache = CallCache::open(&dir, &root).unwrap();
        fp = fingerprint(&cache, 7);
        cache
            .commit(
                fp.clone(),
                Value::list(vec![Value::from("a"), Value::Int(1)]),
                EffectFootprint::default(),
            )
            .unwrap();
        let mut footprint = EffectFootprint::default();
        footprint.env_reads.insert("CC".to_string());
        cache.learn_shape(fid, &footprint);
        cache.flush().unwrap();
    }

    let cache = CallCache::open(&dir, &root).unwrap();
    let entry = cache.lookup(&fp).unwrap();
    assert_eq!(
        entry.value,
        Value::list(vec![Value::from("a"), Value::Int(1)])
    );
    assert!(cache.shape(&fid).unwrap().env_names.contains("CC"));
    assert_eq!(cache.info().unwrap().entries, 1);
}

#[test]
fn function_results_stay_in_memory() {
    let root = temp_dir("fn_value");
    let dir = root.join("cache");
    let closure = Value::Function(Function::User(Arc::new(Closure {
        name: None,
        parameters: vec![],
        body: Block {
            statements: vec![],
            span: Span::default(),
        },
        captured: Default::default(),
        definition: "fn() {  }".to_string(),
    })));

    let cache = CallCache::open(&dir, &root).unwrap();
    let fp = fingerprint(&cache, 1);
    assert!(
        cache
            .commit(fp.clone(), closure, EffectFootprint::default())
            .unwrap()
    );
    assert!(cache.lookup(&fp).is_some());

    let reopened = CallCache::open(&dir, &root).unwrap();
    assert!(reopened.lookup(&fp).is_none());
}

#[test]
fn garbage_collection_drops_least_recently_validated() {
    let root = temp_dir("gc");
    let cache = CallCache::open(root.join("cache"), &root).unwrap();
    let fps: Vec<_> = (0..3).map(|i| fingerprint(&cache, i)).collect();
    for fp in &fps {
        cache
            .commit(fp.clone(), Value::Unit, EffectFootprint::default())
            .unwrap();
    }
    // Touch the oldest so the middle one becomes least recent.
    cache.mark_validated(&fps[0].key());

    assert_eq!(cache.collect_garbage(2).unwrap(), 1);
    assert!(cache.lookup(&fps[0]).is_some());
    assert!(cache.lookup(&fps[1]).is_none());
    assert!(cache.lookup(&fps[2]).is_some());
    assert_eq!(cache.collect_garbage(5).unwrap(), 0);
}

#[test]
fn forget_shape_clears_learning() {
    let cache = CallCache::in_memory(temp_dir("forget"));
    let fid = function("fn f() {}");
    let mut footprint = EffectFootprint::default();
    footprint.files_read.insert(PathBuf::from("in.txt"));
    let shape = cache.learn_shape(fid, &footprint);
    assert!(shape.files_read.contains(&PathBuf::from("in.txt")));

    cache.forget_shape(&fid);
    assert!(cache.shape(&fid).is_none());
}

#[test]
fn concurrent_commits_are_all_visible() {
    let cache = CallCache::in_memory(temp_dir("concurrent"));
    std::thread::scope(|scope| {
        for worker in 0..8i64 {
            let cache = &cache;
            scope.spawn(move || {
                for i in 0..25 {
                    let fp = fingerprint(cache, worker * 100 + i);
                    cache
                        .commit(fp, Value::Int(worker), EffectFootprint::default())
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(cache.stats().commits, 200);
    assert_eq!(cache.info().unwrap().entries, 200);
    assert_eq!(
        cache.lookup(&fingerprint(&cache, 305)).unwrap().value,
        Value::Int(3)
    );
}
