use std::sync::Arc;

use kiln::{
    cache::{CacheError, CallCache},
    runtime::{Host, MapEnv, Value},
    scheduler::{BuildReport, EdgeKind, NodeState, Scheduler, StepError, plan},
    syntax::parse,
};

#[path = "../common/mod.rs"]
mod common;

const DIAMOND: &str = r#"
fn emit(name, content) { write_file(name, content); content }
fn join(a, b) { a + "+" + b }
let base = emit("base.txt", "base");
let left = join(base, "left");
let right = join(base, "right");
let top = join(left, right);
"#;

fn run(source: &str, cache: &CallCache, workers: usize) -> BuildReport {
    let program = parse(source).expect("parse errors");
    let host = Host::new(cache.root().to_path_buf(), Arc::new(MapEnv::new()));
    let plan = plan(&program, &host, &["release".to_string()], cache).expect("plan");
    Scheduler::new(cache, &host, workers)
        .run(&plan)
        .expect("thread pool")
}

#[test]
fn diamond_resolves_the_same_with_any_worker_count() {
    let serial = run(DIAMOND, &CallCache::in_memory(common::temp_root("serial")), 1);
    let parallel = run(DIAMOND, &CallCache::in_memory(common::temp_root("parallel")), 8);

    assert!(serial.succeeded() && parallel.succeeded());
    let expected = Value::from("base+left+base+right");
    assert_eq!(serial.value("top"), Some(&expected));
    assert_eq!(parallel.value("top"), Some(&expected));

    for report in [&serial, &parallel] {
        let top_starts = report.event_position(3, NodeState::Fingerprinted).unwrap();
        for dependency in [1, 2] {
            assert!(report.event_position(dependency, NodeState::Done).unwrap() < top_starts);
        }
    }
}

#[test]
fn writers_of_one_path_run_in_declaration_order() {
    let root = common::temp_root("writers");
    let cache = CallCache::in_memory(&root);
    let source = r#"
        fn put(text) { write_file("shared.txt", text); text }
        put("first");
        put("second");
        put("third");
    "#;
    let program = parse(source).unwrap();
    let host = Host::new(root.clone(), Arc::new(MapEnv::new()));
    let planned = plan(&program, &host, &[], &cache).unwrap();
    assert_eq!(
        planned.graph.edges(),
        vec![
            (0, 1, EdgeKind::Effect),
            (0, 2, EdgeKind::Effect),
            (1, 2, EdgeKind::Effect),
        ]
    );

    let report = run(source, &cache, 4);
    assert!(report.succeeded());
    assert_eq!(common::read(&root, "shared.txt"), "third");
}

#[test]
fn args_reach_the_script() {
    let cache = CallCache::in_memory(common::temp_root("args"));
    let report = run(
        r#"
        fn mode(all) { write_file("mode.txt", all[0]); all[0] }
        let m = mode(args);
        "#,
        &cache,
        2,
    );
    assert_eq!(report.value("m"), Some(&Value::from("release")));
}

#[test]
fn independent_failures_are_all_reported() {
    let cache = CallCache::in_memory(common::temp_root("failures"));
    // Both inputs are missing, so both lookups fail before anything runs.
    let report = run(
        r#"
        fn load(path) { read_file(path) }
        let a = load("missing-a.txt");
        let b = load("missing-b.txt");
        "#,
        &cache,
        2,
    );

    assert!(!report.succeeded());
    assert_eq!(report.failures.len(), 2);
    let mut failed: Vec<&str> = report.failures.iter().map(|f| f.node.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["a", "b"]);
    for failure in &report.failures {
        assert!(
            matches!(&failure.source, StepError::Cache(CacheError::StaleInput { .. })),
            "{}",
            failure.source
        );
    }
    assert_eq!(report.stats.failed, 2);
}
