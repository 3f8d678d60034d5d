use std::{fs, path::PathBuf, sync::Arc};

use super::*;
use crate::runtime::{digest::Digest, env::MapEnv};

struct TestContext {
    recorder: FootprintRecorder,
    host: Host,
}

impl BuiltinContext for TestContext {
    fn recorder(&mut self) -> &mut FootprintRecorder {
        &mut self.recorder
    }

    fn host(&self) -> &Host {
        &self.host
    }
}

fn temp_root(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "kiln_builtins_{}_{}_{}",
        name,
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&dir).expect("create temp root");
    dir
}

fn context(root: PathBuf, env: MapEnv) -> TestContext {
    TestContext {
        recorder: FootprintRecorder::new(),
        host: Host::new(root, Arc::new(env)),
    }
}

fn call(ctx: &mut TestContext, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let builtin = get_builtin(name).unwrap_or_else(|| panic!("no builtin `{}`", name));
    (builtin.func)(ctx, args)
}

#[test]
fn getenv_records_read_even_when_unset() {
    let mut ctx = context(std::env::temp_dir(), MapEnv::new());
    let err = call(&mut ctx, "getenv", vec![Value::from("CC")]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::MissingEnvVar {
            name: "CC".to_string()
        }
    );

    let footprint = ctx.recorder.take();
    assert!(footprint.env_reads.contains("CC"));
}

#[test]
fn getenv_prefers_set_value_over_default() {
    let mut ctx = context(std::env::temp_dir(), MapEnv::new().with("CC", "clang"));
    let value = call(
        &mut ctx,
        "getenv",
        vec![Value::from("CC"), Value::from("gcc")],
    )
    .unwrap();
    assert_eq!(value, Value::from("clang"));

    let value = call(
        &mut ctx,
        "getenv",
        vec![Value::from("CFLAGS"), Value::from("-O2")],
    )
    .unwrap();
    assert_eq!(value, Value::from("-O2"));
}

#[test]
fn getenv_checks_arity_and_types() {
    let mut ctx = context(std::env::temp_dir(), MapEnv::new());
    assert!(matches!(
        call(&mut ctx, "getenv", vec![]),
        Err(RuntimeError::Arity { got: 0, .. })
    ));
    assert!(matches!(
        call(&mut ctx, "getenv", vec![Value::Int(1)]),
        Err(RuntimeError::Type { .. })
    ));
}

#[test]
fn write_then_read_file_records_normalized_paths() {
    let root = temp_root("rw");
    let mut ctx = context(root.clone(), MapEnv::new());

    call(
        &mut ctx,
        "write_file",
        vec![Value::from("./out/../gen/a.txt"), Value::from("hello")],
    )
    .unwrap();
    assert_eq!(
        fs::read_to_string(root.join("gen/a.txt")).unwrap(),
        "hello"
    );

    let value = call(&mut ctx, "read_file", vec![Value::from("gen/a.txt")]).unwrap();
    assert_eq!(value, Value::from("hello"));

    let footprint = ctx.recorder.take();
    assert_eq!(
        footprint.files_written.get(&PathBuf::from("gen/a.txt")),
        Some(&Digest::of(b"hello"))
    );
    assert!(footprint.files_read.contains(&PathBuf::from("gen/a.txt")));
}

#[test]
fn read_file_reports_missing_file() {
    let root = temp_root("missing");
    let mut ctx = context(root, MapEnv::new());
    let err = call(&mut ctx, "read_file", vec![Value::from("nope.txt")]).unwrap_err();
    assert!(matches!(err, RuntimeError::Io { .. }));
    // The attempt still counts as a dependency.
    assert!(
        ctx.recorder
            .take()
            .files_read
            .contains(&PathBuf::from("nope.txt"))
    );
}

#[test]
fn reads_and_writes_flatten_lists() {
    let root = temp_root("decl");
    fs::write(root.join("b.o"), "object").unwrap();
    let mut ctx = context(root, MapEnv::new());

    call(
        &mut ctx,
        "reads",
        vec![
            Value::from("a.c"),
            Value::list(vec![Value::from("b.c"), Value::from("c.c")]),
        ],
    )
    .unwrap();
    call(
        &mut ctx,
        "writes",
        vec![Value::list(vec![Value::from("b.o"), Value::from("gone.o")])],
    )
    .unwrap();

    let footprint = ctx.recorder.take();
    assert_eq!(footprint.files_read.len(), 3);
    assert_eq!(
        footprint.files_written.get(&PathBuf::from("b.o")),
        Some(&Digest::of(b"object"))
    );
    assert_eq!(
        footprint.files_written.get(&PathBuf::from("gone.o")),
        Some(&Digest::MISSING)
    );
}

#[test]
fn core_builtins() {
    let mut ctx = context(std::env::temp_dir(), MapEnv::new());
    assert_eq!(
        call(&mut ctx, "len", vec![Value::from("héllo")]).unwrap(),
        Value::Int(5)
    );
    assert_eq!(
        call(&mut ctx, "str", vec![Value::Int(42)]).unwrap(),
        Value::from("42")
    );
    assert_eq!(
        call(&mut ctx, "fail", vec![Value::from("broken")]).unwrap_err(),
        RuntimeError::ScriptFailure {
            message: "broken".to_string()
        }
    );

    call(&mut ctx, "uncached", vec![]).unwrap();
    let footprint = ctx.recorder.take();
    assert!(footprint.volatile);
    assert!(footprint.is_pure());
}

#[test]
fn contracts_cover_what_builtins_record() {
    let getenv = get_builtin("getenv").unwrap();
    let mut footprint = EffectFootprint::default();
    footprint.env_reads.insert("HOME".to_string());
    assert!(getenv.contract.allows(&footprint));
    assert!(!get_builtin("len").unwrap().contract.allows(&footprint));
    assert!(get_builtin("len").unwrap().contract.is_pure());
    assert!(!SHELL_OUT.contract.is_pure());
    assert!(get_builtin("$").is_none());
}

#[test]
fn prelude_binds_args() {
    let bindings = prelude(&["a".to_string(), "b".to_string()]);
    assert_eq!(
        bindings.get("args"),
        Some(&Value::list(vec![Value::from("a"), Value::from("b")]))
    );
}

#[cfg(unix)]
#[test]
fn shell_out_returns_exit_code_without_failing() {
    let root = temp_root("shell");
    let mut ctx = context(root.clone(), MapEnv::new());

    let code = (SHELL_OUT.func)(
        &mut ctx,
        vec![
            Value::from("sh"),
            Value::from("-c"),
            Value::from("echo built > out.txt; exit 3"),
        ],
    )
    .unwrap();
    assert_eq!(code, Value::Int(3));
    assert_eq!(
        fs::read_to_string(root.join("out.txt")).unwrap(),
        "built\n"
    );
    assert_eq!(ctx.recorder.take().exit_code, Some(3));
}

#[test]
fn shell_out_reports_spawn_failure() {
    let mut ctx = context(std::env::temp_dir(), MapEnv::new());
    let err = (SHELL_OUT.func)(&mut ctx, vec![Value::from("kiln-no-such-program")]).unwrap_err();
    assert!(matches!(err, RuntimeError::Spawn { .. }));
}
