use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use kiln::{
    runtime::{EffectFootprint, Evaluator, Host, MapEnv, RuntimeError, Value},
    syntax::parse,
};

#[path = "../common/mod.rs"]
mod common;

fn eval_with(source: &str, env: MapEnv) -> (Result<Value, RuntimeError>, EffectFootprint) {
    let program = parse(source).expect("parse errors");
    let host = Host::new(common::temp_root("eval"), Arc::new(env));
    let mut evaluator = Evaluator::new(Default::default(), &host);
    let result = evaluator.eval_program(&program);
    (result, evaluator.take_footprint())
}

#[test]
fn missing_env_var_is_an_error() {
    let (result, footprint) = eval_with(r#"getenv("TOKEN")"#, MapEnv::new());
    assert_eq!(
        result,
        Err(RuntimeError::MissingEnvVar {
            name: "TOKEN".to_string()
        })
    );
    assert_eq!(footprint.env_reads, BTreeSet::from(["TOKEN".to_string()]));
}

#[test]
fn getenv_default_still_records_the_read() {
    let (result, footprint) = eval_with(r#"getenv("FOO", "swag")"#, MapEnv::new());
    assert_eq!(result, Ok(Value::from("swag")));
    assert_eq!(footprint.env_reads, BTreeSet::from(["FOO".to_string()]));
    assert!(footprint.files_read.is_empty());
    assert!(footprint.files_written.is_empty());
}

#[test]
fn empty_env_var_is_not_unset() {
    let (result, _) = eval_with(r#"getenv("FOO", "swag")"#, MapEnv::new().with("FOO", ""));
    assert_eq!(result, Ok(Value::from("")));
}

#[test]
fn caller_footprint_includes_nested_calls() {
    let (result, footprint) = eval_with(
        r#"
        fn inner() { reads("a.txt"); getenv("CC", "cc") }
        fn outer() { writes("out/b.txt"); inner() + "-wrapped" }
        outer()
        "#,
        MapEnv::new(),
    );
    assert_eq!(result, Ok(Value::from("cc-wrapped")));
    assert_eq!(footprint.env_reads, BTreeSet::from(["CC".to_string()]));
    assert_eq!(footprint.files_read, BTreeSet::from([PathBuf::from("a.txt")]));
    assert!(footprint.files_written.contains_key(&PathBuf::from("out/b.txt")));
    assert!(!footprint.is_pure());
}

#[test]
fn pure_evaluation_has_a_pure_footprint() {
    let (result, footprint) = eval_with(
        r#"
        fn sum(xs) { let total = 0; for x in xs { total = total + x; } total }
        sum([1, 2, 3, 4])
        "#,
        MapEnv::new(),
    );
    assert_eq!(result, Ok(Value::Int(10)));
    assert!(footprint.is_pure());
}

#[test]
fn type_and_arity_errors() {
    let cases = [
        ("[1, 2][\"0\"]", "Type"),
        ("5[0]", "Type"),
        ("fn f(a) { a } f(1, 2)", "Arity"),
        ("nope + 1", "UndefinedVariable"),
        ("[1][3]", "IndexOutOfBounds"),
    ];
    for (source, expected) in cases {
        let (result, _) = eval_with(source, MapEnv::new());
        let err = result.expect_err(source);
        let kind = match err {
            RuntimeError::Type { .. } => "Type",
            RuntimeError::Arity { .. } => "Arity",
            RuntimeError::UndefinedVariable { .. } => "UndefinedVariable",
            RuntimeError::IndexOutOfBounds { .. } => "IndexOutOfBounds",
            _ => "other",
        };
        assert_eq!(kind, expected, "{}", source);
    }
}

#[test]
fn value_hashes_are_stable_across_evaluations() {
    let source = r#"["src/a.c", 1, true, ["nested"]]"#;
    let (first, _) = eval_with(source, MapEnv::new());
    let (second, _) = eval_with(source, MapEnv::new());
    assert_eq!(
        first.unwrap().content_hash(),
        second.unwrap().content_hash()
    );
}

#[cfg(unix)]
#[test]
fn non_zero_exit_is_a_value() {
    let (result, footprint) = eval_with(r#"$("sh", "-c", "exit 7")"#, MapEnv::new());
    assert_eq!(result, Ok(Value::Int(7)));
    assert_eq!(footprint.exit_code, Some(7));
}
