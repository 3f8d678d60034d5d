use std::path::PathBuf;

use crate::runtime::{env::normalize_path, error::RuntimeError, value::Value};

use super::BuiltinContext;

fn arity_error(name: &str, expected: impl Into<String>, got: usize) -> RuntimeError {
    RuntimeError::Arity {
        function: name.to_string(),
        expected: expected.into(),
        got,
    }
}

pub(super) fn check_arity(args: &[Value], expected: usize, name: &str) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(arity_error(name, expected.to_string(), args.len()));
    }
    Ok(())
}

pub(super) fn check_arity_range(
    args: &[Value],
    min: usize,
    max: usize,
    name: &str,
) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        return Err(arity_error(name, format!("{}..{}", min, max), args.len()));
    }
    Ok(())
}

pub(super) fn check_min_arity(args: &[Value], min: usize, name: &str) -> Result<(), RuntimeError> {
    if args.len() < min {
        return Err(arity_error(name, format!("at least {}", min), args.len()));
    }
    Ok(())
}

pub(super) fn arg_string<'a>(
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<&'a str, RuntimeError> {
    match &args[index] {
        Value::String(s) => Ok(s),
        other => Err(RuntimeError::type_error(name, "String", other.type_name())),
    }
}

/// Flattens strings and (nested) lists of strings.
pub(super) fn collect_strings(
    value: &Value,
    name: &str,
    out: &mut Vec<String>,
) -> Result<(), RuntimeError> {
    match value {
        Value::String(s) => {
            out.push(s.to_string());
            Ok(())
        }
        Value::List(items) => {
            for item in items.iter() {
                collect_strings(item, name, out)?;
            }
            Ok(())
        }
        other => Err(RuntimeError::type_error(
            name,
            "String or List of String",
            other.type_name(),
        )),
    }
}

/// The recorded (root-relative, normalized) form of a script path and its
/// absolute location.
pub(super) fn script_path(ctx: &dyn BuiltinContext, raw: &str) -> (PathBuf, PathBuf) {
    let logical = normalize_path(raw);
    let absolute = ctx.host().resolve(&logical);
    (logical, absolute)
}
