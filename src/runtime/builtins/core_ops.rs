use crate::runtime::{error::RuntimeError, value::Value};

use super::{
    BuiltinContext,
    helpers::{check_arity, check_arity_range},
};

pub(super) fn builtin_len(
    _ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "len")?;
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(RuntimeError::type_error(
            "len",
            "String or List",
            other.type_name(),
        )),
    }
}

pub(super) fn builtin_str(
    _ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "str")?;
    Ok(Value::from(args[0].to_string()))
}

pub(super) fn builtin_print(
    _ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(Value::Unit)
}

/// `fail(message)` aborts the current step.
pub(super) fn builtin_fail(
    _ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity_range(&args, 0, 1, "fail")?;
    let message = args
        .first()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "fail() called".to_string());
    Err(RuntimeError::ScriptFailure { message })
}

/// `uncached()` marks the calling step as non-deterministic so its result
/// is never stored.
pub(super) fn builtin_uncached(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity(&args, 0, "uncached")?;
    ctx.recorder().mark_volatile();
    Ok(Value::Unit)
}
