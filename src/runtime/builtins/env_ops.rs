use crate::runtime::{error::RuntimeError, value::Value};

use super::{
    BuiltinContext,
    helpers::{arg_string, check_arity_range},
};

/// `getenv(name)` / `getenv(name, default)`.
///
/// The read is recorded even when the variable is unset: a later run where
/// it becomes set must not reuse this result.
pub(super) fn builtin_getenv(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity_range(&args, 1, 2, "getenv")?;
    let name = arg_string(&args, 0, "getenv")?.to_string();
    ctx.recorder().record_env_read(&name);

    match ctx.host().env().var(&name) {
        Some(value) => Ok(Value::from(value)),
        None => match args.into_iter().nth(1) {
            Some(default) => Ok(default),
            None => Err(RuntimeError::MissingEnvVar { name }),
        },
    }
}
