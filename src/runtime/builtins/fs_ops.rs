use std::fs;

use crate::runtime::{
    digest::{Digest, hash_file_or_missing},
    error::RuntimeError,
    value::Value,
};

use super::{
    BuiltinContext,
    helpers::{arg_string, check_arity, check_min_arity, collect_strings, script_path},
};

pub(super) fn builtin_read_file(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity(&args, 1, "read_file")?;
    let raw = arg_string(&args, 0, "read_file")?;
    let (logical, absolute) = script_path(ctx, raw);
    ctx.recorder().record_file_read(logical);

    fs::read_to_string(&absolute)
        .map(Value::from)
        .map_err(|err| RuntimeError::io(absolute.clone(), &err))
}

pub(super) fn builtin_write_file(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_arity(&args, 2, "write_file")?;
    let raw = arg_string(&args, 0, "write_file")?;
    let content = arg_string(&args, 1, "write_file")?;
    let (logical, absolute) = script_path(ctx, raw);

    if let Some(parent) = absolute.parent() {
        fs::create_dir_all(parent).map_err(|err| RuntimeError::io(parent, &err))?;
    }
    fs::write(&absolute, content).map_err(|err| RuntimeError::io(absolute.clone(), &err))?;

    ctx.recorder()
        .record_file_write(logical, Digest::of(content.as_bytes()));
    Ok(Value::Unit)
}

/// `reads(paths...)`: declares files a shell-out consumes.
pub(super) fn builtin_reads(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_min_arity(&args, 1, "reads")?;
    let mut paths = Vec::new();
    for arg in &args {
        collect_strings(arg, "reads", &mut paths)?;
    }

    for raw in paths {
        let (logical, _) = script_path(ctx, &raw);
        ctx.recorder().record_file_read(logical);
    }
    Ok(Value::Unit)
}

/// `writes(paths...)`: declares files a shell-out produced. Call it after
/// the process has run so the recorded hashes match what is on disk.
pub(super) fn builtin_writes(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_min_arity(&args, 1, "writes")?;
    let mut paths = Vec::new();
    for arg in &args {
        collect_strings(arg, "writes", &mut paths)?;
    }

    for raw in paths {
        let (logical, absolute) = script_path(ctx, &raw);
        let digest =
            hash_file_or_missing(&absolute).map_err(|err| RuntimeError::io(absolute, &err))?;
        ctx.recorder().record_file_write(logical, digest);
    }
    Ok(Value::Unit)
}
