use std::process::Command;

use crate::runtime::{error::RuntimeError, value::Value};

use super::{BuiltinContext, helpers::check_min_arity};

/// `$(program, args...)`: runs a process in the build root and returns its
/// exit status. Output streams are inherited. A process killed by a signal
/// reports -1.
pub(super) fn builtin_shell_out(
    ctx: &mut dyn BuiltinContext,
    args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    check_min_arity(&args, 1, "$")?;

    let mut argv = Vec::new();
    for arg in &args {
        collect_command_args(arg, &mut argv)?;
    }
    let Some((program, rest)) = argv.split_first() else {
        return Err(RuntimeError::Arity {
            function: "$".to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        });
    };

    log::debug!("$ {}", argv.join(" "));
    let status = Command::new(program)
        .args(rest)
        .current_dir(ctx.host().root())
        .status()
        .map_err(|err| RuntimeError::Spawn {
            program: program.clone(),
            message: err.to_string(),
        })?;

    let code = status.code().map(i64::from).unwrap_or(-1);
    ctx.recorder().record_exit_code(code);
    Ok(Value::Int(code))
}

fn collect_command_args(value: &Value, out: &mut Vec<String>) -> Result<(), RuntimeError> {
    match value {
        Value::String(s) => out.push(s.to_string()),
        Value::Int(n) => out.push(n.to_string()),
        Value::List(items) => {
            for item in items.iter() {
                collect_command_args(item, out)?;
            }
        }
        other => {
            return Err(RuntimeError::type_error(
                "$",
                "String, Int or List",
                other.type_name(),
            ));
        }
    }
    Ok(())
}
