use std::{collections::HashMap, fmt};

use crate::runtime::{
    effects::{EffectFootprint, FootprintRecorder},
    env::Host,
    error::RuntimeError,
    value::Value,
};

mod core_ops;
mod env_ops;
mod fs_ops;
mod helpers;
mod process_ops;

use core_ops::{builtin_fail, builtin_len, builtin_print, builtin_str, builtin_uncached};
use env_ops::builtin_getenv;
use fs_ops::{builtin_read_file, builtin_reads, builtin_write_file, builtin_writes};
use process_ops::builtin_shell_out;

pub type BuiltinFn = fn(&mut dyn BuiltinContext, Vec<Value>) -> Result<Value, RuntimeError>;

/// What a builtin may reach while it runs.
pub trait BuiltinContext {
    /// Footprint of the builtin call currently executing.
    fn recorder(&mut self) -> &mut FootprintRecorder;
    fn host(&self) -> &Host;
}

/// The effects a builtin is allowed to record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectContract {
    pub reads_env: bool,
    pub reads_files: bool,
    pub writes_files: bool,
    pub spawns_process: bool,
    pub volatile: bool,
}

impl EffectContract {
    pub const PURE: EffectContract = EffectContract {
        reads_env: false,
        reads_files: false,
        writes_files: false,
        spawns_process: false,
        volatile: false,
    };

    pub fn is_pure(&self) -> bool {
        *self == Self::PURE
    }

    /// Whether `footprint` stays within this contract.
    pub fn allows(&self, footprint: &EffectFootprint) -> bool {
        (self.reads_env || footprint.env_reads.is_empty())
            && (self.reads_files || footprint.files_read.is_empty())
            && (self.writes_files || footprint.files_written.is_empty())
            && (self.spawns_process || footprint.exit_code.is_none())
            && (self.volatile || !footprint.volatile)
    }
}

/// Which arguments of a builtin name files. Lets a planner find declared
/// paths without running anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathArgs {
    None,
    First,
    All,
}

#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: BuiltinFn,
    pub contract: EffectContract,
    pub path_args: PathArgs,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFunction({})", self.name)
    }
}

const READS_ENV: EffectContract = EffectContract {
    reads_env: true,
    ..EffectContract::PURE
};

const READS_FILES: EffectContract = EffectContract {
    reads_files: true,
    ..EffectContract::PURE
};

const WRITES_FILES: EffectContract = EffectContract {
    writes_files: true,
    ..EffectContract::PURE
};

/// Builtins callable by name.
pub static BUILTINS: &[BuiltinFunction] = &[
    BuiltinFunction {
        name: "getenv",
        func: builtin_getenv,
        contract: READS_ENV,
        path_args: PathArgs::None,
    },
    BuiltinFunction {
        name: "read_file",
        func: builtin_read_file,
        contract: READS_FILES,
        path_args: PathArgs::First,
    },
    BuiltinFunction {
        name: "write_file",
        func: builtin_write_file,
        contract: WRITES_FILES,
        path_args: PathArgs::First,
    },
    BuiltinFunction {
        name: "reads",
        func: builtin_reads,
        contract: READS_FILES,
        path_args: PathArgs::All,
    },
    BuiltinFunction {
        name: "writes",
        func: builtin_writes,
        contract: WRITES_FILES,
        path_args: PathArgs::All,
    },
    BuiltinFunction {
        name: "len",
        func: builtin_len,
        contract: EffectContract::PURE,
        path_args: PathArgs::None,
    },
    BuiltinFunction {
        name: "str",
        func: builtin_str,
        contract: EffectContract::PURE,
        path_args: PathArgs::None,
    },
    BuiltinFunction {
        name: "print",
        func: builtin_print,
        contract: EffectContract::PURE,
        path_args: PathArgs::None,
    },
    BuiltinFunction {
        name: "fail",
        func: builtin_fail,
        contract: EffectContract::PURE,
        path_args: PathArgs::None,
    },
    BuiltinFunction {
        name: "uncached",
        func: builtin_uncached,
        contract: EffectContract {
            volatile: true,
            ..EffectContract::PURE
        },
        path_args: PathArgs::None,
    },
];

/// The `$(...)` shell-out form. Not reachable by name.
pub static SHELL_OUT: BuiltinFunction = BuiltinFunction {
    name: "$",
    func: builtin_shell_out,
    contract: EffectContract {
        spawns_process: true,
        ..EffectContract::PURE
    },
    path_args: PathArgs::None,
};

pub fn get_builtin(name: &str) -> Option<&'static BuiltinFunction> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

/// Bindings every program starts with. `args` carries the invocation's
/// argument vector.
pub fn prelude(args: &[String]) -> HashMap<String, Value> {
    let args = args.iter().map(|arg| Value::from(arg.as_str())).collect();
    HashMap::from([("args".to_string(), Value::list(args))])
}

#[cfg(test)]
mod builtins_test;
