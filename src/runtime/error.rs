use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while evaluating a script. Any of these fails the call
/// that raised it; a non-zero shell-out exit status is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("`{function}` expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: String,
        got: usize,
    },

    #[error("`{operation}` expected {expected}, got {got}")]
    Type {
        operation: String,
        expected: String,
        got: String,
    },

    #[error("environment variable `{name}` is not set")]
    MissingEnvVar { name: String },

    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in `{operation}`")]
    Overflow { operation: String },

    #[error("{message}")]
    ScriptFailure { message: String },

    #[error("{}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("could not run `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("`return` outside of a function")]
    ReturnOutsideFunction,

    #[error("cannot assign to top-level binding `{name}` from inside a build step")]
    AssignToGlobal { name: String },
}

impl RuntimeError {
    pub fn type_error(
        operation: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        RuntimeError::Type {
            operation: operation.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        RuntimeError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
