use std::collections::HashMap;

use crate::{
    runtime::{
        builtins::{BuiltinContext, get_builtin},
        effects::{EffectFootprint, FootprintRecorder},
        env::Host,
        error::RuntimeError,
        value::{Function, Value},
    },
    syntax::{expression::Expression, program::Program, statement::Statement},
};

mod binary_ops;
mod expression;
mod function_call;
mod statement;

/// Deepest user-function nesting before evaluation gives up.
pub const MAX_CALL_DEPTH: usize = 64;

/// Non-local exits threaded through evaluation with `?`.
enum Signal {
    Error(RuntimeError),
    Return(Value),
}

impl From<RuntimeError> for Signal {
    fn from(err: RuntimeError) -> Self {
        Signal::Error(err)
    }
}

type EvalResult<T = Value> = Result<T, Signal>;

/// Tree-walking interpreter for one evaluation context.
///
/// `scopes[0]` holds top-level bindings; every block, loop body and call
/// frame pushes one more scope. A user function sees its captured locals,
/// its parameters and the top-level scope, never the caller's locals.
///
/// Every call runs inside its own footprint frame on `recorder`, so after an
/// evaluation the root footprint describes everything it touched.
pub struct Evaluator<'h> {
    scopes: Vec<HashMap<String, Value>>,
    host: &'h Host,
    recorder: FootprintRecorder,
    call_depth: usize,
    globals_writable: bool,
}

impl<'h> Evaluator<'h> {
    pub fn new(globals: HashMap<String, Value>, host: &'h Host) -> Self {
        Self {
            scopes: vec![globals],
            host,
            recorder: FootprintRecorder::new(),
            call_depth: 0,
            globals_writable: true,
        }
    }

    /// Rejects assignments to top-level bindings. Build steps run against a
    /// private copy of the globals, so such an assignment would be lost.
    pub fn with_frozen_globals(mut self) -> Self {
        self.globals_writable = false;
        self
    }

    pub fn host(&self) -> &Host {
        self.host
    }

    /// Resolves a name the way an identifier expression would.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .or_else(|| {
                get_builtin(name).map(|builtin| Value::Function(Function::Builtin(builtin)))
            })
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    /// Runs statements at top level. Returns the value of the last one
    /// (Unit for anything but an expression statement).
    pub fn eval_program(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        let mut last = Value::Unit;
        for statement in &program.statements {
            last = self.eval_statement(statement)?;
        }
        Ok(last)
    }

    pub fn eval_statement(&mut self, statement: &Statement) -> Result<Value, RuntimeError> {
        self.exec_statement(statement).map_err(top_level_error)
    }

    pub fn eval_expression(&mut self, expression: &Expression) -> Result<Value, RuntimeError> {
        self.eval_expr(expression).map_err(top_level_error)
    }

    /// Calls `function` with already evaluated arguments.
    pub fn evaluate_call(
        &mut self,
        function: &Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let Value::Function(function) = function else {
            return Err(RuntimeError::type_error(
                "call",
                "Function",
                function.type_name(),
            ));
        };

        self.recorder.begin_call();
        let result = match function {
            Function::User(closure) => self.call_closure(closure, args),
            Function::Builtin(builtin) => (builtin.func)(self, args),
        };
        let footprint = self.recorder.end_call();

        if let Function::Builtin(builtin) = function {
            if !builtin.contract.allows(&footprint) {
                log::warn!(
                    "builtin `{}` recorded effects outside its contract: {:?}",
                    builtin.name,
                    footprint
                );
            }
        }
        result
    }

    /// Everything recorded since the last call to this method.
    pub fn take_footprint(&mut self) -> EffectFootprint {
        self.recorder.take()
    }

    pub fn into_globals(mut self) -> HashMap<String, Value> {
        self.scopes.truncate(1);
        self.scopes.pop().unwrap_or_default()
    }

    fn push_scope(&mut self, scope: HashMap<String, Value>) {
        self.scopes.push(scope);
    }

    fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    fn get_variable(&self, name: &str) -> Result<Value, RuntimeError> {
        self.lookup(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn assign_variable(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        let Some(index) = self
            .scopes
            .iter()
            .rposition(|scope| scope.contains_key(name))
        else {
            return Err(RuntimeError::UndefinedVariable {
                name: name.to_string(),
            });
        };
        if index == 0 && !self.globals_writable {
            return Err(RuntimeError::AssignToGlobal {
                name: name.to_string(),
            });
        }
        self.scopes[index].insert(name.to_string(), value);
        Ok(())
    }
}

impl BuiltinContext for Evaluator<'_> {
    fn recorder(&mut self) -> &mut FootprintRecorder {
        &mut self.recorder
    }

    fn host(&self) -> &Host {
        self.host
    }
}

fn top_level_error(signal: Signal) -> RuntimeError {
    match signal {
        Signal::Error(err) => err,
        Signal::Return(_) => RuntimeError::ReturnOutsideFunction,
    }
}
