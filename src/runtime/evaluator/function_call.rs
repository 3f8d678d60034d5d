use std::{collections::HashMap, sync::Arc};

use crate::{
    runtime::{
        error::RuntimeError,
        value::{Closure, Function, Value},
    },
    syntax::{Identifier, block::Block},
};

use super::{Evaluator, MAX_CALL_DEPTH, Signal};

impl Evaluator<'_> {
    /// Builds a closure over the current locals. Top-level bindings are not
    /// captured; a function reads them when it runs.
    pub(super) fn make_closure(
        &self,
        name: Option<Identifier>,
        parameters: &[Identifier],
        body: &Block,
        definition: String,
    ) -> Value {
        let mut captured = HashMap::new();
        for scope in self.scopes.iter().skip(1) {
            for (key, value) in scope {
                captured.insert(key.clone(), value.clone());
            }
        }

        Value::Function(Function::User(Arc::new(Closure {
            name,
            parameters: parameters.to_vec(),
            body: body.clone(),
            captured,
            definition,
        })))
    }

    pub(super) fn call_closure(
        &mut self,
        closure: &Arc<Closure>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if args.len() != closure.parameters.len() {
            return Err(RuntimeError::Arity {
                function: closure.name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
                expected: closure.parameters.len().to_string(),
                got: args.len(),
            });
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded {
                limit: MAX_CALL_DEPTH,
            });
        }

        let mut frame = HashMap::new();
        if let Some(name) = &closure.name {
            frame.insert(name.clone(), Value::Function(Function::User(closure.clone())));
        }
        frame.extend(closure.parameters.iter().cloned().zip(args));

        let caller_scopes = self.scopes.split_off(1);
        self.push_scope(closure.captured.clone());
        self.push_scope(frame);
        self.call_depth += 1;

        let result = self.exec_block(&closure.body);

        self.call_depth -= 1;
        self.scopes.truncate(1);
        self.scopes.extend(caller_scopes);

        match result {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Error(err)) => Err(err),
        }
    }
}
