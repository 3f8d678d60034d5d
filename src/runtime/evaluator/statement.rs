use std::collections::HashMap;

use crate::{
    runtime::{error::RuntimeError, value::Value},
    syntax::{block::Block, expression::Expression, statement::Statement},
};

use super::{EvalResult, Evaluator, Signal};

impl Evaluator<'_> {
    /// Executes one statement. Expression statements produce their value,
    /// everything else produces Unit.
    pub(super) fn exec_statement(&mut self, statement: &Statement) -> EvalResult {
        match statement {
            Statement::Let { name, value, .. } => {
                let value = self.eval_expr(value)?;
                self.define(name.clone(), value);
                Ok(Value::Unit)
            }
            Statement::Assign { name, value, .. } => {
                let value = self.eval_expr(value)?;
                self.assign_variable(name, value)?;
                Ok(Value::Unit)
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.eval_expr(value)?,
                    None => Value::Unit,
                };
                Err(Signal::Return(value))
            }
            Statement::Expression { expression, .. } => self.eval_expr(expression),
            Statement::Function {
                name,
                parameters,
                body,
                ..
            } => {
                let closure =
                    self.make_closure(Some(name.clone()), parameters, body, statement.to_string());
                self.define(name.clone(), closure);
                Ok(Value::Unit)
            }
            Statement::For {
                variable,
                iterable,
                body,
                ..
            } => self.exec_for(variable, iterable, body),
        }
    }

    /// Runs a block in a fresh scope. The block's value is its trailing
    /// expression statement, or Unit.
    pub(super) fn exec_block(&mut self, block: &Block) -> EvalResult {
        self.push_scope(HashMap::new());
        let result = self.exec_statements(&block.statements);
        self.pop_scope();
        result
    }

    fn exec_statements(&mut self, statements: &[Statement]) -> EvalResult {
        let mut last = Value::Unit;
        for statement in statements {
            last = self.exec_statement(statement)?;
        }
        match statements.last() {
            Some(Statement::Expression { .. }) => Ok(last),
            _ => Ok(Value::Unit),
        }
    }

    fn exec_for(&mut self, variable: &str, iterable: &Expression, body: &Block) -> EvalResult {
        let items = match self.eval_expr(iterable)? {
            Value::List(items) => items,
            other => {
                return Err(RuntimeError::type_error("for", "List", other.type_name()).into());
            }
        };

        for item in items.iter() {
            self.push_scope(HashMap::from([(variable.to_string(), item.clone())]));
            let result = self.exec_block(body);
            self.pop_scope();
            result?;
        }
        Ok(Value::Unit)
    }
}
