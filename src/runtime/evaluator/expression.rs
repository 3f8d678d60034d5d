use crate::{
    runtime::{
        builtins::SHELL_OUT,
        error::RuntimeError,
        value::{Function, Value},
    },
    syntax::{block::Block, expression::Expression},
};

use super::{EvalResult, Evaluator};

impl Evaluator<'_> {
    pub(super) fn eval_expr(&mut self, expression: &Expression) -> EvalResult {
        match expression {
            Expression::Identifier { name, .. } => Ok(self.get_variable(name)?),
            Expression::Integer { value, .. } => Ok(Value::Int(*value)),
            Expression::String { value, .. } => Ok(Value::from(value.as_str())),
            Expression::Boolean { value, .. } => Ok(Value::Bool(*value)),
            Expression::Prefix {
                operator, right, ..
            } => {
                let right = self.eval_expr(right)?;
                Ok(self.eval_prefix(operator, right)?)
            }
            Expression::Infix {
                left,
                operator,
                right,
                ..
            } => match operator.as_str() {
                "&&" | "||" => self.eval_logical(operator, left, right),
                _ => {
                    let left = self.eval_expr(left)?;
                    let right = self.eval_expr(right)?;
                    Ok(self.eval_infix(operator, left, right)?)
                }
            },
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => self.eval_if(condition, consequence, alternative.as_ref()),
            Expression::Function {
                parameters, body, ..
            } => Ok(self.make_closure(None, parameters, body, expression.to_string())),
            Expression::Call {
                function,
                arguments,
                ..
            } => {
                let function = self.eval_expr(function)?;
                let args = self.eval_arguments(arguments)?;
                Ok(self.evaluate_call(&function, args)?)
            }
            Expression::List { elements, .. } => Ok(Value::list(self.eval_arguments(elements)?)),
            Expression::Index { left, index, .. } => {
                let left = self.eval_expr(left)?;
                let index = self.eval_expr(index)?;
                Ok(index_value(left, index)?)
            }
            Expression::ShellOut { arguments, .. } => {
                let args = self.eval_arguments(arguments)?;
                Ok(self.evaluate_call(&Value::Function(Function::Builtin(&SHELL_OUT)), args)?)
            }
        }
    }

    fn eval_arguments(&mut self, arguments: &[Expression]) -> EvalResult<Vec<Value>> {
        arguments
            .iter()
            .map(|argument| self.eval_expr(argument))
            .collect()
    }

    fn eval_if(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> EvalResult {
        match self.eval_expr(condition)? {
            Value::Bool(true) => self.exec_block(consequence),
            Value::Bool(false) => match alternative {
                Some(block) => self.exec_block(block),
                None => Ok(Value::Unit),
            },
            other => Err(RuntimeError::type_error("if", "Bool", other.type_name()).into()),
        }
    }

    fn eval_logical(&mut self, operator: &str, left: &Expression, right: &Expression) -> EvalResult {
        let left = expect_bool(operator, self.eval_expr(left)?)?;
        // Short-circuit: the right side only runs when it decides the result.
        if (operator == "&&" && !left) || (operator == "||" && left) {
            return Ok(Value::Bool(left));
        }
        let right = expect_bool(operator, self.eval_expr(right)?)?;
        Ok(Value::Bool(right))
    }
}

fn expect_bool(operator: &str, value: Value) -> Result<bool, RuntimeError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(RuntimeError::type_error(operator, "Bool", other.type_name())),
    }
}

fn index_value(left: Value, index: Value) -> Result<Value, RuntimeError> {
    match (&left, &index) {
        (Value::List(items), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or(RuntimeError::IndexOutOfBounds {
                index: *i,
                len: items.len(),
            }),
        (Value::List(_), other) => Err(RuntimeError::type_error(
            "index",
            "Int",
            other.type_name(),
        )),
        (other, _) => Err(RuntimeError::type_error(
            "index",
            "List",
            other.type_name(),
        )),
    }
}
