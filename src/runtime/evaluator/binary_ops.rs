use std::{cmp::Ordering, sync::Arc};

use crate::runtime::{error::RuntimeError, value::Value};

use super::Evaluator;

impl Evaluator<'_> {
    pub(super) fn eval_prefix(&self, operator: &str, right: Value) -> Result<Value, RuntimeError> {
        match (operator, right) {
            ("-", Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(overflow("-")),
            ("!", Value::Bool(b)) => Ok(Value::Bool(!b)),
            ("-", other) => Err(RuntimeError::type_error("-", "Int", other.type_name())),
            (_, other) => Err(RuntimeError::type_error(
                operator,
                "Bool",
                other.type_name(),
            )),
        }
    }

    pub(super) fn eval_infix(
        &self,
        operator: &str,
        left: Value,
        right: Value,
    ) -> Result<Value, RuntimeError> {
        match operator {
            "==" => Ok(Value::Bool(left == right)),
            "!=" => Ok(Value::Bool(left != right)),
            "<" | ">" | "<=" | ">=" => compare(operator, &left, &right),
            "+" => add(left, right),
            "-" | "*" | "/" | "%" => arithmetic(operator, &left, &right),
            _ => Err(RuntimeError::type_error(
                operator,
                "a known operator",
                format!("{} {} {}", left.type_name(), operator, right.type_name()),
            )),
        }
    }
}

fn overflow(operation: &str) -> RuntimeError {
    RuntimeError::Overflow {
        operation: operation.to_string(),
    }
}

fn add(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => l.checked_add(r).map(Value::Int).ok_or(overflow("+")),
        (Value::String(l), Value::String(r)) => Ok(Value::from(format!("{}{}", l, r))),
        (Value::List(l), Value::List(r)) => {
            let mut items = Vec::with_capacity(l.len() + r.len());
            items.extend(l.iter().cloned());
            items.extend(r.iter().cloned());
            Ok(Value::List(Arc::new(items)))
        }
        (l, r) => Err(RuntimeError::type_error(
            "+",
            "Int + Int, String + String or List + List",
            format!("{} + {}", l.type_name(), r.type_name()),
        )),
    }
}

fn arithmetic(operator: &str, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let (Value::Int(l), Value::Int(r)) = (left, right) else {
        return Err(RuntimeError::type_error(
            operator,
            "Int operands",
            format!("{} {} {}", left.type_name(), operator, right.type_name()),
        ));
    };
    if *r == 0 && (operator == "/" || operator == "%") {
        return Err(RuntimeError::DivisionByZero);
    }
    let result = match operator {
        "-" => l.checked_sub(*r),
        "*" => l.checked_mul(*r),
        "/" => l.checked_div(*r),
        _ => l.checked_rem(*r),
    };
    result.map(Value::Int).ok_or_else(|| overflow(operator))
}

fn compare(operator: &str, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let ordering: Ordering = match (left, right) {
        (Value::Int(l), Value::Int(r)) => l.cmp(r),
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => {
            return Err(RuntimeError::type_error(
                operator,
                "two Ints or two Strings",
                format!("{} {} {}", left.type_name(), operator, right.type_name()),
            ));
        }
    };
    let result = match operator {
        "<" => ordering.is_lt(),
        ">" => ordering.is_gt(),
        "<=" => ordering.is_le(),
        _ => ordering.is_ge(),
    };
    Ok(Value::Bool(result))
}
