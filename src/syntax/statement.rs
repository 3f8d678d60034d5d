use std::fmt;

use crate::syntax::{Identifier, block::Block, expression::Expression, position::Span};

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Let {
        name: Identifier,
        value: Expression,
        span: Span,
    },
    /// Rebinds an existing name; values themselves never change.
    Assign {
        name: Identifier,
        value: Expression,
        span: Span,
    },
    Return {
        value: Option<Expression>,
        span: Span,
    },
    Expression {
        expression: Expression,
        span: Span,
    },
    Function {
        name: Identifier,
        parameters: Vec<Identifier>,
        body: Block,
        span: Span,
    },
    For {
        variable: Identifier,
        iterable: Expression,
        body: Block,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Let { span, .. }
            | Statement::Assign { span, .. }
            | Statement::Return { span, .. }
            | Statement::Expression { span, .. }
            | Statement::Function { span, .. }
            | Statement::For { span, .. } => *span,
        }
    }

    /// The name this statement binds in its enclosing scope, if any.
    pub fn binding(&self) -> Option<&str> {
        match self {
            Statement::Let { name, .. } | Statement::Function { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value, .. } => write!(f, "let {} = {};", name, value),
            Statement::Assign { name, value, .. } => write!(f, "{} = {};", name, value),
            Statement::Return { value, .. } => match value {
                Some(value) => write!(f, "return {};", value),
                None => write!(f, "return;"),
            },
            Statement::Expression { expression, .. } => write!(f, "{};", expression),
            Statement::Function {
                name,
                parameters,
                body,
                ..
            } => write!(f, "fn {}({}) {}", name, parameters.join(", "), body),
            Statement::For {
                variable,
                iterable,
                body,
                ..
            } => write!(f, "for {} in {} {}", variable, iterable, body),
        }
    }
}
