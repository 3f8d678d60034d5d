use std::fmt;

use crate::syntax::{position::Span, statement::Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
    pub span: Span,
}

impl Program {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for statement in &self.statements {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{}", statement)?;
            first = false;
        }
        Ok(())
    }
}
