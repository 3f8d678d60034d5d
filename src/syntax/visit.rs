use crate::syntax::{block::Block, expression::Expression, program::Program, statement::Statement};

/// Read-only AST visitor.
///
/// Every `visit_*` method has a default that calls the corresponding `walk_*`
/// free function, which recurses into child nodes. Override a method to
/// intercept a node and call `walk_*` from the override to keep descending.
pub trait Visitor<'ast> {
    fn visit_program(&mut self, program: &'ast Program) {
        walk_program(self, program);
    }

    fn visit_block(&mut self, block: &'ast Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &'ast Statement) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expression) {
        walk_expr(self, expr);
    }
}

// Exhaustive destructuring: a new field or variant fails to compile here
// until the walk is updated.

pub fn walk_program<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, program: &'ast Program) {
    let Program {
        statements,
        span: _,
    } = program;
    for stmt in statements {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_block<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, block: &'ast Block) {
    let Block {
        statements,
        span: _,
    } = block;
    for stmt in statements {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmt: &'ast Statement) {
    match stmt {
        Statement::Let {
            name: _,
            value,
            span: _,
        }
        | Statement::Assign {
            name: _,
            value,
            span: _,
        } => visitor.visit_expr(value),
        Statement::Return { value, span: _ } => {
            if let Some(expr) = value {
                visitor.visit_expr(expr);
            }
        }
        Statement::Expression {
            expression,
            span: _,
        } => visitor.visit_expr(expression),
        Statement::Function {
            name: _,
            parameters: _,
            body,
            span: _,
        } => visitor.visit_block(body),
        Statement::For {
            variable: _,
            iterable,
            body,
            span: _,
        } => {
            visitor.visit_expr(iterable);
            visitor.visit_block(body);
        }
    }
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, expr: &'ast Expression) {
    match expr {
        Expression::Identifier { .. }
        | Expression::Integer { .. }
        | Expression::String { .. }
        | Expression::Boolean { .. } => {}
        Expression::Prefix {
            operator: _,
            right,
            span: _,
        } => visitor.visit_expr(right),
        Expression::Infix {
            left,
            operator: _,
            right,
            span: _,
        } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expression::If {
            condition,
            consequence,
            alternative,
            span: _,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_block(consequence);
            if let Some(alt) = alternative {
                visitor.visit_block(alt);
            }
        }
        Expression::Function {
            parameters: _,
            body,
            span: _,
        } => visitor.visit_block(body),
        Expression::Call {
            function,
            arguments,
            span: _,
        } => {
            visitor.visit_expr(function);
            for arg in arguments {
                visitor.visit_expr(arg);
            }
        }
        Expression::List { elements, span: _ } => {
            for element in elements {
                visitor.visit_expr(element);
            }
        }
        Expression::Index {
            left,
            index,
            span: _,
        } => {
            visitor.visit_expr(left);
            visitor.visit_expr(index);
        }
        Expression::ShellOut { arguments, span: _ } => {
            for arg in arguments {
                visitor.visit_expr(arg);
            }
        }
    }
}
