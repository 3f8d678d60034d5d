use std::collections::HashSet;

use crate::syntax::{
    block::Block,
    expression::Expression,
    statement::Statement,
    visit::{self, Visitor},
};

/// Collects identifiers that are referenced but not bound in scope.
struct FreeVarCollector {
    scopes: Vec<HashSet<String>>,
    free: HashSet<String>,
}

impl FreeVarCollector {
    fn new() -> Self {
        Self {
            scopes: vec![HashSet::new()],
            free: HashSet::new(),
        }
    }

    fn define(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn reference(&mut self, name: &str) {
        if !self.is_bound(name) {
            self.free.insert(name.to_string());
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }
}

impl<'ast> Visitor<'ast> for FreeVarCollector {
    fn visit_block(&mut self, block: &'ast Block) {
        self.push_scope();
        visit::walk_block(self, block);
        self.pop_scope();
    }

    fn visit_stmt(&mut self, stmt: &'ast Statement) {
        match stmt {
            Statement::Let { name, value, .. } => {
                // The value cannot see the binding it initialises.
                self.visit_expr(value);
                self.define(name);
            }
            Statement::Assign { name, value, .. } => {
                self.reference(name);
                self.visit_expr(value);
            }
            Statement::Function {
                name,
                parameters,
                body,
                ..
            } => {
                // Defined before the body so recursion is not free.
                self.define(name);
                self.push_scope();
                for param in parameters {
                    self.define(param);
                }
                self.visit_block(body);
                self.pop_scope();
            }
            Statement::For {
                variable,
                iterable,
                body,
                ..
            } => {
                self.visit_expr(iterable);
                self.push_scope();
                self.define(variable);
                self.visit_block(body);
                self.pop_scope();
            }
            _ => visit::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &'ast Expression) {
        match expr {
            Expression::Identifier { name, .. } => self.reference(name),
            Expression::Function {
                parameters, body, ..
            } => {
                self.push_scope();
                for param in parameters {
                    self.define(param);
                }
                self.visit_block(body);
                self.pop_scope();
            }
            _ => visit::walk_expr(self, expr),
        }
    }
}

/// Collect free variables in an expression.
pub fn collect_free_vars(expr: &Expression) -> HashSet<String> {
    let mut collector = FreeVarCollector::new();
    collector.visit_expr(expr);
    collector.free
}

/// Collect what a function body needs from its surroundings, with the
/// parameters bound.
pub fn collect_free_vars_in_function(parameters: &[String], body: &Block) -> HashSet<String> {
    let mut collector = FreeVarCollector::new();
    for param in parameters {
        collector.define(param);
    }
    collector.visit_block(body);
    collector.free
}

/// Collect free variables of a single statement.
///
/// For a function statement the function's own name and parameters are
/// bound, so the result is what the body needs from its surroundings.
pub fn collect_free_vars_in_statement(stmt: &Statement) -> HashSet<String> {
    let mut collector = FreeVarCollector::new();
    collector.visit_stmt(stmt);
    collector.free
}
