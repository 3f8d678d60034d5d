use std::{
    collections::{BTreeSet, HashMap},
    path::PathBuf,
};

use crate::{
    cache::FootprintShape,
    runtime::{
        builtins::{PathArgs, get_builtin},
        env::normalize_path,
        value::Value,
    },
    syntax::{Identifier, block::Block, expression::Expression, statement::Statement},
};

/// Nested top-level calls followed before the scan gives up.
const MAX_SCAN_DEPTH: usize = 8;
/// Loop iterations unrolled over a statically known list.
const MAX_UNROLL: usize = 256;

/// Effects a node is known to have before it runs: what the source names
/// literally, plus what earlier runs of the same function observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredEffects {
    pub env_names: BTreeSet<String>,
    pub files_read: BTreeSet<PathBuf>,
    pub files_written: BTreeSet<PathBuf>,
}

impl DeclaredEffects {
    pub fn absorb_shape(&mut self, shape: &FootprintShape) {
        self.env_names.extend(shape.env_names.iter().cloned());
        self.files_read.extend(shape.files_read.iter().cloned());
        self.files_written.extend(shape.files_written.iter().cloned());
    }
}

pub(super) struct FunctionDef<'p> {
    pub parameters: &'p [Identifier],
    pub body: &'p Block,
}

/// Locally known bindings. `None` marks a local whose value is not
/// statically known; it still shadows any global of the same name.
type Bindings = HashMap<String, Option<Value>>;

/// Finds the paths and env names a statement touches through builtins,
/// following calls into top-level functions with their arguments
/// substituted.
pub(super) struct StaticScanner<'p> {
    functions: &'p HashMap<String, FunctionDef<'p>>,
    globals: &'p HashMap<String, Value>,
    effects: DeclaredEffects,
    depth: usize,
}

impl<'p> StaticScanner<'p> {
    pub fn new(
        functions: &'p HashMap<String, FunctionDef<'p>>,
        globals: &'p HashMap<String, Value>,
    ) -> Self {
        Self {
            functions,
            globals,
            effects: DeclaredEffects::default(),
            depth: 0,
        }
    }

    pub fn scan(mut self, statement: &Statement) -> DeclaredEffects {
        let mut bindings = Bindings::new();
        self.scan_statement(statement, &mut bindings);
        self.effects
    }

    fn scan_statement(&mut self, statement: &Statement, bindings: &mut Bindings) {
        match statement {
            Statement::Let { name, value, .. } => {
                self.scan_expr(value, bindings);
                let known = self.static_value(value, bindings);
                bindings.insert(name.clone(), known);
            }
            Statement::Assign { name, value, .. } => {
                self.scan_expr(value, bindings);
                bindings.insert(name.clone(), None);
            }
            Statement::Return { value, .. } => {
                if let Some(value) = value {
                    self.scan_expr(value, bindings);
                }
            }
            Statement::Expression { expression, .. } => self.scan_expr(expression, bindings),
            Statement::Function {
                name,
                parameters,
                body,
                ..
            } => {
                bindings.insert(name.clone(), None);
                self.scan_function_literal(parameters, body, bindings);
            }
            Statement::For {
                variable,
                iterable,
                body,
                ..
            } => {
                self.scan_expr(iterable, bindings);
                match self.static_value(iterable, bindings) {
                    Some(Value::List(items)) if items.len() <= MAX_UNROLL => {
                        for item in items.iter() {
                            let mut inner = bindings.clone();
                            inner.insert(variable.clone(), Some(item.clone()));
                            self.scan_block(body, &inner);
                        }
                    }
                    _ => {
                        let mut inner = bindings.clone();
                        inner.insert(variable.clone(), None);
                        self.scan_block(body, &inner);
                    }
                }
            }
        }
    }

    fn scan_block(&mut self, block: &Block, bindings: &Bindings) {
        let mut inner = bindings.clone();
        for statement in &block.statements {
            self.scan_statement(statement, &mut inner);
        }
    }

    fn scan_function_literal(&mut self, parameters: &[Identifier], body: &Block, bindings: &Bindings) {
        let mut inner = bindings.clone();
        for param in parameters {
            inner.insert(param.clone(), None);
        }
        self.scan_block(body, &inner);
    }

    fn scan_expr(&mut self, expression: &Expression, bindings: &Bindings) {
        match expression {
            Expression::Identifier { .. }
            | Expression::Integer { .. }
            | Expression::String { .. }
            | Expression::Boolean { .. } => {}
            Expression::Prefix { right, .. } => self.scan_expr(right, bindings),
            Expression::Infix { left, right, .. } => {
                self.scan_expr(left, bindings);
                self.scan_expr(right, bindings);
            }
            Expression::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                self.scan_expr(condition, bindings);
                self.scan_block(consequence, bindings);
                if let Some(alternative) = alternative {
                    self.scan_block(alternative, bindings);
                }
            }
            Expression::Function {
                parameters, body, ..
            } => self.scan_function_literal(parameters, body, bindings),
            Expression::Call {
                function,
                arguments,
                ..
            } => {
                self.scan_expr(function, bindings);
                for argument in arguments {
                    self.scan_expr(argument, bindings);
                }
                if let Expression::Identifier { name, .. } = function.as_ref() {
                    if !bindings.contains_key(name) {
                        self.scan_named_call(name, arguments, bindings);
                    }
                }
            }
            Expression::List { elements, .. } | Expression::ShellOut {
                arguments: elements,
                ..
            } => {
                for element in elements {
                    self.scan_expr(element, bindings);
                }
            }
            Expression::Index { left, index, .. } => {
                self.scan_expr(left, bindings);
                self.scan_expr(index, bindings);
            }
        }
    }

    fn scan_named_call(&mut self, name: &str, arguments: &[Expression], bindings: &Bindings) {
        if let Some(function) = self.functions.get(name) {
            if self.depth >= MAX_SCAN_DEPTH {
                return;
            }
            let mut callee = Bindings::new();
            for (i, param) in function.parameters.iter().enumerate() {
                let value = arguments
                    .get(i)
                    .and_then(|argument| self.static_value(argument, bindings));
                callee.insert(param.clone(), value);
            }
            self.depth += 1;
            self.scan_block(function.body, &callee);
            self.depth -= 1;
            return;
        }
        if self.globals.contains_key(name) {
            return;
        }
        let Some(builtin) = get_builtin(name) else {
            return;
        };

        if builtin.contract.reads_env {
            if let Some(Value::String(env_name)) = arguments
                .first()
                .and_then(|argument| self.static_value(argument, bindings))
            {
                self.effects.env_names.insert(env_name.to_string());
            }
        }

        let path_arguments = match builtin.path_args {
            PathArgs::None => return,
            PathArgs::First => arguments.get(..1).unwrap_or(&[]),
            PathArgs::All => arguments,
        };
        let mut paths = BTreeSet::new();
        for argument in path_arguments {
            if let Some(value) = self.static_value(argument, bindings) {
                collect_paths(&value, &mut paths);
            }
        }
        if builtin.contract.reads_files {
            self.effects.files_read.extend(paths.iter().cloned());
        }
        if builtin.contract.writes_files {
            self.effects.files_written.extend(paths);
        }
    }

    /// The value of `expression` if it can be known without running
    /// anything.
    fn static_value(&self, expression: &Expression, bindings: &Bindings) -> Option<Value> {
        match expression {
            Expression::String { value, .. } => Some(Value::from(value.as_str())),
            Expression::Integer { value, .. } => Some(Value::Int(*value)),
            Expression::Boolean { value, .. } => Some(Value::Bool(*value)),
            Expression::Identifier { name, .. } => match bindings.get(name) {
                Some(known) => known.clone(),
                None => self
                    .globals
                    .get(name)
                    .filter(|value| !value.contains_function())
                    .cloned(),
            },
            Expression::List { elements, .. } => elements
                .iter()
                .map(|element| self.static_value(element, bindings))
                .collect::<Option<Vec<_>>>()
                .map(Value::list),
            Expression::Infix {
                left,
                operator,
                right,
                ..
            } if operator == "+" => {
                match (
                    self.static_value(left, bindings)?,
                    self.static_value(right, bindings)?,
                ) {
                    (Value::String(l), Value::String(r)) => {
                        Some(Value::from(format!("{}{}", l, r)))
                    }
                    (Value::List(l), Value::List(r)) => {
                        Some(Value::list(l.iter().chain(r.iter()).cloned().collect()))
                    }
                    _ => None,
                }
            }
            Expression::Index { left, index, .. } => {
                match (
                    self.static_value(left, bindings)?,
                    self.static_value(index, bindings)?,
                ) {
                    (Value::List(items), Value::Int(i)) => {
                        usize::try_from(i).ok().and_then(|i| items.get(i).cloned())
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn collect_paths(value: &Value, out: &mut BTreeSet<PathBuf>) {
    match value {
        Value::String(path) => {
            out.insert(normalize_path(path));
        }
        Value::List(items) => {
            for item in items.iter() {
                collect_paths(item, out);
            }
        }
        _ => {}
    }
}
