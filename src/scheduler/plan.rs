//! Turns a parsed script into prelude bindings and call nodes.
//!
//! `fn` statements are hoisted and, together with every top-level statement
//! that cannot affect the outside world, evaluated eagerly into the
//! *prelude*. Everything else becomes a node: a direct call of a top-level
//! function, of an effectful builtin or a shell-out is a cacheable step, any
//! other effectful statement an inline node that always runs.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use thiserror::Error;

use crate::{
    cache::{CallCache, FunctionId},
    runtime::{
        builtins::{BuiltinFunction, SHELL_OUT, get_builtin, prelude},
        digest::ContentHasher,
        env::Host,
        error::RuntimeError,
        evaluator::Evaluator,
        value::{Function, Value},
    },
    syntax::{
        expression::Expression,
        free_vars::{collect_free_vars_in_function, collect_free_vars_in_statement},
        position::Position,
        program::Program,
        statement::Statement,
        visit::{self, Visitor},
    },
};

use super::{
    declared::{DeclaredEffects, FunctionDef, StaticScanner},
    graph::{DependencyGraph, EdgeKind},
};

const TAG_FUNCTION_ID: u8 = 0x49;
const TAG_BUILTIN_STEP: u8 = 0x4a;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{position}: cannot assign to `{name}` at top level; use `let`")]
    TopLevelAssign { name: String, position: Position },

    #[error("{position}: `return` outside of a function")]
    TopLevelReturn { position: Position },

    #[error("{position}: `{name}` is already bound at top level")]
    DuplicateBinding { name: String, position: Position },

    #[error("{position}: {source}")]
    Prelude {
        position: Position,
        #[source]
        source: RuntimeError,
    },
}

/// `f(args)` or `let x = f(args)` with `f` a top-level function, an
/// effectful builtin, or `$` for a shell-out.
#[derive(Debug, Clone)]
pub struct StepCall {
    pub function: FunctionId,
    pub callee: String,
    /// Set when the step calls a builtin directly.
    pub builtin: Option<&'static BuiltinFunction>,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Step(StepCall),
    /// Any other effectful statement. Never cached.
    Inline,
}

#[derive(Debug, Clone)]
pub struct PlannedNode {
    pub index: usize,
    pub name: String,
    /// The top-level name this node's value is bound to.
    pub binding: Option<String>,
    pub statement: Statement,
    pub kind: NodeKind,
    /// Bindings of earlier nodes this node reads, sorted.
    pub inputs: Vec<String>,
    pub declared: DeclaredEffects,
}

impl PlannedNode {
    pub fn is_step(&self) -> bool {
        matches!(self.kind, NodeKind::Step(_))
    }

    pub fn step(&self) -> Option<&StepCall> {
        match &self.kind {
            NodeKind::Step(step) => Some(step),
            NodeKind::Inline => None,
        }
    }

    pub fn function(&self) -> Option<FunctionId> {
        self.step().map(|step| step.function)
    }
}

/// Everything needed to run a script.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub globals: Arc<HashMap<String, Value>>,
    pub nodes: Vec<PlannedNode>,
    pub graph: DependencyGraph,
}

impl BuildPlan {
    pub fn node_index(&self, binding: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|node| node.binding.as_deref() == Some(binding))
    }
}

/// Plans `program`. Prelude statements run here, against `host`; learned
/// shapes in `cache` widen each step's declared effects.
pub fn plan(
    program: &Program,
    host: &Host,
    args: &[String],
    cache: &CallCache,
) -> Result<BuildPlan, PlanError> {
    let mut functions: HashMap<String, FunctionDef<'_>> = HashMap::new();
    let mut definitions: HashMap<String, String> = HashMap::new();
    let mut evaluator = Evaluator::new(prelude(args), host);

    for statement in &program.statements {
        if let Statement::Function {
            name,
            parameters,
            body,
            ..
        } = statement
        {
            if functions.contains_key(name) || name == "args" {
                return Err(duplicate(name, statement));
            }
            functions.insert(name.clone(), FunctionDef { parameters, body });
            definitions.insert(name.clone(), statement.to_string());
            evaluator
                .eval_statement(statement)
                .map_err(|source| prelude_error(statement, source))?;
        }
    }

    let mut nodes: Vec<PlannedNode> = Vec::new();
    let mut node_bindings: HashMap<String, usize> = HashMap::new();
    let mut prelude_names: HashSet<String> = HashSet::from(["args".to_string()]);
    prelude_names.extend(functions.keys().cloned());

    for statement in &program.statements {
        match statement {
            Statement::Function { .. } => continue,
            Statement::Assign { name, .. } => {
                return Err(PlanError::TopLevelAssign {
                    name: name.clone(),
                    position: statement.span().start,
                });
            }
            Statement::Return { .. } => {
                return Err(PlanError::TopLevelReturn {
                    position: statement.span().start,
                });
            }
            _ => {}
        }

        let binding = statement.binding().map(str::to_string);
        if let Some(name) = &binding {
            if prelude_names.contains(name) || node_bindings.contains_key(name) {
                return Err(duplicate(name, statement));
            }
        }

        let snapshot = evaluator_globals(&evaluator, &prelude_names);
        let reach = Reachability {
            functions: &functions,
            globals: &snapshot,
        };
        let reachable = reach.closure(collect_free_vars_in_statement(statement));
        let calls = CallScan::scan(statement, &functions, &prelude_names);
        let inputs: Vec<String> = reachable
            .iter()
            .filter(|name| node_bindings.contains_key(*name))
            .cloned()
            .collect();

        if !calls.effectful && inputs.is_empty() {
            evaluator
                .eval_statement(statement)
                .map_err(|source| prelude_error(statement, source))?;
            if let Some(name) = binding {
                prelude_names.insert(name);
            }
            continue;
        }

        let index = nodes.len();
        let kind = match step_call(statement, &functions, &prelude_names) {
            Some(site) => {
                let function = match site.builtin {
                    Some(builtin) => builtin_step_id(builtin, site.call),
                    None => function_id(
                        &site.callee,
                        &reach.closure([site.callee.clone()]),
                        &definitions,
                        &snapshot,
                    ),
                };
                NodeKind::Step(StepCall {
                    function,
                    callee: site.callee,
                    builtin: site.builtin,
                    arguments: site.arguments.to_vec(),
                })
            }
            None => NodeKind::Inline,
        };

        let mut declared = StaticScanner::new(&functions, &snapshot).scan(statement);
        if let NodeKind::Step(step) = &kind {
            if let Some(shape) = cache.shape(&step.function) {
                declared.absorb_shape(&shape);
            }
        }

        let name = match (&binding, &kind) {
            (Some(name), _) => name.clone(),
            (None, NodeKind::Step(step)) => format!("{}#{}", step.callee, index),
            (None, NodeKind::Inline) => format!("stmt#{}", index),
        };
        if let Some(name) = &binding {
            node_bindings.insert(name.clone(), index);
        }
        nodes.push(PlannedNode {
            index,
            name,
            binding,
            statement: statement.clone(),
            kind,
            inputs,
            declared,
        });
    }

    let mut graph = DependencyGraph::new(nodes.len());
    for node in &nodes {
        for input in &node.inputs {
            graph.add_edge(node_bindings[input], node.index, EdgeKind::Data);
        }
    }
    for (later, node) in nodes.iter().enumerate() {
        for earlier in &nodes[..later] {
            if effects_overlap(&earlier.declared, &node.declared) {
                graph.add_edge(earlier.index, node.index, EdgeKind::Effect);
            }
        }
    }

    let globals = evaluator.into_globals();
    log::debug!(
        "planned {} node(s) over {} prelude binding(s)",
        nodes.len(),
        globals.len()
    );
    Ok(BuildPlan {
        globals: Arc::new(globals),
        nodes,
        graph,
    })
}

fn duplicate(name: &str, statement: &Statement) -> PlanError {
    PlanError::DuplicateBinding {
        name: name.to_string(),
        position: statement.span().start,
    }
}

fn prelude_error(statement: &Statement, source: RuntimeError) -> PlanError {
    PlanError::Prelude {
        position: statement.span().start,
        source,
    }
}

fn evaluator_globals(evaluator: &Evaluator<'_>, names: &HashSet<String>) -> HashMap<String, Value> {
    names
        .iter()
        .filter_map(|name| evaluator.lookup(name).map(|value| (name.clone(), value)))
        .collect()
}

/// Whether two nodes must not run concurrently: one writes what the other
/// reads or writes.
fn effects_overlap(earlier: &DeclaredEffects, later: &DeclaredEffects) -> bool {
    !earlier.files_written.is_disjoint(&later.files_read)
        || !earlier.files_read.is_disjoint(&later.files_written)
        || !earlier.files_written.is_disjoint(&later.files_written)
}

struct CallSite<'s> {
    callee: String,
    builtin: Option<&'static BuiltinFunction>,
    call: &'s Expression,
    arguments: &'s [Expression],
}

/// `f(args)` / `let x = f(args)` where `f` is a top-level function or an
/// effectful builtin, or a bare shell-out, and no argument needs anything
/// but pure builtins.
fn step_call<'s>(
    statement: &'s Statement,
    functions: &HashMap<String, FunctionDef<'_>>,
    prelude_names: &HashSet<String>,
) -> Option<CallSite<'s>> {
    let call = match statement {
        Statement::Let { value, .. } => value,
        Statement::Expression { expression, .. } => expression,
        _ => return None,
    };
    let (callee, builtin, arguments) = match call {
        Expression::ShellOut { arguments, .. } => ("$".to_string(), Some(&SHELL_OUT), arguments),
        Expression::Call {
            function,
            arguments,
            ..
        } => {
            let Expression::Identifier { name, .. } = function.as_ref() else {
                return None;
            };
            if functions.contains_key(name) {
                (name.clone(), None, arguments)
            } else if prelude_names.contains(name) {
                return None;
            } else {
                match get_builtin(name) {
                    Some(builtin) if !builtin.contract.is_pure() => {
                        (name.clone(), Some(builtin), arguments)
                    }
                    _ => return None,
                }
            }
        }
        _ => return None,
    };
    let benign = arguments
        .iter()
        .all(|argument| !ArgumentScan::needs_runtime(argument, prelude_names));
    benign.then(|| CallSite {
        callee,
        builtin,
        call,
        arguments: arguments.as_slice(),
    })
}

/// Identity of a direct builtin step: the builtin plus the canonical text of
/// the call, so each call site learns its own shape.
fn builtin_step_id(builtin: &BuiltinFunction, call: &Expression) -> FunctionId {
    let mut hasher = ContentHasher::new();
    hasher
        .tag(TAG_BUILTIN_STEP)
        .str(builtin.name)
        .str(&call.to_string());
    FunctionId(hasher.finish())
}

/// Identity of a step: the callee plus the text of every top-level function
/// and the hash of every prelude value the callee can reach.
fn function_id(
    callee: &str,
    reachable: &BTreeSet<String>,
    definitions: &HashMap<String, String>,
    globals: &HashMap<String, Value>,
) -> FunctionId {
    let mut hasher = ContentHasher::new();
    hasher.tag(TAG_FUNCTION_ID).str(callee);
    for name in reachable {
        if let Some(definition) = definitions.get(name) {
            hasher.tag(1).str(name).str(definition);
        } else if let Some(value) = globals.get(name) {
            hasher.tag(2).str(name).digest(&value.content_hash());
        }
    }
    FunctionId(hasher.finish())
}

/// Transitive free names of a statement, through top-level functions and
/// closures held by prelude values.
struct Reachability<'a, 'p> {
    functions: &'a HashMap<String, FunctionDef<'p>>,
    globals: &'a HashMap<String, Value>,
}

impl Reachability<'_, '_> {
    fn closure(&self, seed: impl IntoIterator<Item = String>) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut queue: Vec<String> = seed.into_iter().collect();

        while let Some(name) = queue.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(function) = self.functions.get(&name) {
                let mut free = collect_free_vars_in_function(function.parameters, function.body);
                free.remove(&name);
                queue.extend(free);
            } else if let Some(value) = self.globals.get(&name) {
                closure_free_vars(value, &mut queue);
            }
        }
        seen
    }
}

fn closure_free_vars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Function(Function::User(closure)) => {
            out.extend(collect_free_vars_in_function(
                &closure.parameters,
                &closure.body,
            ));
        }
        Value::List(items) => {
            for item in items.iter() {
                closure_free_vars(item, out);
            }
        }
        _ => {}
    }
}

/// Whether a statement can reach the outside world or user code. Bodies of
/// function literals are skipped; only calling them counts.
struct CallScan<'a, 'p> {
    functions: &'a HashMap<String, FunctionDef<'p>>,
    prelude_names: &'a HashSet<String>,
    effectful: bool,
}

impl<'a, 'p> CallScan<'a, 'p> {
    fn scan(
        statement: &Statement,
        functions: &'a HashMap<String, FunctionDef<'p>>,
        prelude_names: &'a HashSet<String>,
    ) -> Self {
        let mut scan = CallScan {
            functions,
            prelude_names,
            effectful: false,
        };
        scan.visit_stmt(statement);
        scan
    }

    fn is_user_code(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.prelude_names.contains(name)
    }
}

impl<'ast> Visitor<'ast> for CallScan<'_, '_> {
    fn visit_expr(&mut self, expr: &'ast Expression) {
        match expr {
            Expression::Function { .. } => return,
            Expression::ShellOut { .. } => self.effectful = true,
            Expression::Call { function, .. } => match function.as_ref() {
                Expression::Identifier { name, .. } if !self.is_user_code(name) => {
                    if let Some(builtin) = get_builtin(name) {
                        if !builtin.contract.is_pure() {
                            self.effectful = true;
                        }
                    }
                }
                _ => self.effectful = true,
            },
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

/// Whether evaluating an argument needs anything beyond pure builtins.
struct ArgumentScan<'a> {
    prelude_names: &'a HashSet<String>,
    needs_runtime: bool,
}

impl<'a> ArgumentScan<'a> {
    fn needs_runtime(argument: &Expression, prelude_names: &'a HashSet<String>) -> bool {
        let mut scan = ArgumentScan {
            prelude_names,
            needs_runtime: false,
        };
        scan.visit_expr(argument);
        scan.needs_runtime
    }
}

impl<'ast> Visitor<'ast> for ArgumentScan<'_> {
    fn visit_expr(&mut self, expr: &'ast Expression) {
        match expr {
            Expression::ShellOut { .. } | Expression::Function { .. } => {
                self.needs_runtime = true
            }
            Expression::Call { function, .. } => {
                let pure = match function.as_ref() {
                    Expression::Identifier { name, .. } if !self.prelude_names.contains(name) => {
                        get_builtin(name).is_some_and(|builtin| builtin.contract.is_pure())
                    }
                    _ => false,
                };
                if !pure {
                    self.needs_runtime = true;
                }
            }
            _ => {}
        }
        visit::walk_expr(self, expr);
    }
}

#[cfg(test)]
#[path = "plan_test.rs"]
mod plan_test;
