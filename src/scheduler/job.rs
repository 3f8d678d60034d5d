//! Work the coordinator hands to the pool. Every job runs against a private
//! evaluator whose globals are the prelude plus the values of the node's
//! inputs; only the cache is shared.

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use crate::{
    cache::{CacheEntry, CacheError, CallCache, CallFingerprint, FootprintShape},
    runtime::{
        effects::EffectFootprint,
        env::Host,
        error::RuntimeError,
        evaluator::Evaluator,
        value::{Function, Value},
    },
    syntax::statement::Statement,
};

use super::{
    declared::DeclaredEffects,
    plan::{BuildPlan, StepCall},
    report::StepError,
};

#[derive(Clone, Copy)]
pub(super) struct WorkerContext<'a> {
    pub plan: &'a BuildPlan,
    pub cache: &'a CallCache,
    pub host: &'a Host,
}

/// Values of the node bindings a node reads, sorted by name.
pub(super) type Inputs = Vec<(String, Value)>;

pub(super) enum Job<'a> {
    /// Evaluate a step's arguments and look its fingerprint up.
    Probe {
        index: usize,
        step: &'a StepCall,
        inputs: Inputs,
    },
    /// Call a step's function, then learn its shape and commit.
    RunStep {
        index: usize,
        step: &'a StepCall,
        inputs: Inputs,
        args: Vec<Value>,
    },
    RunInline {
        index: usize,
        statement: &'a Statement,
        binding: Option<&'a str>,
        inputs: Inputs,
    },
}

pub(super) struct Probe {
    pub args: Vec<Value>,
    pub fingerprint: CallFingerprint,
    pub entry: Option<Arc<CacheEntry>>,
}

pub(super) struct Execution {
    pub value: Value,
    pub footprint: EffectFootprint,
    /// Fingerprint the result was committed under, if it was.
    pub committed: Option<CallFingerprint>,
}

pub(super) enum Completion {
    Probed {
        index: usize,
        result: Result<Probe, StepError>,
    },
    Executed {
        index: usize,
        result: Result<Execution, StepError>,
    },
}

impl Job<'_> {
    pub fn run(self, ctx: WorkerContext<'_>) -> Completion {
        match self {
            Job::Probe {
                index,
                step,
                inputs,
            } => Completion::Probed {
                index,
                result: probe(ctx, index, step, &inputs),
            },
            Job::RunStep {
                index,
                step,
                inputs,
                args,
            } => Completion::Executed {
                index,
                result: run_step(ctx, index, step, &inputs, args),
            },
            Job::RunInline {
                index,
                statement,
                binding,
                inputs,
            } => Completion::Executed {
                index,
                result: run_inline(ctx, statement, binding, &inputs),
            },
        }
    }
}

fn evaluator<'h>(ctx: WorkerContext<'h>, inputs: &Inputs) -> Evaluator<'h> {
    let mut globals = (*ctx.plan.globals).clone();
    globals.extend(inputs.iter().cloned());
    Evaluator::new(globals, ctx.host).with_frozen_globals()
}

/// The explicit arguments followed by a `[name, value]` pair per input, so
/// a step's fingerprint changes when anything it reads changes.
fn fingerprint_args(args: &[Value], inputs: &Inputs) -> Vec<Value> {
    args.iter()
        .cloned()
        .chain(
            inputs
                .iter()
                .map(|(name, value)| Value::list(vec![Value::from(name.as_str()), value.clone()])),
        )
        .collect()
}

/// Env names and read paths a fingerprint must cover.
fn fingerprint_inputs(
    declared: &DeclaredEffects,
    shape: Option<&FootprintShape>,
) -> (BTreeSet<String>, BTreeSet<PathBuf>) {
    let mut env_names = declared.env_names.clone();
    let mut files = declared.files_read.clone();
    if let Some(shape) = shape {
        env_names.extend(shape.env_names.iter().cloned());
        files.extend(shape.files_read.iter().cloned());
    }
    (env_names, files)
}

fn resolve(
    ctx: WorkerContext<'_>,
    index: usize,
    step: &StepCall,
    fingerprint_args: &[Value],
    shape: Option<&FootprintShape>,
) -> Result<CallFingerprint, CacheError> {
    let (env_names, files) = fingerprint_inputs(&ctx.plan.nodes[index].declared, shape);
    ctx.cache.resolve_fingerprint(
        step.function,
        fingerprint_args,
        &env_names,
        &files,
        ctx.host.env(),
    )
}

fn probe(
    ctx: WorkerContext<'_>,
    index: usize,
    step: &StepCall,
    inputs: &Inputs,
) -> Result<Probe, StepError> {
    let mut evaluator = evaluator(ctx, inputs);
    let args = step
        .arguments
        .iter()
        .map(|argument| evaluator.eval_expression(argument))
        .collect::<Result<Vec<_>, _>>()?;

    let shape = ctx.cache.shape(&step.function);
    let fingerprint_args = fingerprint_args(&args, inputs);
    let fingerprint = match resolve(ctx, index, step, &fingerprint_args, shape.as_ref()) {
        Ok(fingerprint) => fingerprint,
        Err(err @ CacheError::StaleInput { .. }) => {
            ctx.cache.forget_shape(&step.function);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };
    let entry = ctx.cache.lookup(&fingerprint);
    log::debug!(
        "probe {} {}: {}",
        step.callee,
        fingerprint.key().short(),
        if entry.is_some() { "hit" } else { "miss" }
    );
    Ok(Probe {
        args,
        fingerprint,
        entry,
    })
}

fn run_step(
    ctx: WorkerContext<'_>,
    index: usize,
    step: &StepCall,
    inputs: &Inputs,
    args: Vec<Value>,
) -> Result<Execution, StepError> {
    let mut evaluator = evaluator(ctx, inputs);
    let callee = match step.builtin {
        Some(builtin) => Value::Function(Function::Builtin(builtin)),
        None => evaluator
            .lookup(&step.callee)
            .ok_or_else(|| RuntimeError::UndefinedVariable {
                name: step.callee.clone(),
            })?,
    };
    let value = evaluator.evaluate_call(&callee, args.clone());
    let footprint = evaluator.take_footprint();
    let value = value?;

    let committed = if footprint.volatile {
        log::debug!("{} is volatile; not caching", step.callee);
        None
    } else {
        let shape = ctx.cache.learn_shape(step.function, &footprint);
        let fingerprint_args = fingerprint_args(&args, inputs);
        commit(ctx, index, step, &fingerprint_args, &shape, &value, &footprint)
    };
    Ok(Execution {
        value,
        footprint,
        committed,
    })
}

/// Re-resolves the fingerprint against the freshly learned shape and stores
/// the result. Failing to store leaves the run unaffected.
fn commit(
    ctx: WorkerContext<'_>,
    index: usize,
    step: &StepCall,
    fingerprint_args: &[Value],
    shape: &FootprintShape,
    value: &Value,
    footprint: &EffectFootprint,
) -> Option<CallFingerprint> {
    let fingerprint = match resolve(ctx, index, step, fingerprint_args, Some(shape)) {
        Ok(fingerprint) => fingerprint,
        Err(err) => {
            log::warn!("not caching {}: {}", step.callee, err);
            return None;
        }
    };
    match ctx
        .cache
        .commit(fingerprint.clone(), value.clone(), footprint.clone())
    {
        Ok(_) => Some(fingerprint),
        Err(err) => {
            log::warn!("could not persist result of {}: {}", step.callee, err);
            None
        }
    }
}

fn run_inline(
    ctx: WorkerContext<'_>,
    statement: &Statement,
    binding: Option<&str>,
    inputs: &Inputs,
) -> Result<Execution, StepError> {
    let mut evaluator = evaluator(ctx, inputs);
    let result = evaluator.eval_statement(statement);
    let footprint = evaluator.take_footprint();
    let value = result?;
    let value = match binding {
        Some(name) => evaluator.lookup(name).unwrap_or(Value::Unit),
        None => value,
    };
    Ok(Execution {
        value,
        footprint,
        committed: None,
    })
}
