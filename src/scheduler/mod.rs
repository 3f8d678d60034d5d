//! Runs a [`BuildPlan`] on a fixed pool of workers.
//!
//! The coordinator runs on the calling thread and owns every [`CallNode`].
//! It admits nodes whose dependencies are done, in declaration order, and
//! hands workers two kinds of job: probes (evaluate a step's arguments,
//! fingerprint, look up) and runs. Completions come back over a channel.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::mpsc,
};

use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};

use crate::{
    cache::CallCache,
    runtime::{digest::Digest, env::Host, value::Value},
};

pub mod call_node;
pub mod declared;
pub mod graph;
mod job;
pub mod plan;
pub mod report;

pub use call_node::{CallNode, NodeState, TransitionError};
pub use declared::DeclaredEffects;
pub use graph::{DependencyGraph, EdgeKind};
pub use plan::{BuildPlan, NodeKind, PlanError, PlannedNode, StepCall, plan};
pub use report::{BuildReport, NodeEvent, RunStats, StepError, StepFailure};

use job::{Completion, Execution, Inputs, Job, Probe, WorkerContext};

pub struct Scheduler<'a> {
    cache: &'a CallCache,
    host: &'a Host,
    workers: usize,
}

impl<'a> Scheduler<'a> {
    pub fn new(cache: &'a CallCache, host: &'a Host, workers: usize) -> Self {
        Self {
            cache,
            host,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn run(&self, plan: &BuildPlan) -> Result<BuildReport, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("kiln-worker-{}", i))
            .build()?;
        let ctx = WorkerContext {
            plan,
            cache: self.cache,
            host: self.host,
        };
        let (tx, rx) = mpsc::channel::<Completion>();
        let mut coordinator = Coordinator::new(ctx, self.workers);

        pool.in_place_scope(|scope| {
            loop {
                for job in coordinator.admit() {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        // The receiver outlives every job.
                        let _ = tx.send(job.run(ctx));
                    });
                }
                if coordinator.in_flight == 0 {
                    break;
                }
                let Ok(completion) = rx.recv() else {
                    break;
                };
                coordinator.complete(completion);
            }
        });

        let report = coordinator.finish();
        log::info!("{}", report.stats);
        Ok(report)
    }
}

struct Coordinator<'a> {
    ctx: WorkerContext<'a>,
    workers: usize,
    nodes: Vec<CallNode>,
    events: Vec<NodeEvent>,
    /// Dependencies not yet done, per node.
    waiting_on: Vec<usize>,
    ready: BTreeSet<usize>,
    /// Runs decided on while handling a probe, already counted in flight.
    queued: Vec<Job<'a>>,
    in_flight: usize,
    /// Probe key -> node currently executing it.
    running_keys: HashMap<Digest, usize>,
    /// Probe keys whose owner has finished this run.
    settled_keys: HashSet<Digest>,
    /// Owner -> nodes parked behind it with the same fingerprint.
    parked: HashMap<usize, Vec<usize>>,
    values: HashMap<String, Value>,
    failures: Vec<StepFailure>,
    executed: usize,
}

impl<'a> Coordinator<'a> {
    fn new(ctx: WorkerContext<'a>, workers: usize) -> Self {
        let plan = ctx.plan;
        let nodes: Vec<CallNode> = plan
            .nodes
            .iter()
            .map(|node| CallNode::new(node.index, node.name.clone()))
            .collect();
        let waiting_on: Vec<usize> = (0..nodes.len())
            .map(|index| plan.graph.dependencies(index).count())
            .collect();
        let ready = waiting_on
            .iter()
            .enumerate()
            .filter(|(_, waiting)| **waiting == 0)
            .map(|(index, _)| index)
            .collect();
        Self {
            ctx,
            workers,
            nodes,
            events: Vec::new(),
            waiting_on,
            ready,
            queued: Vec::new(),
            in_flight: 0,
            running_keys: HashMap::new(),
            settled_keys: HashSet::new(),
            parked: HashMap::new(),
            values: HashMap::new(),
            failures: Vec::new(),
            executed: 0,
        }
    }

    fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Jobs for as many ready nodes as there are idle workers. Nothing new
    /// is admitted once a node has failed.
    fn admit(&mut self) -> Vec<Job<'a>> {
        let plan = self.ctx.plan;
        let mut jobs = std::mem::take(&mut self.queued);
        while !self.failed() && self.in_flight < self.workers {
            let Some(index) = self.ready.pop_first() else {
                break;
            };
            let node = &plan.nodes[index];
            let inputs = self.inputs(index);
            let job = match node.step() {
                Some(step) => Job::Probe {
                    index,
                    step,
                    inputs,
                },
                None => {
                    self.transition(index, NodeState::Running);
                    self.executed += 1;
                    Job::RunInline {
                        index,
                        statement: &node.statement,
                        binding: node.binding.as_deref(),
                        inputs,
                    }
                }
            };
            self.in_flight += 1;
            jobs.push(job);
        }
        jobs
    }

    fn inputs(&self, index: usize) -> Inputs {
        self.ctx.plan.nodes[index]
            .inputs
            .iter()
            .filter_map(|name| {
                self.values
                    .get(name)
                    .map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    fn complete(&mut self, completion: Completion) {
        self.in_flight -= 1;
        match completion {
            Completion::Probed { index, result } => match result {
                Ok(probe) => self.probed(index, probe),
                Err(err) => self.fail(index, err),
            },
            Completion::Executed { index, result } => {
                self.release_parked(index);
                match result {
                    Ok(execution) => self.executed(index, execution),
                    Err(err) => self.fail(index, err),
                }
            }
        }
    }

    fn probed(&mut self, index: usize, probe: Probe) {
        self.transition(index, NodeState::Fingerprinted);
        let key = probe.fingerprint.key();
        // A probe that looked before an identical call finished may have
        // missed its commit.
        let entry = match probe.entry {
            None if self.settled_keys.contains(&key) => {
                self.ctx.cache.lookup(&probe.fingerprint)
            }
            entry => entry,
        };
        let node = &mut self.nodes[index];
        node.fingerprint = Some(probe.fingerprint);
        node.args = probe.args.clone();

        if let Some(entry) = entry {
            self.ctx.cache.mark_validated(&key);
            let node = &mut self.nodes[index];
            node.value = Some(entry.value.clone());
            node.footprint = Some(entry.footprint.clone());
            node.cache_hit = true;
            self.transition(index, NodeState::CacheHit);
            self.done(index);
            return;
        }

        if let Some(&owner) = self.running_keys.get(&key) {
            log::debug!(
                "{} waits for {} with the same fingerprint",
                self.nodes[index].name,
                self.nodes[owner].name
            );
            self.parked.entry(owner).or_default().push(index);
            return;
        }
        if self.failed() {
            return;
        }

        let plan = self.ctx.plan;
        let Some(step) = plan.nodes[index].step() else {
            return;
        };
        self.running_keys.insert(key, index);
        self.transition(index, NodeState::Running);
        self.executed += 1;
        self.in_flight += 1;
        let job = Job::RunStep {
            index,
            step,
            inputs: self.inputs(index),
            args: probe.args,
        };
        self.queued.push(job);
    }

    fn executed(&mut self, index: usize, execution: Execution) {
        let node = &mut self.nodes[index];
        node.value = Some(execution.value);
        node.footprint = Some(execution.footprint);
        if execution.committed.is_some() {
            node.fingerprint = execution.committed;
        }
        self.done(index);
    }

    /// Sends nodes parked behind `owner` back to be probed again; by now the
    /// owner's result is committed, so they normally hit.
    fn release_parked(&mut self, owner: usize) {
        let settled = &mut self.settled_keys;
        self.running_keys.retain(|key, running| {
            if *running == owner {
                settled.insert(*key);
                return false;
            }
            true
        });
        if let Some(parked) = self.parked.remove(&owner) {
            self.ready.extend(parked);
        }
    }

    fn done(&mut self, index: usize) {
        self.transition(index, NodeState::Done);
        let plan = self.ctx.plan;
        if let (Some(binding), Some(value)) = (&plan.nodes[index].binding, &self.nodes[index].value) {
            self.values.insert(binding.clone(), value.clone());
        }
        for &dependent in plan.graph.dependents(index) {
            self.waiting_on[dependent] -= 1;
            if self.waiting_on[dependent] == 0 {
                self.ready.insert(dependent);
            }
        }
    }

    fn fail(&mut self, index: usize, source: StepError) {
        self.transition(index, NodeState::Failed);
        let node = self.nodes[index].name.clone();
        log::debug!("{} failed: {}", node, source);
        self.failures.push(StepFailure {
            index,
            node,
            source,
        });
    }

    fn transition(&mut self, index: usize, next: NodeState) {
        let node = &mut self.nodes[index];
        match node.transition(next) {
            Ok(()) => {
                log::debug!("{} -> {}", node.name, next);
                self.events.push(NodeEvent { index, state: next });
            }
            Err(err) => log::warn!("{}: {}", node.name, err),
        }
    }

    fn finish(self) -> BuildReport {
        let mut stats = RunStats {
            nodes: self.nodes.len(),
            executed: self.executed,
            failed: self.failures.len(),
            ..RunStats::default()
        };
        for node in &self.nodes {
            if node.cache_hit {
                stats.cache_hits += 1;
            }
            if !node.state().is_terminal() {
                stats.not_run += 1;
            }
        }
        BuildReport {
            nodes: self.nodes,
            events: self.events,
            stats,
            failures: self.failures,
        }
    }
}
