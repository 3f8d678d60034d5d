use std::fmt;

use thiserror::Error;

use crate::{cache::CacheError, runtime::error::RuntimeError, runtime::value::Value};

use super::call_node::{CallNode, NodeState};

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// A node that ended in [`NodeState::Failed`].
#[derive(Debug, Error)]
#[error("`{node}` failed: {source}")]
pub struct StepFailure {
    pub index: usize,
    pub node: String,
    #[source]
    pub source: StepError,
}

/// One state change, in the order the coordinator observed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEvent {
    pub index: usize,
    pub state: NodeState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub nodes: usize,
    pub cache_hits: usize,
    pub executed: usize,
    pub failed: usize,
    /// Nodes never started because an earlier node failed.
    pub not_run: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} node(s): {} cached, {} executed, {} failed, {} not run",
            self.nodes, self.cache_hits, self.executed, self.failed, self.not_run
        )
    }
}

/// Outcome of one scheduler run.
#[derive(Debug)]
pub struct BuildReport {
    pub nodes: Vec<CallNode>,
    pub events: Vec<NodeEvent>,
    pub stats: RunStats,
    /// First-encountered first.
    pub failures: Vec<StepFailure>,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.nodes.iter().all(|node| node.state() == NodeState::Done)
    }

    pub fn node(&self, name: &str) -> Option<&CallNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.node(name).and_then(|node| node.value.as_ref())
    }

    /// Position in [`BuildReport::events`] where `index` first entered
    /// `state`.
    pub fn event_position(&self, index: usize, state: NodeState) -> Option<usize> {
        self.events
            .iter()
            .position(|event| event.index == index && event.state == state)
    }
}
