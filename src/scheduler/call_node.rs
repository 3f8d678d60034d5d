use std::fmt;

use thiserror::Error;

use crate::{
    cache::CallFingerprint,
    runtime::{effects::EffectFootprint, value::Value},
};

/// Lifecycle of one call node within a run.
///
/// ```text
/// Pending -> Fingerprinted -> CacheHit -> Done
///                          -> Running  -> Done | Failed
/// ```
///
/// Inline nodes go straight from Pending to Running. A parked duplicate is
/// fingerprinted again once the node it waited on finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Pending,
    Fingerprinted,
    CacheHit,
    Running,
    Done,
    Failed,
}

impl NodeState {
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Pending, Fingerprinted)
                | (Pending, Running)
                | (Pending, Failed)
                | (Fingerprinted, Fingerprinted)
                | (Fingerprinted, CacheHit)
                | (Fingerprinted, Running)
                | (Fingerprinted, Failed)
                | (CacheHit, Done)
                | (Running, Done)
                | (Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Done | NodeState::Failed)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Pending => "pending",
            NodeState::Fingerprinted => "fingerprinted",
            NodeState::CacheHit => "cache-hit",
            NodeState::Running => "running",
            NodeState::Done => "done",
            NodeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal node transition {from} -> {to}")]
pub struct TransitionError {
    pub from: NodeState,
    pub to: NodeState,
}

/// Run-time state of one planned node. Owned by the scheduler's coordinator.
#[derive(Debug, Clone)]
pub struct CallNode {
    pub index: usize,
    pub name: String,
    state: NodeState,
    pub fingerprint: Option<CallFingerprint>,
    pub args: Vec<Value>,
    pub value: Option<Value>,
    pub footprint: Option<EffectFootprint>,
    pub cache_hit: bool,
}

impl CallNode {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            state: NodeState::Pending,
            fingerprint: None,
            args: Vec::new(),
            value: None,
            footprint: None,
            cache_hit: false,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn transition(&mut self, next: NodeState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_path() {
        let mut node = CallNode::new(0, "a");
        node.transition(NodeState::Fingerprinted).unwrap();
        node.transition(NodeState::CacheHit).unwrap();
        node.transition(NodeState::Done).unwrap();
        assert!(node.state().is_terminal());
    }

    #[test]
    fn rejects_skipping_states() {
        let mut node = CallNode::new(0, "a");
        assert_eq!(
            node.transition(NodeState::Done),
            Err(TransitionError {
                from: NodeState::Pending,
                to: NodeState::Done
            })
        );
        node.transition(NodeState::Running).unwrap();
        assert!(node.transition(NodeState::CacheHit).is_err());
        node.transition(NodeState::Failed).unwrap();
        assert!(node.transition(NodeState::Running).is_err());
    }
}
