use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

use crate::runtime::digest::Digest;

/// What one call execution observably did to the outside world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectFootprint {
    pub env_reads: BTreeSet<String>,
    pub files_read: BTreeSet<PathBuf>,
    pub files_written: BTreeMap<PathBuf, Digest>,
    pub exit_code: Option<i64>,
    /// Set by `uncached()`: the result must never be committed.
    #[serde(default)]
    pub volatile: bool,
}

impl EffectFootprint {
    pub fn is_pure(&self) -> bool {
        self.env_reads.is_empty()
            && self.files_read.is_empty()
            && self.files_written.is_empty()
            && self.exit_code.is_none()
    }

    /// Folds a finished sub-call into this footprint. The sub-call ran later
    /// than anything already recorded, so its exit code and write hashes win.
    pub fn merge(&mut self, other: EffectFootprint) {
        self.env_reads.extend(other.env_reads);
        self.files_read.extend(other.files_read);
        self.files_written.extend(other.files_written);
        if other.exit_code.is_some() {
            self.exit_code = other.exit_code;
        }
        self.volatile |= other.volatile;
    }
}

/// Per-call footprint stack for one evaluation.
///
/// `record_*` always targets the innermost active call. Ending a call folds
/// its footprint into the caller, so the bottom of the stack ends up holding
/// everything the evaluation triggered.
#[derive(Debug)]
pub struct FootprintRecorder {
    stack: Vec<EffectFootprint>,
}

impl FootprintRecorder {
    pub fn new() -> Self {
        Self {
            stack: vec![EffectFootprint::default()],
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn begin_call(&mut self) {
        self.stack.push(EffectFootprint::default());
    }

    /// Closes the innermost call and returns what it recorded. The root
    /// frame is never popped.
    pub fn end_call(&mut self) -> EffectFootprint {
        if self.stack.len() <= 1 {
            debug_assert!(false, "end_call without matching begin_call");
            return EffectFootprint::default();
        }
        let finished = self.stack.pop().unwrap_or_default();
        self.current().merge(finished.clone());
        finished
    }

    pub fn record_env_read(&mut self, name: &str) {
        self.current().env_reads.insert(name.to_string());
    }

    pub fn record_file_read(&mut self, path: PathBuf) {
        self.current().files_read.insert(path);
    }

    pub fn record_file_write(&mut self, path: PathBuf, hash: Digest) {
        self.current().files_written.insert(path, hash);
    }

    pub fn record_exit_code(&mut self, code: i64) {
        self.current().exit_code = Some(code);
    }

    pub fn mark_volatile(&mut self) {
        self.current().volatile = true;
    }

    /// Unwinds any calls still open and returns the accumulated footprint,
    /// leaving the recorder empty and ready for reuse.
    pub fn take(&mut self) -> EffectFootprint {
        while self.stack.len() > 1 {
            self.end_call();
        }
        std::mem::take(self.current())
    }

    fn current(&mut self) -> &mut EffectFootprint {
        if self.stack.is_empty() {
            self.stack.push(EffectFootprint::default());
        }
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }
}

impl Default for FootprintRecorder {
    fn default() -> Self {
        Self::new()
    }
}
