use std::{collections::BTreeSet, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::runtime::effects::EffectFootprint;

/// The effects observed for one function identity across executions.
///
/// The shape decides which env names and files are hashed into a call's
/// fingerprint before the call runs. It only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintShape {
    pub env_names: BTreeSet<String>,
    pub files_read: BTreeSet<PathBuf>,
    pub files_written: BTreeSet<PathBuf>,
}

impl FootprintShape {
    pub fn from_footprint(footprint: &EffectFootprint) -> Self {
        Self {
            env_names: footprint.env_reads.clone(),
            files_read: footprint.files_read.clone(),
            files_written: footprint.files_written.keys().cloned().collect(),
        }
    }

    /// Unions `other` into this shape. Returns whether anything was added.
    pub fn absorb(&mut self, other: &FootprintShape) -> bool {
        let before = (
            self.env_names.len(),
            self.files_read.len(),
            self.files_written.len(),
        );
        self.env_names.extend(other.env_names.iter().cloned());
        self.files_read.extend(other.files_read.iter().cloned());
        self.files_written.extend(other.files_written.iter().cloned());
        before
            != (
                self.env_names.len(),
                self.files_read.len(),
                self.files_written.len(),
            )
    }

    /// Whether every input `footprint` observed is already part of this
    /// shape.
    pub fn covers(&self, footprint: &EffectFootprint) -> bool {
        footprint.env_reads.is_subset(&self.env_names)
            && footprint.files_read.is_subset(&self.files_read)
    }

    pub fn is_empty(&self) -> bool {
        self.env_names.is_empty() && self.files_read.is_empty() && self.files_written.is_empty()
    }
}
