use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::runtime::digest::{ContentHasher, Digest};

const TAG_FINGERPRINT: u8 = 0x46;
const TAG_ENV_UNSET: u8 = 0x00;
const TAG_ENV_SET: u8 = 0x01;

/// Identity of a cacheable function: its canonical definition plus
/// everything it can reach at top level.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(pub Digest);

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({})", self.0.short())
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.short())
    }
}

/// Everything a cached result depends on. Two fingerprints are equal only
/// when every component is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFingerprint {
    pub function: FunctionId,
    pub args: Vec<Digest>,
    /// Hash of each declared variable's current value.
    pub env: BTreeMap<String, Digest>,
    /// Hash of each declared file's current content.
    pub files: BTreeMap<PathBuf, Digest>,
}

impl CallFingerprint {
    /// The digest entries are stored under.
    pub fn key(&self) -> Digest {
        let mut hasher = ContentHasher::new();
        hasher
            .tag(TAG_FINGERPRINT)
            .digest(&self.function.0)
            .u64(self.args.len() as u64);
        for arg in &self.args {
            hasher.digest(arg);
        }
        hasher.u64(self.env.len() as u64);
        for (name, value) in &self.env {
            hasher.str(name).digest(value);
        }
        hasher.u64(self.files.len() as u64);
        for (path, content) in &self.files {
            hasher.str(&path.to_string_lossy()).digest(content);
        }
        hasher.finish()
    }
}

/// Hash of an environment variable's value. An unset variable and an empty
/// one hash differently.
pub fn env_value_digest(value: Option<&str>) -> Digest {
    let mut hasher = ContentHasher::new();
    match value {
        Some(value) => {
            hasher.tag(TAG_ENV_SET).str(value);
        }
        None => {
            hasher.tag(TAG_ENV_UNSET);
        }
    }
    hasher.finish()
}
