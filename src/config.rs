use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    thread,
};

/// Directory created beside a script to hold its call cache.
pub const CACHE_DIR_NAME: &str = ".kiln-cache";

/// Settings for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Relative paths and subprocesses resolve against this directory.
    pub root: PathBuf,
    pub workers: usize,
    /// `None` keeps the cache in memory for this run only.
    pub cache_dir: Option<PathBuf>,
    /// Bound to `args` in the script.
    pub args: Vec<String>,
}

impl BuildConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cache_dir: Some(root.join(CACHE_DIR_NAME)),
            root,
            workers: default_workers(),
            args: Vec::new(),
        }
    }

    /// A config rooted at the directory holding `script`.
    pub fn for_script(script: &Path) -> Self {
        let root = match script.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::new(root)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_dir = None;
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
