//! One-call entry points: parse, plan and run a script against a cache.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::ThreadPoolBuildError;
use thiserror::Error;

use crate::{
    cache::{CacheError, CallCache},
    config::BuildConfig,
    runtime::env::{EnvSource, Host, HostEnv},
    scheduler::{self, BuildPlan, BuildReport, PlanError, Scheduler},
    syntax::{ParseError, parse},
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{}", join_parse_errors(.0))]
    Parse(Vec<ParseError>),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("could not start worker pool: {0}")]
    Pool(#[from] ThreadPoolBuildError),

    #[error("cannot read {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}", describe_failures(report))]
    StepsFailed { report: Box<BuildReport> },
}

impl From<Vec<ParseError>> for BuildError {
    fn from(errors: Vec<ParseError>) -> Self {
        BuildError::Parse(errors)
    }
}

fn join_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(ParseError::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_failures(report: &BuildReport) -> String {
    match report.failures.as_slice() {
        [] => "build did not finish".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more failure(s))", first, rest.len()),
    }
}

pub struct Build {
    config: BuildConfig,
    env: Arc<dyn EnvSource>,
}

impl Build {
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            env: Arc::new(HostEnv),
        }
    }

    /// Reads `getenv` from `env` instead of the process environment.
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn host(&self) -> Host {
        Host::new(self.config.root.clone(), self.env.clone())
    }

    /// The configured persistent cache, or a fresh in-memory one.
    pub fn open_cache(&self) -> Result<CallCache, CacheError> {
        match &self.config.cache_dir {
            Some(dir) => CallCache::open(dir, &self.config.root),
            None => Ok(CallCache::in_memory(&self.config.root)),
        }
    }

    pub fn plan(&self, source: &str, cache: &CallCache) -> Result<BuildPlan, BuildError> {
        let program = parse(source)?;
        Ok(scheduler::plan(
            &program,
            &self.host(),
            &self.config.args,
            cache,
        )?)
    }

    pub fn run_file(&self, path: &Path) -> Result<BuildReport, BuildError> {
        let source = fs::read_to_string(path).map_err(|source| BuildError::Script {
            path: path.to_path_buf(),
            source,
        })?;
        self.run_source(&source)
    }

    /// Runs against the configured cache and flushes it afterwards, whether
    /// or not every step succeeded.
    pub fn run_source(&self, source: &str) -> Result<BuildReport, BuildError> {
        let cache = self.open_cache()?;
        let result = self.run_with_cache(source, &cache);
        if let Err(err) = cache.flush() {
            log::warn!("could not save cache state: {}", err);
        }
        result
    }

    pub fn run_with_cache(&self, source: &str, cache: &CallCache) -> Result<BuildReport, BuildError> {
        let plan = self.plan(source, cache)?;
        let host = self.host();
        let report = Scheduler::new(cache, &host, self.config.workers).run(&plan)?;
        if report.succeeded() {
            Ok(report)
        } else {
            Err(BuildError::StepsFailed {
                report: Box::new(report),
            })
        }
    }
}
