use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln::{
    Build, BuildConfig, BuildError,
    cache::CallCache,
    config::CACHE_DIR_NAME,
    scheduler::{BuildPlan, EdgeKind, NodeKind},
};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Run build scripts with cached, parallel steps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log cache probes and node transitions
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build script
    Run {
        script: PathBuf,

        /// Worker threads
        #[arg(short, long, env = "KILN_JOBS")]
        jobs: Option<usize>,

        /// Cache directory (default: .kiln-cache beside the script)
        #[arg(long, env = "KILN_CACHE_DIR")]
        cache_dir: Option<PathBuf>,

        /// Keep the cache in memory for this run only; overrides --cache-dir
        #[arg(long)]
        no_cache: bool,

        /// Bound to `args` in the script
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Parse and plan a script without running it
    Check {
        script: PathBuf,

        #[arg(long, env = "KILN_CACHE_DIR")]
        cache_dir: Option<PathBuf>,
    },

    /// Inspect or prune a cache directory
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        #[arg(long, global = true, env = "KILN_CACHE_DIR", default_value = CACHE_DIR_NAME)]
        cache_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts and size
    Info,

    /// Drop the least recently validated entries
    Gc {
        /// Entries to keep
        #[arg(long, default_value = "1000")]
        keep: usize,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Run {
            script,
            jobs,
            cache_dir,
            no_cache,
            args,
        } => {
            let mut config = BuildConfig::for_script(&script).with_args(args);
            if let Some(jobs) = jobs {
                config = config.with_workers(jobs);
            }
            if let Some(dir) = cache_dir {
                config = config.with_cache_dir(dir);
            }
            if no_cache {
                config = config.without_cache();
            }
            run(&script, config)
        }
        Commands::Check { script, cache_dir } => {
            let mut config = BuildConfig::for_script(&script);
            if let Some(dir) = cache_dir {
                config = config.with_cache_dir(dir);
            }
            check(&script, config)
        }
        Commands::Cache { action, cache_dir } => cache(action, &cache_dir),
    }
}

fn run(script: &Path, config: BuildConfig) -> Result<ExitCode> {
    match Build::new(config).run_file(script) {
        Ok(report) => {
            println!("{}", report.stats);
            Ok(ExitCode::SUCCESS)
        }
        Err(BuildError::StepsFailed { report }) => {
            for failure in &report.failures {
                eprintln!("error: {}", failure);
            }
            eprintln!("{}", report.stats);
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err).with_context(|| format!("building {}", script.display())),
    }
}

fn check(script: &Path, config: BuildConfig) -> Result<ExitCode> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("reading {}", script.display()))?;
    // Learned shapes only widen the plan; never create a cache just to check.
    let cache = match &config.cache_dir {
        Some(dir) if dir.exists() => CallCache::open(dir, &config.root)?,
        _ => CallCache::in_memory(&config.root),
    };
    let build = Build::new(config);
    match build.plan(&source, &cache) {
        Ok(plan) => {
            print_plan(&plan);
            Ok(ExitCode::SUCCESS)
        }
        Err(BuildError::Parse(errors)) => {
            for error in errors {
                eprintln!("{}:{}", script.display(), error);
            }
            Ok(ExitCode::FAILURE)
        }
        Err(err) => {
            eprintln!("{}: {}", script.display(), err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_plan(plan: &BuildPlan) {
    for node in &plan.nodes {
        let kind = match &node.kind {
            NodeKind::Step(step) => format!("step {}", step.function),
            NodeKind::Inline => "inline".to_string(),
        };
        println!("{:>3} {} ({})", node.index, node.name, kind);
        let declared = &node.declared;
        for name in &declared.env_names {
            println!("      env   {}", name);
        }
        for path in &declared.files_read {
            println!("      reads {}", path.display());
        }
        for path in &declared.files_written {
            println!("      writes {}", path.display());
        }
    }
    for (from, to, kind) in plan.graph.edges() {
        let kind = match kind {
            EdgeKind::Data => "data",
            EdgeKind::Effect => "effect",
        };
        println!(
            "{} -> {} ({})",
            plan.nodes[from].name, plan.nodes[to].name, kind
        );
    }
}

fn cache(action: CacheAction, dir: &Path) -> Result<ExitCode> {
    let root = std::env::current_dir().context("resolving current directory")?;
    let cache = CallCache::open(dir, root)
        .with_context(|| format!("opening cache at {}", dir.display()))?;
    match action {
        CacheAction::Info => {
            let info = cache.info()?;
            println!("cache:   {}", dir.display());
            println!("entries: {}", info.entries);
            println!("shapes:  {}", info.shapes);
            println!("bytes:   {}", info.bytes);
        }
        CacheAction::Gc { keep } => {
            let removed = cache.collect_garbage(keep)?;
            cache.flush()?;
            println!("removed {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
        }
    }
    Ok(ExitCode::SUCCESS)
}
