pub mod build;
pub mod cache;
pub mod config;
pub mod runtime;
pub mod scheduler;
pub mod syntax;

pub use build::{Build, BuildError};
pub use config::BuildConfig;
