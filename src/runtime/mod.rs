pub mod builtins;
pub mod digest;
pub mod effects;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod value;

pub use digest::Digest;
pub use effects::{EffectFootprint, FootprintRecorder};
pub use env::{EnvSource, Host, HostEnv, MapEnv};
pub use error::RuntimeError;
pub use evaluator::Evaluator;
pub use value::{Function, Value};
