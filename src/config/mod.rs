pub mod env;

pub use env::{EngineConfig, EnvConfig};
