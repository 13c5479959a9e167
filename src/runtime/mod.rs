// 运行时执行引擎模块

mod controller;
mod engine;
mod executor;
mod types;

pub use controller::FlowController;
pub use engine::{BotEngine, EngineReply};
pub use executor::{StepExecutor, FORWARDING_FLAG};
pub use types::{Effect, SessionEvent, StepEffect, StepOutcome};
