pub mod config;
pub mod error;
pub mod flow;
pub mod handlers;
pub mod runtime;
pub mod state;
pub mod utils;

pub use config::{EngineConfig, EnvConfig};
pub use error::{BotFlowError, Result};
pub use flow::{
    load_flows_from_path, load_flows_from_str, load_flows_from_value, Flow, FlowBuilder,
    FlowRegistry, Keyboard, KeyboardButton, Step, StepKind, ValidationKind,
};
pub use handlers::{
    generator_from_fn, handler_from_fn, ContentGenerator, HandlerContext, HandlerOutcome,
    HandlerRegistry, OutgoingMessage, StepHandler,
};
pub use runtime::{
    BotEngine, Effect, EngineReply, FlowController, SessionEvent, StepEffect, StepExecutor,
    StepOutcome,
};
#[cfg(feature = "redis-store")]
pub use state::RedisStore;
pub use state::{ContextStore, MemoryStore, Session, SessionRepository, SessionState, VariableBag};
pub use utils::{logging, validation};
