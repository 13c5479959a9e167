// handler / generator 回调

pub mod handler;
pub mod registry;

pub use handler::{
    generator_from_fn, handler_from_fn, ContentGenerator, HandlerContext, HandlerOutcome,
    OutgoingMessage, StepHandler, VariableUpdate,
};
pub use registry::HandlerRegistry;
