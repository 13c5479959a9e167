// Flow 模块 - 流程定义、加载与注册

pub mod builder;
pub mod loader;
pub mod registry;
pub mod types;

pub use builder::FlowBuilder;
pub use loader::{
    load_flows_from_path, load_flows_from_str, load_flows_from_value, FlowConfig, FlowsDocument,
    StepConfig,
};
pub use registry::FlowRegistry;
pub use types::{Flow, Keyboard, KeyboardButton, Step, StepKind, ValidationKind};
