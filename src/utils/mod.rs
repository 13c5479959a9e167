/// 工具模块 - 日志与输入校验
pub mod logging;
pub mod validation;

pub use logging::LoggingConfig;
pub use validation::{InputValidator, DEFAULT_ERROR_MESSAGE};
