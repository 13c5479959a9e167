// 状态管理模块

mod session;
mod store;
mod template;
mod variables;

pub use session::{Session, SessionRepository, SessionState};
#[cfg(feature = "redis-store")]
pub use store::redis_store::RedisStore;
pub use store::{ContextStore, MemoryStore};
pub use template::render_template;
pub use variables::VariableBag;
