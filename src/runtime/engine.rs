use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::{BotFlowError, Result};
use crate::flow::{load_flows_from_path, FlowRegistry};
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::state::{ContextStore, MemoryStore, Session, SessionRepository, SessionState};

use super::controller::FlowController;
use super::types::{message_texts, Effect, SessionEvent, StepOutcome};

/// 引擎一次调用的结果
#[derive(Clone, Debug, PartialEq)]
pub struct EngineReply {
    pub effects: Vec<Effect>,
    pub state: SessionState,
    pub forwarding: bool,
}

impl EngineReply {
    pub fn messages(&self) -> Vec<&str> {
        message_texts(&self.effects)
    }

    pub fn failures(&self) -> Vec<&Effect> {
        self.effects
            .iter()
            .filter(|effect| matches!(effect, Effect::HandlerFailed { .. }))
            .collect()
    }
}

/// Bot 引擎：加载会话、驱动控制器、调用 handler / generator 并持久化会话
pub struct BotEngine {
    controller: FlowController,
    handlers: Arc<HandlerRegistry>,
    sessions: SessionRepository,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    max_handler_hops: u32,
}

impl BotEngine {
    /// 创建引擎；所有 Flow 引用的 handler / generator 必须已注册
    pub fn new(
        registry: Arc<FlowRegistry>,
        handlers: HandlerRegistry,
        store: Arc<dyn ContextStore>,
    ) -> Result<Self> {
        registry.validate_callables(&handlers)?;
        Ok(Self {
            controller: FlowController::new(registry),
            handlers: Arc::new(handlers),
            sessions: SessionRepository::new(store),
            locks: Mutex::new(HashMap::new()),
            max_handler_hops: EngineConfig::default().max_handler_hops,
        })
    }

    /// 按配置加载 Flow 定义与会话存储
    pub fn from_config(config: &EngineConfig, handlers: HandlerRegistry) -> Result<Self> {
        let registry = load_flows_from_path(config.flows_path()?)?;
        let store = Self::store_from_config(config)?;
        Ok(Self::new(Arc::new(registry), handlers, store)?
            .with_max_handler_hops(config.max_handler_hops)
            .with_session_prefix(config.session_prefix.clone()))
    }

    #[cfg(feature = "redis-store")]
    fn store_from_config(config: &EngineConfig) -> Result<Arc<dyn ContextStore>> {
        match &config.redis_url {
            Some(url) => {
                let mut store = crate::state::RedisStore::open(url)?;
                if let Some(ttl) = config.session_ttl_secs {
                    store = store.with_ttl(ttl);
                }
                Ok(Arc::new(store))
            }
            None => Ok(Arc::new(MemoryStore::new())),
        }
    }

    #[cfg(not(feature = "redis-store"))]
    fn store_from_config(config: &EngineConfig) -> Result<Arc<dyn ContextStore>> {
        if config.redis_url.is_some() {
            warn!("redis url configured but the `redis-store` feature is disabled; using memory store");
        }
        Ok(Arc::new(MemoryStore::new()))
    }

    pub fn with_max_handler_hops(mut self, hops: u32) -> Self {
        self.max_handler_hops = hops.max(1);
        self
    }

    pub fn with_session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sessions = self.sessions.with_prefix(prefix);
        self
    }

    pub fn controller(&self) -> &FlowController {
        &self.controller
    }

    /// 为会话启动指定 Flow
    #[instrument(skip(self, session_id), fields(session = %session_id))]
    pub async fn start(&self, session_id: &str, flow: &str) -> Result<EngineReply> {
        info!(flow, "start flow");
        self.execute(session_id, |controller, session| {
            controller.start(session, flow)
        })
        .await
    }

    /// 投递用户输入（文本或按钮值）
    #[instrument(skip(self, session_id, text), fields(session = %session_id))]
    pub async fn handle_input(&self, session_id: &str, text: &str) -> Result<EngineReply> {
        self.execute(session_id, |controller, session| {
            controller.resume(session, SessionEvent::Input(text.to_string()))
        })
        .await
    }

    /// 重新调用失败后仍在等待的 handler / generator
    #[instrument(skip(self, session_id), fields(session = %session_id))]
    pub async fn retry(&self, session_id: &str) -> Result<EngineReply> {
        self.execute(session_id, |_, session| {
            Ok(StepOutcome {
                effects: Vec::new(),
                state: session.state.clone(),
            })
        })
        .await
    }

    pub async fn session(&self, session_id: &str) -> Result<Option<Session>> {
        self.sessions.get(session_id).await
    }

    /// 丢弃会话快照
    pub async fn reset(&self, session_id: &str) -> Result<()> {
        let slot = self.session_lock(session_id);
        let _guard = slot.lock.lock().await;
        self.sessions.delete(session_id).await
    }

    async fn execute<F>(&self, session_id: &str, op: F) -> Result<EngineReply>
    where
        F: FnOnce(&FlowController, &mut Session) -> Result<StepOutcome>,
    {
        let slot = self.session_lock(session_id);
        let _guard = slot.lock.lock().await;
        self.execute_locked(session_id, op).await
    }

    async fn execute_locked<F>(&self, session_id: &str, op: F) -> Result<EngineReply>
    where
        F: FnOnce(&FlowController, &mut Session) -> Result<StepOutcome>,
    {
        let mut session = self.sessions.load_or_create(session_id).await?;

        let result = match op(&self.controller, &mut session) {
            Ok(outcome) => self.drive(&mut session, outcome.effects).await,
            Err(err) => Err(err),
        };

        // 出错时控制器已恢复到上一个挂起状态，已写入的变量同样需要保存
        self.sessions.put(&session).await?;
        debug!(
            flow = session.state.flow(),
            step = session.state.step(),
            "session saved"
        );

        let effects = result?;
        Ok(EngineReply {
            effects,
            state: session.state.clone(),
            forwarding: session.forwarding,
        })
    }

    /// 连续调用 handler / generator，直到会话等待用户输入、结束或回调失败
    async fn drive(&self, session: &mut Session, mut effects: Vec<Effect>) -> Result<Vec<Effect>> {
        let mut hops = 0u32;

        loop {
            let event = match &session.state {
                SessionState::AwaitingHandler {
                    flow,
                    step,
                    handler,
                } => {
                    hops = self.next_hop(hops)?;
                    let ctx = Self::context(session, flow, step);
                    match self.handlers.handler(handler)?.handle(&ctx).await {
                        Ok(outcome) => SessionEvent::HandlerCompleted(outcome),
                        Err(err) => SessionEvent::HandlerFailed(user_message(err)),
                    }
                }
                SessionState::AwaitingGenerator {
                    flow,
                    step,
                    generator,
                } => {
                    hops = self.next_hop(hops)?;
                    let ctx = Self::context(session, flow, step);
                    match self.handlers.generator(generator)?.generate(&ctx).await {
                        Ok(content) => SessionEvent::GeneratorCompleted(content),
                        Err(err) => SessionEvent::GeneratorFailed(user_message(err)),
                    }
                }
                _ => return Ok(effects),
            };

            let failed = event.is_failure();
            let outcome = self.controller.resume(session, event)?;
            effects.extend(outcome.effects);
            if failed {
                return Ok(effects);
            }
        }
    }

    fn next_hop(&self, hops: u32) -> Result<u32> {
        if hops >= self.max_handler_hops {
            warn!(limit = self.max_handler_hops, "handler chain too long");
            return Err(BotFlowError::MaxIterationsExceeded(self.max_handler_hops));
        }
        Ok(hops + 1)
    }

    fn context(session: &Session, flow: &str, step: &str) -> HandlerContext {
        HandlerContext {
            session_id: session.id.clone(),
            flow: flow.to_string(),
            step: step.to_string(),
            variables: session.variables.clone(),
        }
    }

    fn session_lock<'a>(&'a self, session_id: &'a str) -> SessionLock<'a> {
        let lock = Arc::clone(self.locks.lock().entry(session_id.to_string()).or_default());
        SessionLock {
            engine: self,
            session_id,
            lock,
        }
    }

    /// 没有其他调用方等待时移除会话锁
    fn release_lock(&self, session_id: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        if Arc::strong_count(lock) == 2 {
            locks.remove(session_id);
        }
    }
}

/// 持有会话锁的引用；无论调用正常结束还是 future 被丢弃都会尝试回收锁
struct SessionLock<'a> {
    engine: &'a BotEngine,
    session_id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for SessionLock<'_> {
    fn drop(&mut self) {
        self.engine.release_lock(self.session_id, &self.lock);
    }
}

/// handler 主动返回的失败信息直接展示给用户
fn user_message(err: BotFlowError) -> String {
    match err {
        BotFlowError::Handler { message, .. } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowBuilder;
    use std::time::Duration;

    fn engine() -> BotEngine {
        let flow = FlowBuilder::new("greet")
            .message("hello", "Hello", None)
            .build()
            .unwrap();
        let mut registry = FlowRegistry::new();
        registry.register(flow).unwrap();
        BotEngine::new(
            Arc::new(registry),
            HandlerRegistry::new(),
            Arc::new(MemoryStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lock_is_released_after_call() {
        let engine = engine();
        engine.start("chat-1", "greet").await.unwrap();
        engine.reset("chat-1").await.unwrap();
        assert!(engine.locks.lock().is_empty());
    }

    #[tokio::test]
    async fn cancelled_waiter_releases_lock() {
        let engine = engine();

        let holder = engine.session_lock("chat-1");
        let guard = holder.lock.lock().await;

        let mut waiting = Box::pin(engine.start("chat-1", "greet"));
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut waiting)
            .await
            .is_err());

        drop(guard);
        drop(holder);
        assert_eq!(engine.locks.lock().len(), 1);

        drop(waiting);
        assert!(engine.locks.lock().is_empty());
    }
}
