use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::ContextStore;
use super::variables::VariableBag;
use crate::error::Result;
use crate::flow::Keyboard;

const SESSION_PREFIX: &str = "session";

/// 会话在 Flow 中所处的位置
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingInput {
        flow: String,
        step: String,
    },
    AwaitingHandler {
        flow: String,
        step: String,
        handler: String,
    },
    AwaitingGenerator {
        flow: String,
        step: String,
        generator: String,
    },
    Terminated {
        flow: String,
    },
}

impl SessionState {
    pub fn awaiting_input(flow: impl Into<String>, step: impl Into<String>) -> Self {
        SessionState::AwaitingInput {
            flow: flow.into(),
            step: step.into(),
        }
    }

    pub fn awaiting_handler(
        flow: impl Into<String>,
        step: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        SessionState::AwaitingHandler {
            flow: flow.into(),
            step: step.into(),
            handler: handler.into(),
        }
    }

    pub fn awaiting_generator(
        flow: impl Into<String>,
        step: impl Into<String>,
        generator: impl Into<String>,
    ) -> Self {
        SessionState::AwaitingGenerator {
            flow: flow.into(),
            step: step.into(),
            generator: generator.into(),
        }
    }

    /// 当前 Flow 名称（Idle 时为空）
    pub fn flow(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::AwaitingInput { flow, .. }
            | SessionState::AwaitingHandler { flow, .. }
            | SessionState::AwaitingGenerator { flow, .. }
            | SessionState::Terminated { flow } => Some(flow),
        }
    }

    /// 当前 Step id（仅挂起状态有值）
    pub fn step(&self) -> Option<&str> {
        match self {
            SessionState::AwaitingInput { step, .. }
            | SessionState::AwaitingHandler { step, .. }
            | SessionState::AwaitingGenerator { step, .. } => Some(step),
            SessionState::Idle | SessionState::Terminated { .. } => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingInput { flow, step } => {
                write!(f, "awaiting input at {flow}/{step}")
            }
            SessionState::AwaitingHandler {
                flow,
                step,
                handler,
            } => write!(f, "awaiting handler `{handler}` at {flow}/{step}"),
            SessionState::AwaitingGenerator {
                flow,
                step,
                generator,
            } => write!(f, "awaiting generator `{generator}` at {flow}/{step}"),
            SessionState::Terminated { flow } => write!(f, "terminated in {flow}"),
        }
    }
}

/// 单个会话的运行时快照，挂起期间唯一需要持久化的状态
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub state: SessionState,
    #[serde(default)]
    pub variables: VariableBag,
    #[serde(default)]
    pub forwarding: bool,
    /// dynamic_callback 步骤最近一次生成的按钮
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_keyboard: Option<Keyboard>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Idle,
            variables: VariableBag::new(),
            forwarding: false,
            pending_keyboard: None,
        }
    }

    /// 当前可接受的按钮值；为空表示不限制
    pub fn pending_choices(&self) -> Vec<String> {
        self.pending_keyboard
            .as_ref()
            .map(Keyboard::choices)
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// 会话仓库：在 ContextStore 之上按 `{prefix}:{id}` 存取 Session
#[derive(Clone)]
pub struct SessionRepository {
    pub store: Arc<dyn ContextStore>,
    prefix: String,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self {
            store,
            prefix: SESSION_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key_with_prefix(&self, id: &str) -> String {
        format!("{}:{id}", self.prefix)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        match self.store.get(&self.key_with_prefix(id)).await? {
            Some(raw) => Ok(Some(Session::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// 读取会话，不存在时新建（尚未写回存储）
    pub async fn load_or_create(&self, id: &str) -> Result<Session> {
        Ok(self.get(id).await?.unwrap_or_else(|| Session::new(id)))
    }

    pub async fn put(&self, session: &Session) -> Result<()> {
        self.store
            .set(&self.key_with_prefix(&session.id), session.to_json()?)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(&self.key_with_prefix(id)).await
    }
}
