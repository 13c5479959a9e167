use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::flow::Keyboard;
use crate::state::VariableBag;

/// 发往消息通道的一条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// handler 请求写入的变量
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableUpdate {
    pub path: String,
    pub value: Value,
}

/// handler 执行结果
///
/// `next_flow` 优先于 `next_step`；两者都为空时沿用步骤静态配置的 `nextStepId`。
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandlerOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_flow: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<OutgoingMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<VariableUpdate>,
}

impl HandlerOutcome {
    /// 不覆盖下一步
    pub fn proceed() -> Self {
        Self::default()
    }

    /// 跳转到同一 Flow 中的指定步骤
    pub fn goto(step: impl Into<String>) -> Self {
        Self {
            next_step: Some(step.into()),
            ..Self::default()
        }
    }

    /// 跳转到另一个 Flow 的第一步
    pub fn jump(flow: impl Into<String>) -> Self {
        Self {
            next_flow: Some(flow.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: OutgoingMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates.push(VariableUpdate {
            path: path.into(),
            value: value.into(),
        });
        self
    }
}

/// 调用 handler / generator 时传入的会话快照
#[derive(Clone, Debug)]
pub struct HandlerContext {
    pub session_id: String,
    pub flow: String,
    pub step: String,
    pub variables: VariableBag,
}

impl HandlerContext {
    pub fn var(&self, path: &str) -> Option<String> {
        self.variables.get_str(path)
    }
}

/// 业务逻辑回调
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, ctx: &HandlerContext) -> Result<HandlerOutcome>;
}

/// 动态内容（文本 / 键盘）生成器
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, ctx: &HandlerContext) -> Result<OutgoingMessage>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> StepHandler for FnHandler<F>
where
    F: Fn(&HandlerContext) -> Result<HandlerOutcome> + Send + Sync,
{
    async fn handle(&self, ctx: &HandlerContext) -> Result<HandlerOutcome> {
        (self.0)(ctx)
    }
}

struct FnGenerator<F>(F);

#[async_trait]
impl<F> ContentGenerator for FnGenerator<F>
where
    F: Fn(&HandlerContext) -> Result<OutgoingMessage> + Send + Sync,
{
    async fn generate(&self, ctx: &HandlerContext) -> Result<OutgoingMessage> {
        (self.0)(ctx)
    }
}

/// 从同步函数创建 handler
pub fn handler_from_fn<F>(func: F) -> std::sync::Arc<dyn StepHandler>
where
    F: Fn(&HandlerContext) -> Result<HandlerOutcome> + Send + Sync + 'static,
{
    std::sync::Arc::new(FnHandler(func))
}

/// 从同步函数创建 generator
pub fn generator_from_fn<F>(func: F) -> std::sync::Arc<dyn ContentGenerator>
where
    F: Fn(&HandlerContext) -> Result<OutgoingMessage> + Send + Sync + 'static,
{
    std::sync::Arc::new(FnGenerator(func))
}
