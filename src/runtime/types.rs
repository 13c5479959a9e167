use serde::{Deserialize, Serialize};

use crate::flow::Keyboard;
use crate::handlers::{HandlerOutcome, OutgoingMessage};
use crate::state::SessionState;

/// 运行时类型定义

/// 步骤执行产生的副作用描述，由消息通道等外部协作方执行
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    SendMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyboard: Option<Keyboard>,
    },
    AwaitInput {
        prompt_step_id: String,
    },
    InvokeHandler {
        name: String,
    },
    InvokeGenerator {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capture: Option<String>,
    },
    JumpFlow {
        flow_name: String,
    },
    SetFlag {
        name: String,
        value: bool,
    },
    HandlerFailed {
        name: String,
        message: String,
    },
}

impl Effect {
    pub fn message(message: OutgoingMessage) -> Self {
        Effect::SendMessage {
            text: message.text,
            keyboard: message.keyboard,
        }
    }
}

/// 单个步骤执行产生的 Effect；handler 失败只由控制器报告，不在此列
#[derive(Clone, Debug, PartialEq)]
pub enum StepEffect {
    SendMessage {
        text: String,
        keyboard: Option<Keyboard>,
    },
    AwaitInput {
        prompt_step_id: String,
    },
    InvokeHandler {
        name: String,
    },
    InvokeGenerator {
        name: String,
        capture: Option<String>,
    },
    JumpFlow {
        flow_name: String,
    },
    SetFlag {
        name: String,
        value: bool,
    },
}

impl StepEffect {
    /// 是否会让引擎挂起等待外部事件
    pub fn suspends(&self) -> bool {
        matches!(
            self,
            StepEffect::AwaitInput { .. }
                | StepEffect::InvokeHandler { .. }
                | StepEffect::InvokeGenerator { .. }
        )
    }
}

impl From<StepEffect> for Effect {
    fn from(effect: StepEffect) -> Self {
        match effect {
            StepEffect::SendMessage { text, keyboard } => Effect::SendMessage { text, keyboard },
            StepEffect::AwaitInput { prompt_step_id } => Effect::AwaitInput { prompt_step_id },
            StepEffect::InvokeHandler { name } => Effect::InvokeHandler { name },
            StepEffect::InvokeGenerator { name, capture } => {
                Effect::InvokeGenerator { name, capture }
            }
            StepEffect::JumpFlow { flow_name } => Effect::JumpFlow { flow_name },
            StepEffect::SetFlag { name, value } => Effect::SetFlag { name, value },
        }
    }
}

/// 恢复挂起会话的外部事件
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Input(String),
    HandlerCompleted(HandlerOutcome),
    HandlerFailed(String),
    GeneratorCompleted(OutgoingMessage),
    GeneratorFailed(String),
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Input(_) => "input",
            SessionEvent::HandlerCompleted(_) => "handler_completed",
            SessionEvent::HandlerFailed(_) => "handler_failed",
            SessionEvent::GeneratorCompleted(_) => "generator_completed",
            SessionEvent::GeneratorFailed(_) => "generator_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionEvent::HandlerFailed(_) | SessionEvent::GeneratorFailed(_)
        )
    }
}

/// 一次 start / resume 的结果
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub effects: Vec<Effect>,
    pub state: SessionState,
}

impl StepOutcome {
    /// 所有 SendMessage 的文本
    pub fn messages(&self) -> Vec<&str> {
        message_texts(&self.effects)
    }
}

pub(crate) fn message_texts(effects: &[Effect]) -> Vec<&str> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::SendMessage { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}
