use crate::flow::{Step, StepKind};
use crate::state::{render_template, VariableBag};

use super::types::{Effect, StepEffect};

/// 会话转发开关的名称
pub const FORWARDING_FLAG: &str = "forwarding";

/// Step 执行器：根据步骤类型产生 Effect，本身不做任何 I/O
pub struct StepExecutor;

impl StepExecutor {
    /// 对步骤类型做完全匹配，每种类型恰好产生一个 Effect
    pub fn execute(step: &Step, variables: &VariableBag) -> StepEffect {
        match &step.kind {
            StepKind::Message { text, keyboard } => StepEffect::SendMessage {
                text: render_template(text, variables),
                keyboard: keyboard.clone(),
            },
            StepKind::WaitInput { .. } => StepEffect::AwaitInput {
                prompt_step_id: step.id.clone(),
            },
            StepKind::Handler { handler } => StepEffect::InvokeHandler {
                name: handler.clone(),
            },
            StepKind::Dynamic { generator } => StepEffect::InvokeGenerator {
                name: generator.clone(),
                capture: None,
            },
            StepKind::DynamicCallback {
                generator,
                save_to_variable,
                ..
            } => StepEffect::InvokeGenerator {
                name: generator.clone(),
                capture: save_to_variable.clone(),
            },
            StepKind::Flow { flow } => StepEffect::JumpFlow {
                flow_name: flow.clone(),
            },
            StepKind::ForwardingControl { enabled } => StepEffect::SetFlag {
                name: FORWARDING_FLAG.to_string(),
                value: *enabled,
            },
        }
    }

    /// wait_input 步骤在挂起前发送的提示消息
    pub fn prompt(step: &Step, variables: &VariableBag) -> Option<Effect> {
        match &step.kind {
            StepKind::WaitInput {
                prompt: Some(prompt),
                keyboard,
                ..
            } => Some(Effect::SendMessage {
                text: render_template(prompt, variables),
                keyboard: keyboard.clone(),
            }),
            _ => None,
        }
    }
}
