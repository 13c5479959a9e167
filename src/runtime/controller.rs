use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{BotFlowError, Result};
use crate::flow::{FlowRegistry, Keyboard, StepKind};
use crate::handlers::HandlerOutcome;
use crate::state::{Session, SessionState};
use crate::utils::InputValidator;

use super::executor::StepExecutor;
use super::types::{Effect, SessionEvent, StepEffect, StepOutcome};

/// Flow 控制器：驱动会话在步骤间推进，直到遇到挂起点或 Flow 结束
#[derive(Clone)]
pub struct FlowController {
    registry: Arc<FlowRegistry>,
}

impl FlowController {
    pub fn new(registry: Arc<FlowRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// 从指定 Flow 的第一步开始运行；任何状态下都可以调用
    pub fn start(&self, session: &mut Session, flow_name: &str) -> Result<StepOutcome> {
        let previous = session.state.clone();
        debug!(session = %session.id, flow = flow_name, "starting flow");

        let result = self.first_step_id(flow_name).and_then(|first| {
            session.pending_keyboard = None;
            let mut effects = Vec::new();
            self.run(session, flow_name.to_string(), Some(first), &mut effects)?;
            Ok(effects)
        });
        self.finish(session, previous, result)
    }

    /// 消费与当前挂起状态匹配的外部事件并继续运行
    pub fn resume(&self, session: &mut Session, event: SessionEvent) -> Result<StepOutcome> {
        let previous = session.state.clone();
        debug!(session = %session.id, state = %previous, event = event.name(), "resuming");

        let mut effects = Vec::new();
        let result = match (previous.clone(), event) {
            (SessionState::AwaitingInput { flow, step }, SessionEvent::Input(text)) => {
                self.on_input(session, flow, step, &text, &mut effects)
            }
            (
                SessionState::AwaitingHandler { flow, step, .. },
                SessionEvent::HandlerCompleted(outcome),
            ) => self.on_handler_completed(session, flow, step, outcome, &mut effects),
            (SessionState::AwaitingHandler { handler, .. }, SessionEvent::HandlerFailed(message)) => {
                warn!(session = %session.id, handler = %handler, error = %message, "handler failed");
                effects.push(Effect::HandlerFailed {
                    name: handler,
                    message,
                });
                Ok(())
            }
            (
                SessionState::AwaitingGenerator { flow, step, .. },
                SessionEvent::GeneratorCompleted(content),
            ) => self.on_generator_completed(session, flow, step, content, &mut effects),
            (
                SessionState::AwaitingGenerator { generator, .. },
                SessionEvent::GeneratorFailed(message),
            ) => {
                warn!(session = %session.id, generator = %generator, error = %message, "generator failed");
                effects.push(Effect::HandlerFailed {
                    name: generator,
                    message,
                });
                Ok(())
            }
            (state, event) => Err(BotFlowError::UnexpectedEvent {
                state: state.to_string(),
                event: event.name().to_string(),
            }),
        };

        self.finish(session, previous, result.map(|_| effects))
    }

    fn finish(
        &self,
        session: &mut Session,
        previous: SessionState,
        result: Result<Vec<Effect>>,
    ) -> Result<StepOutcome> {
        match result {
            Ok(effects) => Ok(StepOutcome {
                effects,
                state: session.state.clone(),
            }),
            Err(err) => {
                // 回到最后一个已知的挂起/结束状态；本轮已写入的变量保留
                warn!(session = %session.id, error = %err, "flow run aborted");
                session.state = previous;
                Err(err)
            }
        }
    }

    fn first_step_id(&self, flow_name: &str) -> Result<String> {
        self.registry
            .flow(flow_name)?
            .first_step()
            .map(|step| step.id.clone())
            .ok_or_else(|| BotFlowError::EmptyFlow(flow_name.to_string()))
    }

    fn on_input(
        &self,
        session: &mut Session,
        flow: String,
        step_id: String,
        text: &str,
        effects: &mut Vec<Effect>,
    ) -> Result<()> {
        let step = self.registry.step(&flow, &step_id)?;
        match &step.kind {
            StepKind::WaitInput {
                keyboard,
                validation,
                error_message,
                save_to_variable,
                ..
            } => match InputValidator::validate(*validation, text, error_message.as_deref()) {
                Ok(value) => {
                    if let Some(path) = save_to_variable {
                        session.variables.set_path(path, value)?;
                    }
                    let next = step.next().map(str::to_string);
                    self.run(session, flow, next, effects)
                }
                Err(message) => {
                    debug!(session = %session.id, step = %step_id, "input rejected");
                    Self::reprompt(message, keyboard.clone(), step_id, effects);
                    Ok(())
                }
            },
            StepKind::DynamicCallback {
                save_to_variable,
                error_message,
                ..
            } => {
                let choice = text.trim();
                let choices = session.pending_choices();
                let offered = choices.is_empty() || choices.iter().any(|value| value == choice);
                if choice.is_empty() || !offered {
                    let message = InputValidator::error_text(error_message.as_deref());
                    let keyboard = session.pending_keyboard.clone();
                    Self::reprompt(message, keyboard, step_id, effects);
                    return Ok(());
                }
                if let Some(path) = save_to_variable {
                    session.variables.set_path(path, choice)?;
                }
                session.pending_keyboard = None;
                let next = step.next().map(str::to_string);
                self.run(session, flow, next, effects)
            }
            other => Err(BotFlowError::UnexpectedEvent {
                state: format!("awaiting input at {flow}/{step_id} ({})", other.type_name()),
                event: "input".to_string(),
            }),
        }
    }

    fn reprompt(
        message: String,
        keyboard: Option<Keyboard>,
        step_id: String,
        effects: &mut Vec<Effect>,
    ) {
        effects.push(Effect::SendMessage {
            text: message,
            keyboard,
        });
        effects.push(Effect::AwaitInput {
            prompt_step_id: step_id,
        });
    }

    fn on_handler_completed(
        &self,
        session: &mut Session,
        flow: String,
        step_id: String,
        outcome: HandlerOutcome,
        effects: &mut Vec<Effect>,
    ) -> Result<()> {
        let step = self.registry.step(&flow, &step_id)?;

        for update in outcome.updates {
            session.variables.set_path(&update.path, update.value)?;
        }
        effects.extend(outcome.messages.into_iter().map(Effect::message));

        if let Some(target) = outcome.next_flow.filter(|name| !name.is_empty()) {
            let first = self.first_step_id(&target)?;
            effects.push(Effect::JumpFlow {
                flow_name: target.clone(),
            });
            return self.run(session, target, Some(first), effects);
        }

        let next = match outcome.next_step.filter(|id| !id.is_empty()) {
            Some(next) => {
                // override 只能指向同一 Flow 中的步骤
                self.registry.step(&flow, &next)?;
                Some(next)
            }
            None => step.next().map(str::to_string),
        };
        self.run(session, flow, next, effects)
    }

    fn on_generator_completed(
        &self,
        session: &mut Session,
        flow: String,
        step_id: String,
        content: crate::handlers::OutgoingMessage,
        effects: &mut Vec<Effect>,
    ) -> Result<()> {
        let step = self.registry.step(&flow, &step_id)?;
        match &step.kind {
            StepKind::Dynamic { .. } => {
                effects.push(Effect::message(content));
                let next = step.next().map(str::to_string);
                self.run(session, flow, next, effects)
            }
            StepKind::DynamicCallback { .. } => {
                session.pending_keyboard = content
                    .keyboard
                    .clone()
                    .filter(|keyboard| !keyboard.is_empty());
                effects.push(Effect::message(content));
                effects.push(Effect::AwaitInput {
                    prompt_step_id: step_id.clone(),
                });
                session.state = SessionState::AwaitingInput {
                    flow,
                    step: step_id,
                };
                Ok(())
            }
            other => Err(BotFlowError::UnexpectedEvent {
                state: format!("awaiting generator at {flow}/{step_id} ({})", other.type_name()),
                event: "generator_completed".to_string(),
            }),
        }
    }

    /// 运行直到挂起：依次执行不挂起的步骤，遇到挂起步骤或 Flow 结束时返回。
    /// 同一轮中重复访问同一步骤视为死循环。
    fn run(
        &self,
        session: &mut Session,
        mut flow: String,
        mut next: Option<String>,
        effects: &mut Vec<Effect>,
    ) -> Result<()> {
        let mut visited: HashSet<(String, String)> = HashSet::new();

        loop {
            let Some(step_id) = next.take() else {
                debug!(session = %session.id, flow = %flow, "flow terminated");
                session.state = SessionState::Terminated { flow };
                return Ok(());
            };

            if !visited.insert((flow.clone(), step_id.clone())) {
                warn!(session = %session.id, flow = %flow, step = %step_id, "flow cycle detected");
                return Err(BotFlowError::FlowCycleDetected {
                    flow,
                    step: step_id,
                });
            }

            let step = self.registry.step(&flow, &step_id)?;
            debug!(
                session = %session.id,
                flow = %flow,
                step = %step_id,
                step_type = step.kind.type_name(),
                "executing step"
            );

            if let Some(prompt) = StepExecutor::prompt(step, &session.variables) {
                effects.push(prompt);
            }

            let effect = StepExecutor::execute(step, &session.variables);
            let suspended = match &effect {
                StepEffect::SendMessage { .. } => {
                    next = step.next().map(str::to_string);
                    None
                }
                StepEffect::SetFlag { value, .. } => {
                    session.forwarding = *value;
                    next = step.next().map(str::to_string);
                    None
                }
                StepEffect::JumpFlow { flow_name } => {
                    let target = flow_name.clone();
                    next = Some(self.first_step_id(&target)?);
                    flow = target;
                    None
                }
                StepEffect::AwaitInput { .. } => Some(SessionState::AwaitingInput {
                    flow: flow.clone(),
                    step: step_id.clone(),
                }),
                StepEffect::InvokeHandler { name } => Some(SessionState::AwaitingHandler {
                    flow: flow.clone(),
                    step: step_id.clone(),
                    handler: name.clone(),
                }),
                StepEffect::InvokeGenerator { name, .. } => Some(SessionState::AwaitingGenerator {
                    flow: flow.clone(),
                    step: step_id.clone(),
                    generator: name.clone(),
                }),
            };
            effects.push(effect.into());

            if let Some(state) = suspended {
                session.state = state;
                return Ok(());
            }
        }
    }
}
