use crate::error::{BotFlowError, Result};
use crate::flow::types::{Flow, Keyboard, Step, StepKind, ValidationKind};

/// Flow 构建器
pub struct FlowBuilder {
    name: String,
    steps: Vec<Step>,
}

impl FlowBuilder {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    fn push(&mut self, id: &str, kind: StepKind, next: Option<&str>) -> &mut Self {
        let mut step = Step::new(id, kind);
        if let Some(next) = next {
            step = step.with_next(next);
        }
        self.add_step(step)
    }

    pub fn message(&mut self, id: &str, text: &str, next: Option<&str>) -> &mut Self {
        self.push(
            id,
            StepKind::Message {
                text: text.to_string(),
                keyboard: None,
            },
            next,
        )
    }

    pub fn message_with_keyboard(
        &mut self,
        id: &str,
        text: &str,
        keyboard: Keyboard,
        next: Option<&str>,
    ) -> &mut Self {
        self.push(
            id,
            StepKind::Message {
                text: text.to_string(),
                keyboard: Some(keyboard),
            },
            next,
        )
    }

    pub fn wait_input(
        &mut self,
        id: &str,
        prompt: Option<&str>,
        validation: ValidationKind,
        save_to_variable: Option<&str>,
        next: Option<&str>,
    ) -> &mut Self {
        self.push(
            id,
            StepKind::WaitInput {
                prompt: prompt.map(str::to_string),
                keyboard: None,
                validation,
                error_message: None,
                save_to_variable: save_to_variable.map(str::to_string),
            },
            next,
        )
    }

    pub fn handler(&mut self, id: &str, handler: &str, next: Option<&str>) -> &mut Self {
        self.push(
            id,
            StepKind::Handler {
                handler: handler.to_string(),
            },
            next,
        )
    }

    pub fn dynamic(&mut self, id: &str, generator: &str, next: Option<&str>) -> &mut Self {
        self.push(
            id,
            StepKind::Dynamic {
                generator: generator.to_string(),
            },
            next,
        )
    }

    pub fn dynamic_callback(
        &mut self,
        id: &str,
        generator: &str,
        save_to_variable: Option<&str>,
        next: Option<&str>,
    ) -> &mut Self {
        self.push(
            id,
            StepKind::DynamicCallback {
                generator: generator.to_string(),
                save_to_variable: save_to_variable.map(str::to_string),
                error_message: None,
            },
            next,
        )
    }

    pub fn jump(&mut self, id: &str, flow: &str, next: Option<&str>) -> &mut Self {
        self.push(
            id,
            StepKind::Flow {
                flow: flow.to_string(),
            },
            next,
        )
    }

    pub fn forwarding(&mut self, id: &str, enabled: bool, next: Option<&str>) -> &mut Self {
        self.push(id, StepKind::ForwardingControl { enabled }, next)
    }

    pub fn build(&self) -> Result<Flow> {
        Flow::new(self.name.clone(), self.steps.clone()).map_err(|step| {
            BotFlowError::DuplicateStep {
                flow: self.name.clone(),
                step,
            }
        })
    }
}
