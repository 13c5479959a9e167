use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotFlowError>;

#[derive(Debug, Error)]
pub enum BotFlowError {
    #[error("flow `{0}` not registered")]
    UnknownFlow(String),
    #[error("unknown step `{step}` in flow `{flow}`")]
    UnknownStep { flow: String, step: String },
    #[error("step `{step}` in flow `{flow}` has unsupported type `{step_type}`")]
    UnsupportedStepType {
        flow: String,
        step: String,
        step_type: String,
    },
    #[error("step `{step}` in flow `{flow}` points to missing next step `{next}`")]
    DanglingNextStepId {
        flow: String,
        step: String,
        next: String,
    },
    #[error("step `{step}` in flow `{flow}` is invalid: {reason}")]
    InvalidStep {
        flow: String,
        step: String,
        reason: String,
    },
    #[error("step `{step}` in flow `{flow}` uses unsupported validation `{kind}`")]
    UnsupportedValidation {
        flow: String,
        step: String,
        kind: String,
    },
    #[error("duplicate step `{step}` in flow `{flow}`")]
    DuplicateStep { flow: String, step: String },
    #[error("flow `{0}` registered twice")]
    DuplicateFlow(String),
    #[error("flow `{0}` has no steps")]
    EmptyFlow(String),
    #[error("handler `{0}` not registered")]
    HandlerNotRegistered(String),
    #[error("generator `{0}` not registered")]
    GeneratorNotRegistered(String),
    #[error("cycle detected in flow `{flow}` at step `{step}`")]
    FlowCycleDetected { flow: String, step: String },
    #[error("event `{event}` cannot be applied while session is {state}")]
    UnexpectedEvent { state: String, event: String },
    #[error("invalid variable path `{0}`")]
    InvalidVariablePath(String),
    #[error("variable path `{path}` blocked by non-object value at `{segment}`")]
    VariablePathConflict { path: String, segment: String },
    #[error("maximum iterations {0} exceeded")]
    MaxIterationsExceeded(u32),
    #[error("handler `{name}` failed: {message}")]
    Handler { name: String, message: String },
    #[error("context error: {0}")]
    Context(String),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BotFlowError {
    /// 配置类错误：静态流程定义有误，不应重试
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BotFlowError::UnknownFlow(_)
                | BotFlowError::UnknownStep { .. }
                | BotFlowError::UnsupportedStepType { .. }
                | BotFlowError::DanglingNextStepId { .. }
                | BotFlowError::InvalidStep { .. }
                | BotFlowError::UnsupportedValidation { .. }
                | BotFlowError::DuplicateStep { .. }
                | BotFlowError::DuplicateFlow(_)
                | BotFlowError::EmptyFlow(_)
                | BotFlowError::HandlerNotRegistered(_)
                | BotFlowError::GeneratorNotRegistered(_)
                | BotFlowError::InvalidVariablePath(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_definition_errors_are_configuration() {
        let dangling = BotFlowError::DanglingNextStepId {
            flow: "onboarding".into(),
            step: "ask_name".into(),
            next: "missing".into(),
        };
        assert!(dangling.is_configuration());
        assert!(BotFlowError::InvalidVariablePath("a..b".into()).is_configuration());
        assert!(BotFlowError::HandlerNotRegistered("createCompany".into()).is_configuration());
    }

    #[test]
    fn runtime_errors_are_not_configuration() {
        let cycle = BotFlowError::FlowCycleDetected {
            flow: "loop".into(),
            step: "a".into(),
        };
        assert!(!cycle.is_configuration());
        assert!(!BotFlowError::MaxIterationsExceeded(64).is_configuration());
        assert!(!BotFlowError::VariablePathConflict {
            path: "a.b".into(),
            segment: "a".into(),
        }
        .is_configuration());
    }
}
