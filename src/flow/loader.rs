use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{BotFlowError, Result};
use crate::flow::registry::FlowRegistry;
use crate::flow::types::{Flow, Keyboard, Step, StepKind, ValidationKind};
use crate::state::VariableBag;

/// Flow 定义文件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsDocument {
    pub flows: Vec<FlowConfig>,
}

/// 单个 Flow 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step 配置（未解析的原始形式）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<Keyboard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_to_variable: Option<String>,
    #[serde(default, alias = "generator", skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    #[serde(default, alias = "flow", skip_serializing_if = "Option::is_none")]
    pub next_flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
}

impl StepConfig {
    fn invalid(&self, flow: &str, reason: impl Into<String>) -> BotFlowError {
        BotFlowError::InvalidStep {
            flow: flow.to_string(),
            step: self.id.clone(),
            reason: reason.into(),
        }
    }

    /// 变量路径在加载时检查，避免运行到该步骤才失败
    fn save_path(&self) -> Result<Option<String>> {
        if let Some(path) = &self.save_to_variable {
            VariableBag::check_path(path)?;
        }
        Ok(self.save_to_variable.clone())
    }

    fn require<'a>(
        &self,
        flow: &str,
        field: &'static str,
        value: &'a Option<String>,
    ) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| self.invalid(flow, format!("missing `{field}`")))
    }

    /// 解析为强类型 Step；未知类型在加载阶段即报错
    pub fn into_step(self, flow: &str) -> Result<Step> {
        if self.id.trim().is_empty() {
            return Err(self.invalid(flow, "missing `id`"));
        }

        let kind = match self.step_type.as_str() {
            "message" => StepKind::Message {
                text: self.require(flow, "message", &self.message)?.to_string(),
                keyboard: self.keyboard.clone(),
            },
            "wait_input" => {
                let validation = match self.validation.as_deref() {
                    None => ValidationKind::None,
                    Some(raw) => ValidationKind::parse(raw).ok_or_else(|| {
                        BotFlowError::UnsupportedValidation {
                            flow: flow.to_string(),
                            step: self.id.clone(),
                            kind: raw.to_string(),
                        }
                    })?,
                };
                StepKind::WaitInput {
                    prompt: self.message.clone(),
                    keyboard: self.keyboard.clone(),
                    validation,
                    error_message: self.error_message.clone(),
                    save_to_variable: self.save_path()?,
                }
            }
            "handler" => StepKind::Handler {
                handler: self.require(flow, "handler", &self.handler)?.to_string(),
            },
            "dynamic" => StepKind::Dynamic {
                generator: self.require(flow, "handler", &self.handler)?.to_string(),
            },
            "dynamic_callback" => StepKind::DynamicCallback {
                generator: self.require(flow, "handler", &self.handler)?.to_string(),
                save_to_variable: self.save_path()?,
                error_message: self.error_message.clone(),
            },
            "flow" => StepKind::Flow {
                flow: self.require(flow, "nextFlow", &self.next_flow)?.to_string(),
            },
            "forwarding_control" => StepKind::ForwardingControl {
                enabled: self
                    .enabled
                    .ok_or_else(|| self.invalid(flow, "missing `enabled`"))?,
            },
            other => {
                return Err(BotFlowError::UnsupportedStepType {
                    flow: flow.to_string(),
                    step: self.id.clone(),
                    step_type: other.to_string(),
                })
            }
        };

        let mut step = Step::new(self.id, kind);
        if let Some(next) = self.next_step_id {
            step = step.with_next(next);
        }
        Ok(step)
    }
}

impl FlowConfig {
    pub fn into_flow(self) -> Result<Flow> {
        let name = self.name;
        let steps = self
            .steps
            .into_iter()
            .map(|step| step.into_step(&name))
            .collect::<Result<Vec<_>>>()?;
        Flow::new(name.clone(), steps).map_err(|step| BotFlowError::DuplicateStep { flow: name, step })
    }
}

/// 从 JSON 值加载并校验所有 Flow
pub fn load_flows_from_value(value: &Value) -> Result<FlowRegistry> {
    let document: FlowsDocument = serde_json::from_value(value.clone())?;
    build_registry(document)
}

/// 从 JSON 字符串加载并校验所有 Flow
pub fn load_flows_from_str(content: &str) -> Result<FlowRegistry> {
    let document: FlowsDocument = serde_json::from_str(content)?;
    build_registry(document)
}

/// 从文件加载并校验所有 Flow
pub fn load_flows_from_path(path: impl AsRef<Path>) -> Result<FlowRegistry> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading flow definitions");
    let content = fs::read_to_string(path)?;
    load_flows_from_str(&content)
}

fn build_registry(document: FlowsDocument) -> Result<FlowRegistry> {
    let mut registry = FlowRegistry::new();
    for config in document.flows {
        registry.register(config.into_flow()?)?;
    }
    registry.validate()?;
    info!(flows = registry.len(), "flow definitions loaded");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_step_type_fails_at_load() {
        let config = json!({
            "flows": [{
                "name": "menu",
                "steps": [{ "id": "show", "type": "carousel" }]
            }]
        });

        match load_flows_from_value(&config) {
            Err(BotFlowError::UnsupportedStepType {
                flow,
                step,
                step_type,
            }) => {
                assert_eq!(flow, "menu");
                assert_eq!(step, "show");
                assert_eq!(step_type, "carousel");
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected load failure"),
        }
    }

    #[test]
    fn wait_input_parses_camel_case_fields() {
        let config: StepConfig = serde_json::from_value(json!({
            "id": "ask_email",
            "type": "wait_input",
            "message": "Your email?",
            "validation": "email",
            "errorMessage": "That is not an email",
            "saveToVariable": "user.email",
            "nextStepId": "done"
        }))
        .unwrap();

        let step = config.into_step("signup").unwrap();
        assert_eq!(step.next(), Some("done"));
        match step.kind {
            StepKind::WaitInput {
                prompt,
                validation,
                error_message,
                save_to_variable,
                ..
            } => {
                assert_eq!(prompt.as_deref(), Some("Your email?"));
                assert_eq!(validation, ValidationKind::Email);
                assert_eq!(error_message.as_deref(), Some("That is not an email"));
                assert_eq!(save_to_variable.as_deref(), Some("user.email"));
            }
            other => panic!("expected wait_input, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_validation_is_rejected() {
        let config: StepConfig = serde_json::from_value(json!({
            "id": "ask",
            "type": "wait_input",
            "validation": "phone"
        }))
        .unwrap();
        assert!(matches!(
            config.into_step("f"),
            Err(BotFlowError::UnsupportedValidation { kind, .. }) if kind == "phone"
        ));
    }

    #[test]
    fn handler_step_requires_name() {
        let config: StepConfig = serde_json::from_value(json!({
            "id": "check",
            "type": "handler"
        }))
        .unwrap();
        assert!(matches!(
            config.into_step("f"),
            Err(BotFlowError::InvalidStep { .. })
        ));
    }

    #[test]
    fn malformed_save_path_fails_at_load() {
        let config = json!({
            "flows": [{
                "name": "onboarding",
                "steps": [{
                    "id": "ask_name",
                    "type": "wait_input",
                    "saveToVariable": "company..name"
                }]
            }]
        });

        let err = load_flows_from_value(&config).err().expect("load should fail");
        assert!(matches!(&err, BotFlowError::InvalidVariablePath(path) if path == "company..name"));
        assert!(err.is_configuration());
    }

    #[test]
    fn dynamic_callback_save_path_is_checked() {
        let config: StepConfig = serde_json::from_value(json!({
            "id": "confirm",
            "type": "dynamic_callback",
            "handler": "confirmKeyboard",
            "saveToVariable": "offer."
        }))
        .unwrap();
        assert!(matches!(
            config.into_step("offer"),
            Err(BotFlowError::InvalidVariablePath(_))
        ));
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.json");
        fs::write(
            &path,
            json!({
                "flows": [{
                    "name": "ping",
                    "steps": [{ "id": "pong", "type": "message", "message": "pong" }]
                }]
            })
            .to_string(),
        )
        .unwrap();

        let registry = load_flows_from_path(&path).unwrap();
        assert_eq!(registry.names(), vec!["ping"]);
    }
}
