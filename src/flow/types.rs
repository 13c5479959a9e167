use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Flow 核心类型定义

/// 键盘按钮
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(
        default,
        rename = "callbackData",
        alias = "callback_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_data: Option<String>,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
        }
    }

    pub fn with_callback(mut self, data: impl Into<String>) -> Self {
        self.callback_data = Some(data.into());
        self
    }

    /// 按钮被点击时提交的值
    pub fn value(&self) -> &str {
        self.callback_data.as_deref().unwrap_or(&self.text)
    }
}

/// 键盘（按行排列的按钮）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<KeyboardButton>>) -> Self {
        Self { rows }
    }

    /// 每个按钮单独一行
    pub fn single_column<I, T>(labels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            rows: labels
                .into_iter()
                .map(|label| vec![KeyboardButton::new(label)])
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }

    pub fn choices(&self) -> Vec<String> {
        self.rows
            .iter()
            .flatten()
            .map(|button| button.value().to_string())
            .collect()
    }
}

/// 输入校验类型
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    #[default]
    None,
    Text,
    Number,
    Integer,
    Email,
}

impl ValidationKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" | "none" => Some(ValidationKind::None),
            "text" => Some(ValidationKind::Text),
            "number" => Some(ValidationKind::Number),
            "integer" => Some(ValidationKind::Integer),
            "email" => Some(ValidationKind::Email),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::None => "none",
            ValidationKind::Text => "text",
            ValidationKind::Number => "number",
            ValidationKind::Integer => "integer",
            ValidationKind::Email => "email",
        }
    }
}

/// Step 类型
#[derive(Clone, Debug, PartialEq)]
pub enum StepKind {
    Message {
        text: String,
        keyboard: Option<Keyboard>,
    },
    WaitInput {
        prompt: Option<String>,
        keyboard: Option<Keyboard>,
        validation: ValidationKind,
        error_message: Option<String>,
        save_to_variable: Option<String>,
    },
    Handler {
        handler: String,
    },
    Dynamic {
        generator: String,
    },
    DynamicCallback {
        generator: String,
        save_to_variable: Option<String>,
        error_message: Option<String>,
    },
    Flow {
        flow: String,
    },
    ForwardingControl {
        enabled: bool,
    },
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Message { .. } => "message",
            StepKind::WaitInput { .. } => "wait_input",
            StepKind::Handler { .. } => "handler",
            StepKind::Dynamic { .. } => "dynamic",
            StepKind::DynamicCallback { .. } => "dynamic_callback",
            StepKind::Flow { .. } => "flow",
            StepKind::ForwardingControl { .. } => "forwarding_control",
        }
    }
}

/// Flow 中的单个步骤
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub id: String,
    pub next_step_id: Option<String>,
    pub kind: StepKind,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            next_step_id: None,
            kind,
        }
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        let next = next.into();
        self.next_step_id = if next.is_empty() { None } else { Some(next) };
        self
    }

    pub fn next(&self) -> Option<&str> {
        self.next_step_id.as_deref().filter(|next| !next.is_empty())
    }
}

/// Flow 工作流（加载后不可变）
#[derive(Clone, Debug)]
pub struct Flow {
    pub name: String,
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl Flow {
    /// 构造时拒绝重复的 step id，返回重复的 id
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> std::result::Result<Self, String> {
        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            if index.insert(step.id.clone(), position).is_some() {
                return Err(step.id.clone());
            }
        }
        Ok(Self {
            name: name.into(),
            steps,
            index,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&position| &self.steps[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_value_falls_back_to_text() {
        let plain = KeyboardButton::new("Yes");
        let tagged = KeyboardButton::new("No").with_callback("answer_no");
        assert_eq!(plain.value(), "Yes");
        assert_eq!(tagged.value(), "answer_no");
    }

    #[test]
    fn flow_rejects_duplicate_step_ids() {
        let steps = vec![
            Step::new("a", StepKind::Handler { handler: "h".into() }),
            Step::new("a", StepKind::Handler { handler: "h".into() }),
        ];
        assert_eq!(Flow::new("dup", steps).unwrap_err(), "a");
    }

    #[test]
    fn empty_next_step_means_termination() {
        let step = Step::new("a", StepKind::ForwardingControl { enabled: true }).with_next("");
        assert_eq!(step.next(), None);
    }
}
