use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BotFlowError, Result};

/// 会话变量树，按点分路径寻址（如 `company.name`）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableBag {
    root: Map<String, Value>,
}

fn segments(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|segment| segment.trim().is_empty()) {
        return Err(BotFlowError::InvalidVariablePath(path.to_string()));
    }
    Ok(parts)
}

impl VariableBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 检查路径格式：非空且每一段都不为空
    pub fn check_path(path: &str) -> Result<()> {
        segments(path).map(|_| ())
    }

    /// 写入路径；缺失的中间节点自动创建为对象，已有叶子值被覆盖。
    /// 中间节点存在但不是对象时返回 `VariablePathConflict`，且不做任何写入。
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let parts = segments(path)?;
        let (leaf, parents) = parts
            .split_last()
            .ok_or_else(|| BotFlowError::InvalidVariablePath(path.to_string()))?;

        // 先检查冲突，保证失败时不留下半截中间节点
        let mut cursor = &self.root;
        for (depth, segment) in parents.iter().enumerate() {
            match cursor.get(*segment) {
                Some(Value::Object(child)) => cursor = child,
                Some(_) => {
                    return Err(BotFlowError::VariablePathConflict {
                        path: path.to_string(),
                        segment: parts[..=depth].join("."),
                    })
                }
                None => break,
            }
        }

        let mut node = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let entry = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            node = match entry {
                Value::Object(child) => child,
                _ => {
                    return Err(BotFlowError::VariablePathConflict {
                        path: path.to_string(),
                        segment: parts[..=depth].join("."),
                    })
                }
            };
        }
        node.insert(leaf.to_string(), value.into());
        Ok(())
    }

    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let parts = segments(path).ok()?;
        let (leaf, parents) = parts.split_last()?;
        let mut node = &self.root;
        for segment in parents {
            node = node.get(*segment)?.as_object()?;
        }
        node.get(*leaf)
    }

    /// 以字符串形式读取；非字符串值返回其 JSON 文本
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get_path(path).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        let parts = segments(path).ok()?;
        let (leaf, parents) = parts.split_last()?;
        let mut node = &mut self.root;
        for segment in parents {
            node = node.get_mut(*segment)?.as_object_mut()?;
        }
        node.remove(*leaf)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }
}
