use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{BotFlowError, Result};
use crate::flow::types::{Flow, Step, StepKind};
use crate::handlers::HandlerRegistry;

/// Flow 注册表
#[derive(Default)]
pub struct FlowRegistry {
    flows: HashMap<String, Arc<Flow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: HashMap::new(),
        }
    }

    /// 注册 Flow；同名 Flow 已存在时返回错误
    pub fn register(&mut self, flow: Flow) -> Result<()> {
        if self.flows.contains_key(&flow.name) {
            return Err(BotFlowError::DuplicateFlow(flow.name));
        }
        self.flows.insert(flow.name.clone(), Arc::new(flow));
        Ok(())
    }

    pub fn get_flow(&self, name: &str) -> Option<&Flow> {
        self.flows.get(name).map(|flow| flow.as_ref())
    }

    pub fn get_step(&self, flow: &str, id: &str) -> Option<&Step> {
        self.get_flow(flow).and_then(|flow| flow.step(id))
    }

    pub fn flow(&self, name: &str) -> Result<&Flow> {
        self.get_flow(name)
            .ok_or_else(|| BotFlowError::UnknownFlow(name.to_string()))
    }

    pub fn step(&self, flow: &str, id: &str) -> Result<&Step> {
        self.flow(flow)?
            .step(id)
            .ok_or_else(|| BotFlowError::UnknownStep {
                flow: flow.to_string(),
                step: id.to_string(),
            })
    }

    pub fn list(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values().map(|flow| flow.as_ref())
    }

    /// 按名称排序的 Flow 名称列表
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.flows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// 静态校验所有 Flow：空 Flow、悬空 nextStepId、跳转到未注册的 Flow
    pub fn validate(&self) -> Result<()> {
        for name in self.names() {
            let flow = self.flow(name)?;
            if flow.steps().is_empty() {
                return Err(BotFlowError::EmptyFlow(flow.name.clone()));
            }
            for step in flow.steps() {
                if let Some(next) = step.next() {
                    if !flow.contains(next) {
                        return Err(BotFlowError::DanglingNextStepId {
                            flow: flow.name.clone(),
                            step: step.id.clone(),
                            next: next.to_string(),
                        });
                    }
                }
                if let StepKind::Flow { flow: target } = &step.kind {
                    if !self.flows.contains_key(target) {
                        return Err(BotFlowError::UnknownFlow(target.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// 校验所有 handler / generator 名称均已注册
    pub fn validate_callables(&self, handlers: &HandlerRegistry) -> Result<()> {
        let (handler_names, generator_names) = self.callable_names();
        if let Some(missing) = handler_names
            .into_iter()
            .find(|name| !handlers.has_handler(name))
        {
            return Err(BotFlowError::HandlerNotRegistered(missing.to_string()));
        }
        if let Some(missing) = generator_names
            .into_iter()
            .find(|name| !handlers.has_generator(name))
        {
            return Err(BotFlowError::GeneratorNotRegistered(missing.to_string()));
        }
        Ok(())
    }

    /// 所有 Flow 引用的 handler 与 generator 名称
    pub fn callable_names(&self) -> (BTreeSet<&str>, BTreeSet<&str>) {
        let mut handlers = BTreeSet::new();
        let mut generators = BTreeSet::new();
        for step in self.list().flat_map(|flow| flow.steps()) {
            match &step.kind {
                StepKind::Handler { handler } => {
                    handlers.insert(handler.as_str());
                }
                StepKind::Dynamic { generator } | StepKind::DynamicCallback { generator, .. } => {
                    generators.insert(generator.as_str());
                }
                _ => {}
            }
        }
        (handlers, generators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowBuilder;

    #[test]
    fn validate_reports_dangling_next_step() {
        let mut registry = FlowRegistry::new();
        let flow = FlowBuilder::new("broken")
            .message("hello", "Hi", Some("missing"))
            .build()
            .unwrap();
        registry.register(flow).unwrap();

        match registry.validate() {
            Err(BotFlowError::DanglingNextStepId { flow, step, next }) => {
                assert_eq!(flow, "broken");
                assert_eq!(step, "hello");
                assert_eq!(next, "missing");
            }
            other => panic!("expected dangling next step, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_unknown_jump_target() {
        let mut registry = FlowRegistry::new();
        let flow = FlowBuilder::new("jumper")
            .jump("go", "nowhere", None)
            .build()
            .unwrap();
        registry.register(flow).unwrap();

        assert!(matches!(
            registry.validate(),
            Err(BotFlowError::UnknownFlow(name)) if name == "nowhere"
        ));
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let mut registry = FlowRegistry::new();
        let first = FlowBuilder::new("same").message("a", "A", None).build().unwrap();
        let second = FlowBuilder::new("same").message("b", "B", None).build().unwrap();
        registry.register(first).unwrap();
        assert!(matches!(
            registry.register(second),
            Err(BotFlowError::DuplicateFlow(_))
        ));
    }

    #[test]
    fn step_lookup_errors_name_the_missing_item() {
        let registry = FlowRegistry::new();
        assert!(matches!(
            registry.step("ghost", "a"),
            Err(BotFlowError::UnknownFlow(_))
        ));
    }
}
