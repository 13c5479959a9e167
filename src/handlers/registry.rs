use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BotFlowError, Result};
use crate::handlers::handler::{ContentGenerator, StepHandler};

/// handler / generator 注册表，启动时构建一次
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
    generators: HashMap<String, Arc<dyn ContentGenerator>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            generators: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, name: &str, handler: Arc<dyn StepHandler>) -> &mut Self {
        self.handlers.insert(name.to_string(), handler);
        self
    }

    pub fn register_generator(
        &mut self,
        name: &str,
        generator: Arc<dyn ContentGenerator>,
    ) -> &mut Self {
        self.generators.insert(name.to_string(), generator);
        self
    }

    pub fn handler(&self, name: &str) -> Result<Arc<dyn StepHandler>> {
        self.handlers
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| BotFlowError::HandlerNotRegistered(name.to_string()))
    }

    pub fn generator(&self, name: &str) -> Result<Arc<dyn ContentGenerator>> {
        self.generators
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| BotFlowError::GeneratorNotRegistered(name.to_string()))
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn has_generator(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{handler_from_fn, HandlerContext, HandlerOutcome};
    use crate::state::VariableBag;

    #[tokio::test]
    async fn registered_handler_is_invoked() {
        let mut registry = HandlerRegistry::new();
        registry.register_handler(
            "check",
            handler_from_fn(|ctx| {
                Ok(match ctx.var("company.name") {
                    Some(_) => HandlerOutcome::goto("main_menu"),
                    None => HandlerOutcome::proceed(),
                })
            }),
        );

        let mut variables = VariableBag::new();
        variables.set_path("company.name", "Acme").unwrap();
        let ctx = HandlerContext {
            session_id: "s".into(),
            flow: "onboarding".into(),
            step: "check".into(),
            variables,
        };

        let outcome = registry.handler("check").unwrap().handle(&ctx).await.unwrap();
        assert_eq!(outcome.next_step.as_deref(), Some("main_menu"));
        assert!(matches!(
            registry.generator("check"),
            Err(BotFlowError::GeneratorNotRegistered(_))
        ));
    }
}
