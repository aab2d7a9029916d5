//! Prompt registry (`spec.md` §4.5).

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::context::{RegistryInfo, RequestContext};
use crate::error::{CoreError, CoreResult};

use super::common::{new_execution_info, Counters, Hooks, RegistryMetrics, Validator};

/// A prompt handler: takes validated arguments and the request context,
/// returns the prompt's rendered text.
pub type PromptHandler =
    Arc<dyn for<'a> Fn(&'a Value, &'a mut RequestContext) -> BoxFuture<'a, CoreResult<String>> + Send + Sync>;

/// A registered prompt definition.
#[derive(Clone)]
pub struct PromptDefinition {
    /// Unique identity key.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Free-form tags used by [`PromptFilter::tags`].
    pub tags: Vec<String>,
    /// Whether this prompt streams its output (`spec.md` §4.5, laziness note).
    pub streaming: bool,
    /// Optional custom validator; falls back to [`crate::registry::common::DeclarativeValidator`]
    /// semantics when absent and `params` is non-empty.
    pub validator: Option<Arc<dyn Validator>>,
    /// Declared parameters, used when no custom validator is set.
    pub params: Vec<super::common::ParamSpec>,
    /// Lifecycle hooks.
    pub hooks: Hooks,
    /// The handler invoked once validation passes.
    pub handler: PromptHandler,
}

/// Lightweight descriptor returned by [`PromptRegistry::list`].
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    /// The prompt's identity key.
    pub name: String,
    /// Human-readable description, if any.
    pub description: Option<String>,
    /// Tags attached to the prompt.
    pub tags: Vec<String>,
    /// Whether the prompt streams.
    pub streaming: bool,
}

/// Filter applied by [`PromptRegistry::list`].
#[derive(Debug, Clone, Default)]
pub struct PromptFilter {
    /// Only include prompts carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
}

/// Result of a successful `prompts/get` dispatch.
#[derive(Debug, Clone)]
pub struct PromptMessage {
    /// The rendered prompt text.
    pub text: String,
}

/// Registry of server-exposed prompts (`spec.md` §3, §4.5).
pub struct PromptRegistry {
    prompts: DashMap<String, PromptDefinition>,
    counters: Counters,
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PromptRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRegistry")
            .field("len", &self.prompts.len())
            .finish_non_exhaustive()
    }
}

impl PromptRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            prompts: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Register a prompt, rejecting duplicate names.
    pub fn register(&self, def: PromptDefinition) -> CoreResult<()> {
        if self.prompts.contains_key(&def.name) {
            return Err(CoreError::already_registered("Prompt", &def.name));
        }
        self.prompts.insert(def.name.clone(), def);
        Ok(())
    }

    /// Remove a prompt by name.
    pub fn unregister(&self, name: &str) -> CoreResult<()> {
        self.prompts
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("Prompt", name))
    }

    /// Remove every registered prompt.
    pub fn clear(&self) {
        self.prompts.clear();
    }

    /// True iff at least one prompt is registered (`spec.md` §4.3 dynamic capability).
    pub fn is_present(&self) -> bool {
        !self.prompts.is_empty()
    }

    /// List registered prompts, optionally filtered.
    pub fn list(&self, filter: Option<&PromptFilter>) -> Vec<PromptDescriptor> {
        self.prompts
            .iter()
            .filter(|entry| match filter.and_then(|f| f.tags.as_ref()) {
                Some(tags) => tags.iter().any(|t| entry.tags.contains(t)),
                None => true,
            })
            .map(|entry| PromptDescriptor {
                name: entry.name.clone(),
                description: entry.description.clone(),
                tags: entry.tags.clone(),
                streaming: entry.streaming,
            })
            .collect()
    }

    /// Current success/failure counters.
    pub fn metrics(&self) -> RegistryMetrics {
        self.counters.snapshot()
    }

    /// Render a prompt by name, running validation, hooks, and the handler
    /// in the order specified by `spec.md` §4.5.
    pub async fn get(
        &self,
        name: &str,
        arguments: Value,
        ctx: &mut RequestContext,
    ) -> CoreResult<PromptMessage> {
        let result = self.get_inner(name, &arguments, ctx).await;
        match &result {
            Ok(_) => self.counters.record_success(),
            Err(_) => self.counters.record_failure(),
        }
        if let Err(err) = &result {
            if let Some(def) = self.prompts.get(name) {
                if let Some(on_error) = &def.hooks.on_error {
                    on_error(err, ctx).await;
                }
            }
        }
        result
    }

    async fn get_inner(
        &self,
        name: &str,
        arguments: &Value,
        ctx: &mut RequestContext,
    ) -> CoreResult<PromptMessage> {
        let def = self
            .prompts
            .get(name)
            .ok_or_else(|| CoreError::not_found("Prompt", name))?
            .clone();

        if let Some(validator) = &def.validator {
            validator.validate(arguments).into_result()?;
        } else if !def.params.is_empty() {
            let validator = super::common::DeclarativeValidator {
                params: def.params.clone(),
                kind: super::common::ParamKind::Parameter,
            };
            validator.validate(arguments).into_result()?;
        }

        ctx.registry = Some(RegistryInfo {
            kind: "prompt",
            metadata: serde_json::json!({"name": name})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        });
        ctx.execution = Some(new_execution_info("prompt", name));

        if let Some(before) = &def.hooks.before_execution {
            before(arguments, ctx).await;
        }

        let text = (def.handler)(arguments, ctx).await?;

        if let Some(after) = &def.hooks.after_execution {
            after(&Value::String(text.clone()), ctx).await;
        }

        Ok(PromptMessage { text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_protocol::JsonRpcMessage;

    fn ctx() -> RequestContext {
        RequestContext::detached(
            JsonRpcMessage::Notification {
                method: "x".into(),
                params: None,
            },
            "test",
        )
    }

    fn def(name: &str) -> PromptDefinition {
        PromptDefinition {
            name: name.to_string(),
            description: None,
            tags: vec![],
            streaming: false,
            validator: None,
            params: vec![],
            hooks: Hooks::default(),
            handler: Arc::new(|_args, _ctx| Box::pin(async { Ok("hello".to_string()) })),
        }
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let registry = PromptRegistry::new();
        registry.register(def("greeting")).unwrap();
        let err = registry.register(def("greeting")).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn get_renders_registered_prompt() {
        let registry = PromptRegistry::new();
        registry.register(def("greeting")).unwrap();
        let mut c = ctx();
        let message = registry
            .get("greeting", serde_json::json!({}), &mut c)
            .await
            .unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(registry.metrics().successes, 1);
    }

    #[tokio::test]
    async fn missing_prompt_not_found() {
        let registry = PromptRegistry::new();
        let mut c = ctx();
        let err = registry
            .get("nope", serde_json::json!({}), &mut c)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
        assert_eq!(registry.metrics().failures, 1);
    }
}
