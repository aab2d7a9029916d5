//! Tool registry (`spec.md` §4.5), including scope/danger authorization.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::context::{RegistryInfo, RequestContext};
use crate::error::{CoreError, CoreResult};

use super::common::{new_execution_info, Counters, Hooks, RegistryMetrics, Validator};

/// A tool handler: takes validated arguments and the request context,
/// returns the tool's result value.
pub type ToolHandler =
    Arc<dyn for<'a> Fn(&'a Value, &'a mut RequestContext) -> BoxFuture<'a, CoreResult<Value>> + Send + Sync>;

/// Authorization requirements attached to a [`ToolDefinition`]
/// (`spec.md` §4.5 step 3).
#[derive(Debug, Clone, Default)]
pub struct ToolAuthorization {
    /// Caller-supplied scope must match this exactly, if set.
    pub scope: Option<String>,
    /// Caller permissions must intersect this set, if non-empty.
    pub scopes: Vec<String>,
    /// If true, caller permissions must contain `"dangerous-tools"`.
    pub dangerous: bool,
}

/// A registered tool definition.
#[derive(Clone)]
pub struct ToolDefinition {
    /// Unique identity key.
    pub name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Free-form tags used by [`ToolFilter::tags`].
    pub tags: Vec<String>,
    /// Optional custom validator; falls back to declarative validation
    /// over `params` when absent.
    pub validator: Option<Arc<dyn Validator>>,
    /// Declared parameters, used when no custom validator is set.
    pub params: Vec<super::common::ParamSpec>,
    /// Authorization requirements, if any.
    pub authorization: ToolAuthorization,
    /// Lifecycle hooks.
    pub hooks: Hooks,
    /// The handler invoked once validation and authorization pass.
    pub handler: ToolHandler,
}

/// Lightweight descriptor returned by [`ToolRegistry::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// The tool's identity key.
    pub name: String,
    /// Human-readable description, if any.
    pub description: Option<String>,
    /// Tags attached to the tool.
    pub tags: Vec<String>,
    /// Whether this tool requires `dangerous-tools` permission.
    pub dangerous: bool,
    /// Whether an `inputSchema`/declarative schema is present.
    pub with_schema: bool,
}

/// Filter applied by [`ToolRegistry::list`].
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    /// Only include tools carrying at least one of these tags.
    pub tags: Option<Vec<String>>,
    /// Only include tools whose `dangerous` flag matches.
    pub dangerous: Option<bool>,
    /// Only include tools that declare a schema.
    pub with_schema: Option<bool>,
}

/// Registry of server-exposed tools (`spec.md` §3, §4.5).
pub struct ToolRegistry {
    tools: DashMap<String, ToolDefinition>,
    counters: Counters,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("len", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            counters: Counters::default(),
        }
    }

    /// Register a tool, rejecting duplicate names.
    pub fn register(&self, def: ToolDefinition) -> CoreResult<()> {
        if self.tools.contains_key(&def.name) {
            return Err(CoreError::already_registered("Tool", &def.name));
        }
        self.tools.insert(def.name.clone(), def);
        Ok(())
    }

    /// Remove a tool by name.
    pub fn unregister(&self, name: &str) -> CoreResult<()> {
        self.tools
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("Tool", name))
    }

    /// Remove every registered tool.
    pub fn clear(&self) {
        self.tools.clear();
    }

    /// True iff at least one tool is registered (`spec.md` §4.3 dynamic capability).
    pub fn is_present(&self) -> bool {
        !self.tools.is_empty()
    }

    /// List registered tools, optionally filtered.
    pub fn list(&self, filter: Option<&ToolFilter>) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .filter(|entry| {
                filter.map_or(true, |f| {
                    let tags_ok = f
                        .tags
                        .as_ref()
                        .map_or(true, |tags| tags.iter().any(|t| entry.tags.contains(t)));
                    let dangerous_ok = f
                        .dangerous
                        .map_or(true, |d| d == entry.authorization.dangerous);
                    let schema_ok = f.with_schema.map_or(true, |s| {
                        s == (entry.validator.is_some() || !entry.params.is_empty())
                    });
                    tags_ok && dangerous_ok && schema_ok
                })
            })
            .map(|entry| ToolDescriptor {
                name: entry.name.clone(),
                description: entry.description.clone(),
                tags: entry.tags.clone(),
                dangerous: entry.authorization.dangerous,
                with_schema: entry.validator.is_some() || !entry.params.is_empty(),
            })
            .collect()
    }

    /// Current success/failure counters.
    pub fn metrics(&self) -> RegistryMetrics {
        self.counters.snapshot()
    }

    /// Authorize `ctx`'s caller against `auth`, per `spec.md` §4.5 step 3.
    fn authorize(name: &str, auth: &ToolAuthorization, ctx: &RequestContext) -> CoreResult<()> {
        let permissions = ctx.permissions();

        if let Some(scope) = &auth.scope {
            let has_exact = permissions.iter().any(|p| p == scope);
            if !has_exact {
                return Err(CoreError::Authorization(format!(
                    "Tool '{name}' requires scope '{scope}'"
                )));
            }
        }

        if !auth.scopes.is_empty() {
            let intersects = auth.scopes.iter().any(|s| permissions.contains(s));
            if !intersects {
                let list = auth.scopes.join(", ");
                return Err(CoreError::Authorization(format!(
                    "requires one of scopes [{list}]"
                )));
            }
        }

        if auth.dangerous && !permissions.iter().any(|p| p == "dangerous-tools") {
            return Err(CoreError::Authorization(format!(
                "Tool '{name}' requires 'dangerous-tools' permission"
            )));
        }

        Ok(())
    }

    /// Execute a tool by name, running validation, authorization, hooks,
    /// and the handler in the order specified by `spec.md` §4.5.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Value,
        ctx: &mut RequestContext,
    ) -> CoreResult<Value> {
        let result = self.execute_inner(name, &arguments, ctx).await;
        match &result {
            Ok(_) => self.counters.record_success(),
            Err(_) => self.counters.record_failure(),
        }
        if let Err(err) = &result {
            if let Some(def) = self.tools.get(name) {
                if let Some(on_error) = &def.hooks.on_error {
                    on_error(err, ctx).await;
                }
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        name: &str,
        arguments: &Value,
        ctx: &mut RequestContext,
    ) -> CoreResult<Value> {
        let def = self
            .tools
            .get(name)
            .ok_or_else(|| CoreError::not_found("Tool", name))?
            .clone();

        if let Some(validator) = &def.validator {
            validator.validate(arguments).into_result()?;
        } else if !def.params.is_empty() {
            let validator = super::common::DeclarativeValidator {
                params: def.params.clone(),
                kind: super::common::ParamKind::Argument,
            };
            validator.validate(arguments).into_result()?;
        }

        Self::authorize(name, &def.authorization, ctx)?;

        ctx.registry = Some(RegistryInfo {
            kind: "tool",
            metadata: serde_json::json!({"name": name})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        });
        ctx.execution = Some(new_execution_info("tool", name));

        if let Some(before) = &def.hooks.before_execution {
            before(arguments, ctx).await;
        }

        let value = (def.handler)(arguments, ctx).await?;

        if let Some(after) = &def.hooks.after_execution {
            after(&value, ctx).await;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UserInfo;
    use mcpkit_protocol::JsonRpcMessage;

    fn ctx_with_permissions(perms: &[&str]) -> RequestContext {
        let mut ctx = RequestContext::detached(
            JsonRpcMessage::Notification {
                method: "x".into(),
                params: None,
            },
            "test",
        );
        ctx.user = Some(UserInfo {
            id: Some("u".into()),
            roles: vec![],
            permissions: perms.iter().map(|p| p.to_string()).collect(),
        });
        ctx
    }

    fn def(name: &str, authorization: ToolAuthorization) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: None,
            tags: vec![],
            validator: None,
            params: vec![],
            authorization,
            hooks: Hooks::default(),
            handler: Arc::new(|_args, _ctx| Box::pin(async { Ok(serde_json::json!("ok")) })),
        }
    }

    #[tokio::test]
    async fn scopes_intersection_permits_execution() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "danger",
                ToolAuthorization {
                    scope: None,
                    scopes: vec!["a".into(), "b".into()],
                    dangerous: false,
                },
            ))
            .unwrap();
        let mut ctx = ctx_with_permissions(&["b"]);
        let result = registry
            .execute("danger", serde_json::json!({}), &mut ctx)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn scopes_without_intersection_rejected_with_message() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "danger",
                ToolAuthorization {
                    scope: None,
                    scopes: vec!["a".into(), "b".into()],
                    dangerous: false,
                },
            ))
            .unwrap();
        let mut ctx = ctx_with_permissions(&["c"]);
        let err = registry
            .execute("danger", serde_json::json!({}), &mut ctx)
            .await
            .unwrap_err();
        match err {
            CoreError::Authorization(msg) => {
                assert_eq!(msg, "requires one of scopes [a, b]");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dangerous_tool_requires_dangerous_tools_permission() {
        let registry = ToolRegistry::new();
        registry
            .register(def(
                "rm",
                ToolAuthorization {
                    scope: None,
                    scopes: vec![],
                    dangerous: true,
                },
            ))
            .unwrap();
        let mut ctx = ctx_with_permissions(&[]);
        assert!(registry
            .execute("rm", serde_json::json!({}), &mut ctx)
            .await
            .is_err());

        let mut ctx = ctx_with_permissions(&["dangerous-tools"]);
        assert!(registry
            .execute("rm", serde_json::json!({}), &mut ctx)
            .await
            .is_ok());
    }
}
