//! The dispatcher: builds `RequestContext`, defines the core routing
//! function, and invokes the composed middleware (`spec.md` §4.7).

use std::sync::Arc;

use mcpkit_protocol::{JsonRpcMessage, RequestId};
use serde_json::Value;
use tracing::error;

use crate::capabilities::CapabilityRegistry;
use crate::context::{RequestContext, RespondFn, TransportInfo};
use crate::error::CoreError;
use crate::gate::RequestGate;
use crate::handshake::HandshakeHandlers;
use crate::lifecycle::LifecycleManager;
use crate::middleware::{CoreHandler, MiddlewareEngine};
use crate::registry::Registries;

/// The shape a transport invokes for every decoded message
/// (`spec.md` §4.7): `(message, respond, transport) -> ()`.
pub type DispatchFn = Arc<dyn Fn(JsonRpcMessage, RespondFn, TransportInfo) + Send + Sync>;

/// Owns the lifecycle manager, capability registry, primitive
/// registries, and middleware engine, and builds the dispatch function
/// handed to transports (`spec.md` §4.7).
pub struct Dispatcher {
    lifecycle: Arc<LifecycleManager>,
    capabilities: Arc<CapabilityRegistry>,
    registries: Arc<Registries>,
    middleware: Arc<MiddlewareEngine>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Assemble a dispatcher from its component parts.
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        capabilities: Arc<CapabilityRegistry>,
        registries: Arc<Registries>,
        middleware: Arc<MiddlewareEngine>,
    ) -> Self {
        Self {
            lifecycle,
            capabilities,
            registries,
            middleware,
        }
    }

    /// Handle one decoded message end to end (`spec.md` §4.7 steps 1-5).
    pub async fn dispatch(&self, request: JsonRpcMessage, respond: Option<RespondFn>, transport: TransportInfo) {
        let incoming_id = request.id().cloned();
        let mut ctx = match &respond {
            Some(cb) => RequestContext::new(request, transport, Arc::clone(cb)),
            None => {
                let mut ctx = RequestContext::detached(request, transport.name.clone());
                ctx.transport = transport;
                ctx
            }
        };

        let core = CoreRouter {
            lifecycle: Arc::clone(&self.lifecycle),
            capabilities: Arc::clone(&self.capabilities),
            registries: Arc::clone(&self.registries),
        };

        self.middleware.run(&mut ctx, &core).await;

        if let Some(response) = ctx.response.take() {
            if let Some(cb) = &ctx.respond {
                cb(response);
            }
        } else if let Some(cb) = &ctx.respond {
            // Escaped error: map to InternalError, preserving the incoming id.
            // Reachable only if a middleware leaves ctx.response unset for a
            // request that required one; notifications legitimately produce none.
            if matches!(ctx.request, JsonRpcMessage::Request { .. }) {
                error!("middleware chain produced no response for a request");
                let error = CoreError::Internal("no response produced".to_string()).into_json_rpc_error();
                cb(JsonRpcMessage::error(incoming_id, error));
            }
        }
    }
}

struct CoreRouter {
    lifecycle: Arc<LifecycleManager>,
    capabilities: Arc<CapabilityRegistry>,
    registries: Arc<Registries>,
}

impl CoreRouter {
    async fn route(&self, ctx: &mut RequestContext) {
        let method = ctx
            .request
            .method()
            .map(str::to_string)
            .unwrap_or_default();

        if let Some(error) = RequestGate::json_rpc_error(&method, &self.lifecycle) {
            ctx.response = Some(JsonRpcMessage::error(ctx.request.id().cloned(), error));
            return;
        }

        let id = ctx.request.id().cloned();

        match method.as_str() {
            "initialize" => {
                let params = match &ctx.request {
                    JsonRpcMessage::Request { params, .. } => params.clone(),
                    _ => None,
                };
                match HandshakeHandlers::handle_initialize(&self.lifecycle, params) {
                    Ok(result) => ctx.response = Some(JsonRpcMessage::success(id, result)),
                    Err(err) => ctx.response = Some(JsonRpcMessage::error(id, err)),
                }
            }
            "notifications/initialized" => {
                if let Err(err) = HandshakeHandlers::handle_initialized(&self.lifecycle) {
                    error!(%err, "notifications/initialized rejected");
                }
            }
            "shutdown" => {
                let reason = match &ctx.request {
                    JsonRpcMessage::Request { params, .. } => params
                        .as_ref()
                        .and_then(|p| p.get("reason"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                };
                match HandshakeHandlers::handle_shutdown(&self.lifecycle, reason).await {
                    Ok(result) => ctx.response = Some(JsonRpcMessage::success(id, result)),
                    Err(err) => ctx.response = Some(JsonRpcMessage::error(id, err)),
                }
            }
            "ping" => {
                if id.is_some() {
                    ctx.response = Some(JsonRpcMessage::success(id, Value::Null));
                }
            }
            "prompts/list" => {
                let items = self.registries.prompts.list(None);
                ctx.response = Some(JsonRpcMessage::success(
                    id,
                    serde_json::json!({"prompts": items}),
                ));
            }
            "tools/list" => {
                let items = self.registries.tools.list(None);
                ctx.response = Some(JsonRpcMessage::success(
                    id,
                    serde_json::json!({"tools": items}),
                ));
            }
            "resources/list" => {
                let items = self.registries.resources.list(None).await;
                ctx.response = Some(JsonRpcMessage::success(
                    id,
                    serde_json::json!({"resources": items}),
                ));
            }
            "prompts/get" => self.handle_prompts_get(ctx, id).await,
            "tools/call" => self.handle_tools_call(ctx, id).await,
            "resources/read" => self.handle_resources_read(ctx, id).await,
            _ => {
                if id.is_some() {
                    let err = CoreError::MethodNotFound(method).into_json_rpc_error();
                    ctx.response = Some(JsonRpcMessage::error(id, err));
                }
            }
        }
    }

    async fn handle_prompts_get(&self, ctx: &mut RequestContext, id: Option<RequestId>) {
        let (name, arguments) = match Self::extract_name_and_args(ctx, "arguments") {
            Ok(v) => v,
            Err(err) => {
                ctx.response = Some(JsonRpcMessage::error(id, err));
                return;
            }
        };
        match self.registries.prompts.get(&name, arguments, ctx).await {
            Ok(message) => {
                let result = serde_json::json!({
                    "messages": [{
                        "role": "user",
                        "content": {"type": "text", "text": message.text},
                    }]
                });
                ctx.response = Some(JsonRpcMessage::success(id, result));
            }
            Err(err) => ctx.response = Some(JsonRpcMessage::error(id, err.into_json_rpc_error())),
        }
    }

    async fn handle_tools_call(&self, ctx: &mut RequestContext, id: Option<RequestId>) {
        let (name, arguments) = match Self::extract_name_and_args(ctx, "arguments") {
            Ok(v) => v,
            Err(err) => {
                ctx.response = Some(JsonRpcMessage::error(id, err));
                return;
            }
        };
        match self.registries.tools.execute(&name, arguments, ctx).await {
            Ok(value) => {
                let text = serde_json::to_string(&value).unwrap_or_default();
                let result = serde_json::json!({
                    "content": [{"type": "text", "text": text}]
                });
                ctx.response = Some(JsonRpcMessage::success(id, result));
            }
            Err(err) => ctx.response = Some(JsonRpcMessage::error(id, err.into_json_rpc_error())),
        }
    }

    async fn handle_resources_read(&self, ctx: &mut RequestContext, id: Option<RequestId>) {
        let uri = match &ctx.request {
            JsonRpcMessage::Request { params, .. } => params
                .as_ref()
                .and_then(|p| p.get("uri"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        };
        let Some(uri) = uri else {
            let err = CoreError::InvalidParams("missing uri".to_string()).into_json_rpc_error();
            ctx.response = Some(JsonRpcMessage::error(id, err));
            return;
        };
        match self.registries.resources.get(&uri, ctx).await {
            Ok(content) => {
                let result = serde_json::json!({
                    "contents": [{
                        "uri": content.uri,
                        "mimeType": "application/json",
                        "text": content.text,
                    }]
                });
                ctx.response = Some(JsonRpcMessage::success(id, result));
            }
            Err(err) => ctx.response = Some(JsonRpcMessage::error(id, err.into_json_rpc_error())),
        }
    }

    fn extract_name_and_args(
        ctx: &RequestContext,
        args_key: &str,
    ) -> Result<(String, Value), mcpkit_protocol::JsonRpcError> {
        let params = match &ctx.request {
            JsonRpcMessage::Request { params, .. } => params.clone(),
            _ => None,
        };
        let params = params.ok_or_else(|| {
            CoreError::InvalidParams("missing params".to_string()).into_json_rpc_error()
        })?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CoreError::InvalidParams("missing name".to_string()).into_json_rpc_error()
            })?
            .to_string();
        let arguments = params.get(args_key).cloned().unwrap_or(Value::Object(Default::default()));
        Ok((name, arguments))
    }
}

#[async_trait::async_trait]
impl CoreHandler for CoreRouter {
    async fn call(&self, ctx: &mut RequestContext) {
        self.route(ctx).await
    }
}
