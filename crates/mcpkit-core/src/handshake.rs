//! Handshake request handlers: `initialize`, `notifications/initialized`,
//! `shutdown` (`spec.md` §4.4).

use serde_json::Value;

use mcpkit_protocol::{InitializeParams, JsonRpcError};

use crate::error::CoreError;
use crate::lifecycle::LifecycleManager;

/// Wraps the [`LifecycleManager`] with the envelope validation and
/// error-code mapping `spec.md` §4.4 assigns to the handshake methods.
#[derive(Debug)]
pub struct HandshakeHandlers;

impl HandshakeHandlers {
    /// Handle `initialize`: validates the envelope, then delegates to
    /// [`LifecycleManager::initialize`].
    ///
    /// Returns the JSON-RPC `result` value on success, or the
    /// `JsonRpcError` to attach to the response on failure.
    pub fn handle_initialize(
        lifecycle: &LifecycleManager,
        params: Option<Value>,
    ) -> Result<Value, JsonRpcError> {
        let params = Self::parse_initialize_params(params)?;

        match lifecycle.initialize(params) {
            Ok(result) => {
                serde_json::to_value(result).map_err(|e| {
                    CoreError::Internal(format!("failed to encode initialize result: {e}"))
                        .into_json_rpc_error()
                })
            }
            Err(CoreError::AlreadyInitialized) => {
                Err(JsonRpcError::new(-32600, "Server is already initialized"))
            }
            Err(err @ CoreError::InvalidParams(_)) => Err(err.into_json_rpc_error()),
            Err(err) => Err(JsonRpcError::new(-32603, err.to_string())),
        }
    }

    fn parse_initialize_params(params: Option<Value>) -> Result<InitializeParams, JsonRpcError> {
        let params = params.ok_or_else(|| {
            CoreError::InvalidParams("missing params".to_string()).into_json_rpc_error()
        })?;
        let obj = params.as_object().ok_or_else(|| {
            CoreError::InvalidParams("params must be an object".to_string()).into_json_rpc_error()
        })?;
        if !obj.contains_key("protocolVersion") {
            return Err(
                CoreError::InvalidParams("missing protocolVersion".to_string())
                    .into_json_rpc_error(),
            );
        }
        if !obj.contains_key("capabilities") {
            return Err(
                CoreError::InvalidParams("missing capabilities".to_string()).into_json_rpc_error(),
            );
        }
        serde_json::from_value(params).map_err(|e| {
            CoreError::InvalidParams(format!("invalid initialize params: {e}")).into_json_rpc_error()
        })
    }

    /// Handle `notifications/initialized`: advances the lifecycle state;
    /// never produces a response.
    pub fn handle_initialized(lifecycle: &LifecycleManager) -> Result<(), CoreError> {
        lifecycle.initialized()
    }

    /// Handle `shutdown`: always succeeds with a `null` result
    /// (`spec.md` §4.4), even when the transition was already complete.
    pub async fn handle_shutdown(
        lifecycle: &LifecycleManager,
        reason: Option<String>,
    ) -> Result<Value, JsonRpcError> {
        lifecycle
            .shutdown(reason)
            .await
            .map_err(|err| JsonRpcError::new(-32603, err.to_string()))?;
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use std::sync::Arc;

    fn lifecycle() -> LifecycleManager {
        LifecycleManager::new(Arc::new(CapabilityRegistry::new()))
    }

    fn valid_params() -> Value {
        serde_json::json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": {"name": "c", "version": "0"},
        })
    }

    #[test]
    fn missing_params_is_invalid_params() {
        let lifecycle = lifecycle();
        let err = HandshakeHandlers::handle_initialize(&lifecycle, None).unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn missing_protocol_version_is_invalid_params() {
        let lifecycle = lifecycle();
        let params = serde_json::json!({"capabilities": {}, "clientInfo": {"name":"c","version":"0"}});
        let err = HandshakeHandlers::handle_initialize(&lifecycle, Some(params)).unwrap_err();
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn successful_initialize_reports_fixed_server_info() {
        let lifecycle = lifecycle();
        let result = HandshakeHandlers::handle_initialize(&lifecycle, Some(valid_params())).unwrap();
        assert_eq!(result["serverInfo"]["name"], "MCP Server Framework");
        assert_eq!(result["protocolVersion"], "2025-06-18");
    }

    #[test]
    fn duplicate_initialize_maps_to_invalid_request() {
        let lifecycle = lifecycle();
        HandshakeHandlers::handle_initialize(&lifecycle, Some(valid_params())).unwrap();
        let err =
            HandshakeHandlers::handle_initialize(&lifecycle, Some(valid_params())).unwrap_err();
        assert_eq!(err.code, -32600);
        assert!(err.message.contains("already initialized"));
    }

    #[tokio::test]
    async fn shutdown_always_returns_null() {
        let lifecycle = lifecycle();
        HandshakeHandlers::handle_initialize(&lifecycle, Some(valid_params())).unwrap();
        HandshakeHandlers::handle_initialized(&lifecycle).unwrap();
        let result = HandshakeHandlers::handle_shutdown(&lifecycle, None).await.unwrap();
        assert_eq!(result, Value::Null);
    }
}
