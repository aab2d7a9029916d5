//! The core error taxonomy and its mapping onto JSON-RPC error envelopes.
//!
//! Mirrors the teacher's `ServerError`: one `thiserror` enum covering
//! every failure mode the pipeline can surface, each variant carrying
//! enough context to reconstruct the wire-level error without the
//! caller needing to know the JSON-RPC code table.

use mcpkit_protocol::{ErrorCode, JsonRpcError, ProtocolError};
use serde_json::Value;

use crate::lifecycle::LifecycleState;

/// Result alias used throughout the core pipeline.
pub type CoreResult<T> = Result<T, CoreError>;

/// The core error taxonomy (`spec.md` §7).
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// `initialize` called while the server is not `Idle`.
    #[error("Server is already initialized")]
    AlreadyInitialized,

    /// An operational request arrived before the server was ever initialized.
    #[error("Server is not initialized")]
    NotInitialized,

    /// An operational request arrived after the server shut down.
    #[error("Server has been shut down")]
    PostShutdown,

    /// An operational request arrived while initialized but not yet `Ready`.
    #[error("Lifecycle violation: {operation} requires the server to be ready (current state: {current_state:?})")]
    LifecycleViolation {
        /// The state the server was in.
        current_state: LifecycleState,
        /// The method that was rejected.
        operation: String,
    },

    /// An illegal lifecycle transition was attempted.
    #[error("Cannot transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// The state the transition started from.
        from: LifecycleState,
        /// The state the transition attempted to reach.
        to: LifecycleState,
    },

    /// `notifications/initialized` arrived outside the `Initializing` state.
    #[error("Lifecycle violation: {0}")]
    LifecycleViolationGeneric(String),

    /// A handshake envelope or registry input failed validation.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// A requested primitive (prompt/tool/resource) could not be found.
    #[error("{0}")]
    NotFound(String),

    /// A primitive was registered twice under the same key.
    #[error("{0}")]
    AlreadyRegistered(String),

    /// Caller was not authorized to invoke a tool.
    #[error("{0}")]
    Authorization(String),

    /// A middleware reported an internal failure.
    #[error("Middleware '{name}' failed: {message}")]
    Middleware {
        /// Name of the failing middleware.
        name: String,
        /// Failure detail.
        message: String,
    },

    /// The method named by the request is not recognized.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// A registered handler raised an error while executing.
    #[error("{0}")]
    Handler(String),

    /// Transport-level failure (e.g. failed to start or decode).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Catch-all internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A codec-level failure bubbled up from `mcpkit-protocol`.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CoreError {
    /// The JSON-RPC error code this error maps to on the wire (`spec.md` §6, §7).
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::AlreadyInitialized => ErrorCode::InvalidRequest,
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::PostShutdown => ErrorCode::PostShutdown,
            Self::LifecycleViolation { .. } | Self::LifecycleViolationGeneric(_) => {
                ErrorCode::LifecycleViolation
            }
            Self::InvalidStateTransition { .. } => ErrorCode::InternalError,
            Self::InvalidParams(_) => ErrorCode::InvalidParams,
            Self::NotFound(_) => ErrorCode::InternalError,
            Self::AlreadyRegistered(_) => ErrorCode::InternalError,
            Self::Authorization(_) => ErrorCode::LifecycleViolation,
            Self::Middleware { .. } => ErrorCode::InternalError,
            Self::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Self::Handler(_) => ErrorCode::InternalError,
            Self::Transport(_) => ErrorCode::InternalError,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::Protocol(e) => e.error_code(),
        }
    }

    /// Build the JSON-RPC error object sent on the wire for this error.
    ///
    /// Lifecycle violations attach `{currentState, operation}` as `data`,
    /// matching `spec.md` §6's description of the `-32000` code.
    pub fn into_json_rpc_error(self) -> JsonRpcError {
        let code = self.error_code();
        let message = self.to_string();
        match &self {
            Self::LifecycleViolation {
                current_state,
                operation,
            } => JsonRpcError::new(code.code(), message).with_data(serde_json::json!({
                "currentState": current_state,
                "operation": operation,
            })),
            _ => JsonRpcError::new(code.code(), message),
        }
    }

    /// Shorthand for a handler error, mirroring the teacher's `ServerError::handler`.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    /// Shorthand for a not-found error with a uniform message shape.
    pub fn not_found(kind: &str, key: &str) -> Self {
        Self::NotFound(format!("{kind} '{key}' not found"))
    }

    /// Shorthand for a duplicate-registration error with a uniform message shape.
    pub fn already_registered(kind: &str, key: &str) -> Self {
        Self::AlreadyRegistered(format!("{kind} '{key}' is already registered"))
    }
}

/// Helper to stamp arbitrary JSON `data` onto an otherwise plain error.
pub fn with_data(error: JsonRpcError, data: Value) -> JsonRpcError {
    error.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_violation_carries_data() {
        let err = CoreError::LifecycleViolation {
            current_state: LifecycleState::Initializing,
            operation: "tools/list".to_string(),
        };
        let json_err = err.into_json_rpc_error();
        assert_eq!(json_err.code, -32000);
        assert!(json_err.data.is_some());
    }

    #[test]
    fn not_initialized_maps_to_32002() {
        assert_eq!(CoreError::NotInitialized.error_code().code(), -32002);
    }

    #[test]
    fn post_shutdown_maps_to_32003() {
        assert_eq!(CoreError::PostShutdown.error_code().code(), -32003);
    }
}
