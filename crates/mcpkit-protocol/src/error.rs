//! Codec-level errors and the standard JSON-RPC / MCP error code table.

use crate::jsonrpc::JsonRpcError;

/// Errors raised while decoding or encoding JSON-RPC messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    /// The input was not valid JSON.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The input was valid JSON but not a valid JSON-RPC envelope.
    #[error("Invalid request: {0}")]
    InvalidEnvelope(String),
    /// A message could not be serialized back to JSON.
    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl ProtocolError {
    /// The standard JSON-RPC error code this error maps to on the wire.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Parse(_) => ErrorCode::ParseError,
            Self::InvalidEnvelope(_) => ErrorCode::InvalidRequest,
            Self::Serialize(_) => ErrorCode::InternalError,
        }
    }

    /// Convert this error into the JSON-RPC error object sent on the wire.
    pub fn into_json_rpc_error(self) -> JsonRpcError {
        let code = self.error_code();
        JsonRpcError::new(code.code(), code.standard_message())
    }
}

/// Standard JSON-RPC 2.0 error codes plus the MCP-specific lifecycle codes.
///
/// See `spec.md` §6 for the authoritative table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// `-32700` — the server could not parse the JSON text.
    ParseError,
    /// `-32600` — the JSON sent is not a valid request object.
    InvalidRequest,
    /// `-32601` — the requested method does not exist.
    MethodNotFound,
    /// `-32602` — invalid method parameters.
    InvalidParams,
    /// `-32603` — internal JSON-RPC error.
    InternalError,
    /// `-32000` — lifecycle violation: initialized but not ready.
    LifecycleViolation,
    /// `-32002` — operational request before any `initialize` call.
    NotInitialized,
    /// `-32003` — operational request after the server has shut down.
    PostShutdown,
}

impl ErrorCode {
    /// The numeric wire code.
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::LifecycleViolation => -32000,
            Self::NotInitialized => -32002,
            Self::PostShutdown => -32003,
        }
    }

    /// The short standard message associated with this code.
    pub fn standard_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::LifecycleViolation => "Lifecycle violation",
            Self::NotInitialized => "Server not initialized",
            Self::PostShutdown => "Server has been shut down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec_table() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::LifecycleViolation.code(), -32000);
        assert_eq!(ErrorCode::NotInitialized.code(), -32002);
        assert_eq!(ErrorCode::PostShutdown.code(), -32003);
    }
}
