//! JSON-RPC 2.0 message model and newline-delimited codec.
//!
//! This module is the pure codec collaborator described by the core
//! pipeline: it knows how to parse a line of JSON into a
//! [`JsonRpcMessage`] and how to serialize a response back out. It has
//! no opinion about lifecycle state, routing, or transports.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// JSON-RPC 2.0 version literal, accepted on parse and always emitted on write.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request or notification identifier.
///
/// Per JSON-RPC 2.0 an id is a string or a number; `null` is reserved
/// for responses to requests that could not even be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A decoded JSON-RPC 2.0 message: request, notification, or response.
///
/// Requests carry an `id` and expect a reply; notifications never do;
/// responses are only produced by this side, never consumed on the
/// server pipeline (included for symmetry and for `TransportMetadata`
/// consumers that echo messages back out).
#[derive(Debug, Clone)]
pub enum JsonRpcMessage {
    /// A request awaiting a response.
    Request {
        /// Correlation id the response must echo.
        id: RequestId,
        /// Method name, e.g. `"tools/list"`.
        method: String,
        /// Free-form structured parameters.
        params: Option<Value>,
    },
    /// A one-way notification; no response is expected.
    Notification {
        /// Method name, e.g. `"notifications/initialized"`.
        method: String,
        /// Free-form structured parameters.
        params: Option<Value>,
    },
    /// A response to a previously issued request.
    Response {
        /// Echoes the request id, or `None` for parse-error responses.
        id: Option<RequestId>,
        /// The outcome: success payload or error object.
        outcome: JsonRpcOutcome,
    },
}

/// The mutually-exclusive success/error payload of a [`JsonRpcMessage::Response`].
#[derive(Debug, Clone)]
pub enum JsonRpcOutcome {
    /// Successful result value.
    Result(Value),
    /// Standard JSON-RPC error object.
    Error(JsonRpcError),
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code (see [`crate::error::ErrorCode`]).
    pub code: i32,
    /// Short human-readable message.
    pub message: String,
    /// Optional structured error detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Build an error object from a code and message with no extra data.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured `data` to this error object.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl JsonRpcMessage {
    /// The method name of this message, for requests and notifications.
    ///
    /// Returns `None` for responses, which carry no method.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }

    /// True if this message expects a reply (i.e. it is a request).
    pub fn expects_response(&self) -> bool {
        matches!(self, Self::Request { .. })
    }

    /// The request id, if this message carries one.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request { id, .. } => Some(id),
            Self::Response { id, .. } => id.as_ref(),
            Self::Notification { .. } => None,
        }
    }

    /// Build a success response message for the given request id.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self::Response {
            id,
            outcome: JsonRpcOutcome::Result(result),
        }
    }

    /// Build an error response message for the given request id.
    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self::Response {
            id,
            outcome: JsonRpcOutcome::Error(error),
        }
    }
}

/// Parse a single newline-delimited JSON-RPC message.
///
/// # Errors
///
/// Returns [`ProtocolError::Parse`] if `line` is not valid JSON, and
/// [`ProtocolError::InvalidEnvelope`] if it is valid JSON but does not
/// shape up as a request, notification, or response.
pub fn decode(line: &str) -> Result<JsonRpcMessage, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::Parse(e.to_string()))?;
    decode_value(value)
}

/// Parse an already-deserialized JSON value into a [`JsonRpcMessage`].
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidEnvelope`] if `value` does not shape
/// up as a request, notification, or response.
pub fn decode_value(value: Value) -> Result<JsonRpcMessage, ProtocolError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::InvalidEnvelope("message is not a JSON object".into()))?;

    if let Some(jsonrpc) = obj.get("jsonrpc") {
        if jsonrpc.as_str() != Some(JSONRPC_VERSION) {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "unsupported jsonrpc version: {jsonrpc}"
            )));
        }
    }

    let id = match obj.get("id") {
        Some(Value::Null) | None => None,
        Some(other) => Some(parse_request_id(other)?),
    };

    if let Some(method) = obj.get("method") {
        let method = method
            .as_str()
            .ok_or_else(|| ProtocolError::InvalidEnvelope("method must be a string".into()))?
            .to_string();
        let params = obj.get("params").cloned();
        return Ok(match id {
            Some(id) => JsonRpcMessage::Request { id, method, params },
            None => JsonRpcMessage::Notification { method, params },
        });
    }

    if let Some(result) = obj.get("result") {
        return Ok(JsonRpcMessage::Response {
            id,
            outcome: JsonRpcOutcome::Result(result.clone()),
        });
    }

    if let Some(error) = obj.get("error") {
        let error: JsonRpcError = serde_json::from_value(error.clone())
            .map_err(|e| ProtocolError::InvalidEnvelope(format!("invalid error object: {e}")))?;
        return Ok(JsonRpcMessage::Response {
            id,
            outcome: JsonRpcOutcome::Error(error),
        });
    }

    Err(ProtocolError::InvalidEnvelope(
        "message has neither method, result, nor error".into(),
    ))
}

fn parse_request_id(value: &Value) -> Result<RequestId, ProtocolError> {
    if let Some(s) = value.as_str() {
        return Ok(RequestId::String(s.to_string()));
    }
    if let Some(n) = value.as_i64() {
        return Ok(RequestId::Number(n));
    }
    Err(ProtocolError::InvalidEnvelope(
        "id must be a string or integer".into(),
    ))
}

/// Serialize a [`JsonRpcMessage`] to a single newline-terminated JSON line.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if the message cannot be
/// represented as JSON (practically unreachable for well-formed
/// messages built by this crate).
pub fn encode_line(message: &JsonRpcMessage) -> Result<String, ProtocolError> {
    let value = encode_value(message)?;
    let mut line = serde_json::to_string(&value).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Serialize a [`JsonRpcMessage`] to a [`Value`] envelope.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] if `params`/`result` cannot be
/// round-tripped through `serde_json` (unreachable for values already
/// parsed as JSON).
pub fn encode_value(message: &JsonRpcMessage) -> Result<Value, ProtocolError> {
    let value = match message {
        JsonRpcMessage::Request { id, method, params } => serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id,
            "method": method,
            "params": params,
        }),
        JsonRpcMessage::Notification { method, params } => serde_json::json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
            "params": params,
        }),
        JsonRpcMessage::Response { id, outcome } => match outcome {
            JsonRpcOutcome::Result(result) => serde_json::json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": result,
            }),
            JsonRpcOutcome::Error(error) => serde_json::json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": error,
            }),
        },
    };
    Ok(value)
}
