//! # mcpkit-protocol
//!
//! Pure JSON-RPC 2.0 message model, newline-delimited codec, and MCP
//! handshake wire types. This crate has no opinion about lifecycle
//! state, routing, or transports — see `mcpkit-core` for that.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod capabilities;
pub mod error;
pub mod handshake;
pub mod jsonrpc;

pub use capabilities::{
    ClientCapabilities, CompletionCapabilities, Implementation, LoggingCapabilities,
    PromptsCapabilities, ResourcesCapabilities, ServerCapabilities, ToolsCapabilities,
    server_info,
};
pub use error::{ErrorCode, ProtocolError};
pub use handshake::{InitializeParams, InitializeResult, SUPPORTED_PROTOCOL_VERSIONS, is_supported_protocol_version};
pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcOutcome, RequestId, decode, decode_value, encode_line, encode_value};
