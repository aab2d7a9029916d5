//! Wire types for the `initialize` handshake.

use serde::{Deserialize, Serialize};

use crate::capabilities::{ClientCapabilities, Implementation, ServerCapabilities};

/// Protocol versions this framework accepts in `initialize` (`spec.md` §3, §6).
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2025-06-18", "2025-03-26", "2024-11-05"];

/// True iff `version` is one this framework accepts.
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}

/// `params` of an `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version the client wishes to use.
    pub protocol_version: String,
    /// Capabilities the client supports.
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    /// Client identity.
    pub client_info: Implementation,
}

/// Result payload of a successful `initialize` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Echoes the client's requested protocol version on success.
    pub protocol_version: String,
    /// The server's negotiated capability set.
    pub capabilities: ServerCapabilities,
    /// The server's fixed identity (`spec.md` §6).
    pub server_info: Implementation,
}
