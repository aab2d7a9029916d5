//! Capability types exchanged during the MCP handshake.
//!
//! These are pure data: negotiation and merge behavior lives in
//! `mcpkit-core::capabilities::CapabilityRegistry`. Unrecognized keys
//! round-trip through `experimental`/`extra` so a server can declare
//! forward-looking capabilities without this crate knowing about them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Capabilities the client declares in its `initialize` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Experimental, non-standardized client features.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub experimental: Map<String, Value>,
    /// Present iff the client supports server-initiated sampling requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Map<String, Value>>,
}

impl ClientCapabilities {
    /// True iff the client declared at least one experimental capability.
    pub fn has_experimental(&self) -> bool {
        !self.experimental.is_empty()
    }

    /// True iff the client declared support for sampling.
    pub fn has_sampling(&self) -> bool {
        self.sampling.is_some()
    }
}

/// `tools` capability shape: presently carries no recognized sub-fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsCapabilities {}

/// `logging` capability shape: presently carries no recognized sub-fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingCapabilities {}

/// `completion` capability shape: presently carries no recognized sub-fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionCapabilities {}

/// `prompts` capability shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapabilities {
    /// Whether registered prompts may stream their content in chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,
}

/// `resources` capability shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapabilities {
    /// Whether the server supports `resources/subscribe`.
    #[serde(default)]
    pub subscribe: bool,
    /// Whether the server emits `notifications/resources/list_changed`.
    #[serde(default)]
    pub list_changed: bool,
}

/// Capabilities the server declares back in its `initialize` response.
///
/// Invariant (`spec.md` §3): a primitive-derived key (`prompts`,
/// `tools`, `resources`) appears iff a registry holds at least one
/// primitive of that kind, unless the static configuration overrides
/// it explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    /// Experimental, non-standardized server features. Always
    /// serialized, even when empty (`spec.md` §3's stated default
    /// `{experimental:{}, logging:{}}`).
    #[serde(default)]
    pub experimental: Map<String, Value>,
    /// Logging capability; present whenever logging is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapabilities>,
    /// Completion capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionCapabilities>,
    /// Prompt capability; present iff the prompt registry is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapabilities>,
    /// Tool capability; present iff the tool registry is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapabilities>,
    /// Resource capability; present iff the resource registry is non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapabilities>,
}

/// Client/server identity exchanged in the `initialize` handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,
    /// Implementation version string.
    pub version: String,
}

/// The fixed `serverInfo` pair this framework always returns (`spec.md` §6).
pub fn server_info() -> Implementation {
    Implementation {
        name: "MCP Server Framework".to_string(),
        version: "1.0.0".to_string(),
    }
}
