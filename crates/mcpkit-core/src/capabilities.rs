//! Server/client capability negotiation (`spec.md` §4.3).

use parking_lot::Mutex;
use serde_json::{Map, Value};

use mcpkit_protocol::{
    ClientCapabilities, CompletionCapabilities, LoggingCapabilities, PromptsCapabilities,
    ResourcesCapabilities, ServerCapabilities, ToolsCapabilities,
};

/// A source of dynamic, registry-derived capability presence.
///
/// Implemented by the primitive registries so the [`CapabilityRegistry`]
/// can answer "is there at least one tool/prompt/resource registered?"
/// without depending on their concrete types.
pub trait DynamicCapabilitySource: Send + Sync {
    /// Whether at least one tool is registered.
    fn tools_present(&self) -> bool;
    /// Whether at least one prompt is registered.
    fn prompts_present(&self) -> bool;
    /// Whether at least one resource is registered.
    fn resources_present(&self) -> bool;
}

#[derive(Debug, Clone, Default)]
struct PromptsOverride {
    streaming: Option<bool>,
}

#[derive(Debug, Clone, Default)]
struct ResourcesOverride {
    subscribe: Option<bool>,
    list_changed: Option<bool>,
}

#[derive(Debug, Clone)]
struct StaticCapabilities {
    experimental: Map<String, Value>,
    logging: Option<LoggingCapabilities>,
    completion: Option<CompletionCapabilities>,
    prompts: Option<PromptsOverride>,
    tools: Option<ToolsCapabilities>,
    resources: Option<ResourcesOverride>,
}

impl Default for StaticCapabilities {
    /// Matches `spec.md` §3's stated defaults: `{experimental:{}, logging:{}}`.
    fn default() -> Self {
        Self {
            experimental: Map::new(),
            logging: Some(LoggingCapabilities {}),
            completion: None,
            prompts: None,
            tools: None,
            resources: None,
        }
    }
}

/// Negotiates server capabilities (static configuration merged with
/// registry-derived dynamic capabilities) and stores the client's
/// declared capabilities from the handshake.
pub struct CapabilityRegistry {
    static_caps: Mutex<StaticCapabilities>,
    client_caps: Mutex<Option<ClientCapabilities>>,
    dynamic: Mutex<Option<std::sync::Arc<dyn DynamicCapabilitySource>>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("static_caps", &*self.static_caps.lock())
            .finish_non_exhaustive()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// Create a registry with default static capabilities and no
    /// dynamic source attached.
    pub fn new() -> Self {
        Self {
            static_caps: Mutex::new(StaticCapabilities::default()),
            client_caps: Mutex::new(None),
            dynamic: Mutex::new(None),
        }
    }

    /// Attach the registry-derived dynamic capability source.
    pub fn set_dynamic_source(&self, source: std::sync::Arc<dyn DynamicCapabilitySource>) {
        *self.dynamic.lock() = Some(source);
    }

    /// Store the client's capabilities, as declared in `initialize`.
    pub fn process_client_capabilities(&self, capabilities: ClientCapabilities) {
        *self.client_caps.lock() = Some(capabilities);
    }

    /// The most recently stored client capabilities, if any.
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.client_caps.lock().clone()
    }

    /// True iff the client declared a non-empty `experimental` map.
    pub fn client_has_experimental(&self) -> bool {
        self.client_caps
            .lock()
            .as_ref()
            .is_some_and(ClientCapabilities::has_experimental)
    }

    /// True iff the client declared support for `sampling`.
    pub fn client_has_sampling(&self) -> bool {
        self.client_caps
            .lock()
            .as_ref()
            .is_some_and(ClientCapabilities::has_sampling)
    }

    /// Enable the `prompts` capability statically, independent of registry state.
    pub fn enable_prompts(&self, streaming: Option<bool>) {
        self.static_caps.lock().prompts = Some(PromptsOverride { streaming });
    }

    /// Enable the `tools` capability statically, independent of registry state.
    pub fn enable_tools(&self) {
        self.static_caps.lock().tools = Some(ToolsCapabilities::default());
    }

    /// Enable the `resources` capability statically, independent of registry state.
    pub fn enable_resources(&self, subscribe: bool, list_changed: bool) {
        self.static_caps.lock().resources = Some(ResourcesOverride {
            subscribe: Some(subscribe),
            list_changed: Some(list_changed),
        });
    }

    /// Enable the `completion` capability.
    pub fn enable_completion(&self) {
        self.static_caps.lock().completion = Some(CompletionCapabilities {});
    }

    /// Enable the `logging` capability (already enabled by default).
    pub fn enable_logging(&self) {
        self.static_caps.lock().logging = Some(LoggingCapabilities {});
    }

    /// Add or replace an experimental capability entry.
    pub fn add_experimental_capability(&self, name: impl Into<String>, config: Value) {
        self.static_caps
            .lock()
            .experimental
            .insert(name.into(), config);
    }

    /// Remove a statically configured capability key so dynamic
    /// derivation governs it again (`spec.md` §4.3).
    pub fn disable_capability(&self, key: &str) {
        let mut caps = self.static_caps.lock();
        match key {
            "experimental" => caps.experimental.clear(),
            "logging" => caps.logging = None,
            "completion" => caps.completion = None,
            "prompts" => caps.prompts = None,
            "tools" => caps.tools = None,
            "resources" => caps.resources = None,
            _ => {}
        }
    }

    /// Compute the deep-merged `ServerCapabilities` to report in the
    /// `initialize` response: dynamic capabilities supply missing
    /// keys, static entries win on conflict, nested shapes merge
    /// field-wise (`spec.md` §4.3).
    pub fn get_server_capabilities(&self) -> ServerCapabilities {
        let dynamic = self.dynamic.lock().clone();
        let has_tools = dynamic.as_ref().is_some_and(|d| d.tools_present());
        let has_prompts = dynamic.as_ref().is_some_and(|d| d.prompts_present());
        let has_resources = dynamic.as_ref().is_some_and(|d| d.resources_present());

        let caps = self.static_caps.lock();

        let tools = caps
            .tools
            .clone()
            .or_else(|| has_tools.then(ToolsCapabilities::default));

        let prompts = match (&caps.prompts, has_prompts) {
            (Some(ov), _) => Some(PromptsCapabilities {
                streaming: ov.streaming,
            }),
            (None, true) => Some(PromptsCapabilities::default()),
            (None, false) => None,
        };

        let resources = match (&caps.resources, has_resources) {
            (Some(ov), _) => Some(ResourcesCapabilities {
                subscribe: ov.subscribe.unwrap_or(false),
                list_changed: ov.list_changed.unwrap_or(false),
            }),
            (None, true) => Some(ResourcesCapabilities::default()),
            (None, false) => None,
        };

        ServerCapabilities {
            experimental: caps.experimental.clone(),
            logging: caps.logging.clone(),
            completion: caps.completion.clone(),
            tools,
            prompts,
            resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct FakeRegistries {
        tools: bool,
        prompts: bool,
        resources: bool,
    }

    impl DynamicCapabilitySource for FakeRegistries {
        fn tools_present(&self) -> bool {
            self.tools
        }
        fn prompts_present(&self) -> bool {
            self.prompts
        }
        fn resources_present(&self) -> bool {
            self.resources
        }
    }

    #[test]
    fn defaults_contain_experimental_and_logging_only() {
        let caps = CapabilityRegistry::new().get_server_capabilities();
        assert!(caps.logging.is_some());
        assert!(caps.tools.is_none());
        assert!(caps.prompts.is_none());
        assert!(caps.resources.is_none());
    }

    #[test]
    fn dynamic_presence_surfaces_tools_key() {
        let registry = CapabilityRegistry::new();
        registry.set_dynamic_source(Arc::new(FakeRegistries {
            tools: true,
            prompts: false,
            resources: false,
        }));
        let caps = registry.get_server_capabilities();
        assert!(caps.tools.is_some());
        assert!(caps.prompts.is_none());
        assert!(caps.resources.is_none());
    }

    #[test]
    fn static_override_wins_over_dynamic_absence() {
        let registry = CapabilityRegistry::new();
        registry.enable_resources(true, true);
        let caps = registry.get_server_capabilities();
        let resources = caps.resources.unwrap();
        assert!(resources.subscribe);
        assert!(resources.list_changed);
    }

    #[test]
    fn disable_then_dynamic_can_reinstate() {
        let registry = CapabilityRegistry::new();
        registry.enable_tools();
        registry.disable_capability("tools");
        assert!(registry.get_server_capabilities().tools.is_none());

        registry.set_dynamic_source(Arc::new(FakeRegistries {
            tools: true,
            prompts: false,
            resources: false,
        }));
        assert!(registry.get_server_capabilities().tools.is_some());
    }
}
