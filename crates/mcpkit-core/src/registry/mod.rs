//! Primitive registries: prompts, tools, and resources (`spec.md` §4.5).

pub mod common;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use common::{
    new_execution_id, BeforeHook, AfterHook, Counters, DeclarativeValidator, Hooks, OnErrorHook,
    ParamKind, ParamSpec, RegistryMetrics, ValidationResult, Validator,
};
pub use prompts::{PromptDefinition, PromptDescriptor, PromptFilter, PromptMessage, PromptRegistry};
pub use resources::{
    InMemoryResourceProvider, ResourceContent, ResourceDescriptor, ResourcePage, ResourceProvider,
    ResourceRegistry,
};
pub use tools::{ToolAuthorization, ToolDefinition, ToolDescriptor, ToolFilter, ToolRegistry};

use crate::capabilities::DynamicCapabilitySource;

/// Groups the three primitive registries behind a single
/// [`DynamicCapabilitySource`] implementation, so [`crate::capabilities::CapabilityRegistry`]
/// can derive dynamic capability presence without depending on their
/// concrete types.
pub struct Registries {
    /// The prompt registry.
    pub prompts: PromptRegistry,
    /// The tool registry.
    pub tools: ToolRegistry,
    /// The resource registry.
    pub resources: ResourceRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    /// Three empty registries.
    pub fn new() -> Self {
        Self {
            prompts: PromptRegistry::new(),
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
        }
    }
}

impl DynamicCapabilitySource for Registries {
    fn tools_present(&self) -> bool {
        self.tools.is_present()
    }

    fn prompts_present(&self) -> bool {
        self.prompts.is_present()
    }

    fn resources_present(&self) -> bool {
        self.resources.is_present()
    }
}
