//! # mcpkit-core
//!
//! Lifecycle state machine, capability negotiation, primitive
//! registries, middleware engine, request gate, handshake handlers,
//! dispatcher, and the `Transport` trait for the MCP server framework.
//! Transport-agnostic: see `mcpkit-stdio` for the reference stdio
//! implementation.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod capabilities;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handshake;
pub mod lifecycle;
pub mod middleware;
pub mod registry;
pub mod transport;

pub use capabilities::{CapabilityRegistry, DynamicCapabilitySource};
pub use config::ServerConfig;
pub use context::{ExecutionInfo, RegistryInfo, RequestContext, RespondFn, TransportInfo, UserInfo};
pub use dispatcher::{DispatchFn, Dispatcher};
pub use error::{CoreError, CoreResult};
pub use gate::{MethodCategory, RequestGate};
pub use handshake::HandshakeHandlers;
pub use lifecycle::{LifecycleEvent, LifecycleManager, LifecycleState, LifecycleSubscriber, ShutdownHook};
pub use middleware::{
    CoreHandler, ErrorMapperMiddleware, LoggingMiddleware, Middleware, MiddlewareEngine, Next,
    TimeoutMiddleware,
};
pub use registry::{
    InMemoryResourceProvider, PromptDefinition, PromptRegistry, Registries, ResourceContent,
    ResourceProvider, ResourceRegistry, ToolAuthorization, ToolDefinition, ToolRegistry,
};
pub use transport::{Transport, TransportOrchestrator};
