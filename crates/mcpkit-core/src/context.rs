//! The per-request context threaded through middleware and handlers
//! (`spec.md` §3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value};

use mcpkit_protocol::JsonRpcMessage;

/// Callback a transport hands the dispatcher to deliver a response.
///
/// Invoked synchronously; transports that need to perform actual I/O
/// are expected to enqueue onto an internal channel so that calling
/// `respond` never blocks the request that produced it (see
/// `mcpkit-stdio`'s dedicated writer task).
pub type RespondFn = Arc<dyn Fn(JsonRpcMessage) + Send + Sync>;

/// Identifies which transport a request arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    /// Transport name, e.g. `"stdio"`.
    pub name: String,
}

/// Caller identity attached to a request by authentication middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    /// Caller's identifier, if known.
    pub id: Option<String>,
    /// Roles assigned to the caller.
    pub roles: Vec<String>,
    /// Fine-grained permissions assigned to the caller.
    pub permissions: Vec<String>,
}

/// Per-execution metadata stamped on a [`RequestContext`] by a
/// primitive registry before invoking a handler (`spec.md` §4.5 step 4).
#[derive(Debug, Clone)]
pub struct ExecutionInfo {
    /// Unique id in the form `{kind}-{name}-{epochMs}-{rand}`.
    pub execution_id: String,
    /// Wall-clock time execution began.
    pub start_time: SystemTime,
    /// Advisory timeout a middleware or handler may enforce.
    pub timeout: Option<Duration>,
    /// Free-form execution metadata.
    pub metadata: Map<String, Value>,
}

/// Identifies which registry (and primitive) is being dispatched.
#[derive(Debug, Clone)]
pub struct RegistryInfo {
    /// `"prompt"`, `"tool"`, or `"resource"`.
    pub kind: &'static str,
    /// Metadata about the specific primitive, e.g. its name.
    pub metadata: Map<String, Value>,
}

/// The mutable per-request context threaded through the middleware
/// onion and into the core routing function.
///
/// `state` lives for the duration of one request only; it is never
/// shared across requests (`spec.md` §3, §5).
#[derive(Clone)]
pub struct RequestContext {
    /// The decoded message this request carries.
    pub request: JsonRpcMessage,
    /// Callback used to deliver the final response, if any.
    pub respond: Option<RespondFn>,
    /// The transport this request arrived on.
    pub transport: TransportInfo,
    /// Free-form per-request state any middleware may read or write.
    pub state: HashMap<String, Value>,
    /// The response to emit, set by a handler or an error-mapping middleware.
    pub response: Option<JsonRpcMessage>,
    /// Caller identity, if authentication middleware populated it.
    pub user: Option<UserInfo>,
    /// Execution metadata, populated during primitive dispatch.
    pub execution: Option<ExecutionInfo>,
    /// Which registry/primitive is being dispatched, if any.
    pub registry: Option<RegistryInfo>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("has_respond", &self.respond.is_some())
            .field("transport", &self.transport)
            .field("state", &self.state)
            .field("response", &self.response)
            .field("user", &self.user)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl RequestContext {
    /// Build a fresh context for an incoming message.
    pub fn new(request: JsonRpcMessage, transport: TransportInfo, respond: RespondFn) -> Self {
        Self {
            request,
            respond: Some(respond),
            transport,
            state: HashMap::new(),
            response: None,
            user: None,
            execution: None,
            registry: None,
        }
    }

    /// Build a context with no response callback, for contexts
    /// constructed outside a transport (tests, in-process dispatch).
    pub fn detached(request: JsonRpcMessage, transport_name: impl Into<String>) -> Self {
        Self {
            request,
            respond: None,
            transport: TransportInfo {
                name: transport_name.into(),
            },
            state: HashMap::new(),
            response: None,
            user: None,
            execution: None,
            registry: None,
        }
    }

    /// Read a value previously stored in `state`.
    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// Store a value in `state`, visible to every subsequent middleware
    /// segment and the core handler for this request only.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    /// The caller's permissions, or an empty slice if no user is attached.
    pub fn permissions(&self) -> &[String] {
        self.user.as_ref().map_or(&[], |u| u.permissions.as_slice())
    }
}
