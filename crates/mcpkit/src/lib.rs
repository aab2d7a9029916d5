//! # mcpkit
//!
//! Thin top-level facade: re-exports the protocol and core crates,
//! assembles a [`Server`] from explicit parts, and auto-registers the
//! reference stdio transport unless `MCPKIT_NO_DEFAULT_TRANSPORT` is
//! set.
//!
//! `Server` is an explicit-setup record rather than a fluent builder
//! (`spec.md` §9's "fluent builder" redesign note): construct the
//! pieces you need, pass them to [`Server::new`], and call
//! [`Server::listen`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

pub use mcpkit_core::*;
pub use mcpkit_protocol::*;
pub use mcpkit_stdio::StdioTransport;

/// The environment variable that, when set to exactly `"true"`,
/// suppresses auto-registration of the default stdio transport
/// (`spec.md` §6, §9).
pub const NO_DEFAULT_TRANSPORT_ENV: &str = "MCPKIT_NO_DEFAULT_TRANSPORT";

fn default_transport_suppressed() -> bool {
    std::env::var(NO_DEFAULT_TRANSPORT_ENV)
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// Minimal stderr-only logging setup, since stdout is reserved for the
/// wire protocol on the stdio transport (`spec.md` §4.9).
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::stderr_minimal()
    }
}

impl LoggingConfig {
    /// A minimal configuration logging `info` and above to stderr,
    /// honoring `RUST_LOG` when set.
    pub fn stderr_minimal() -> Self {
        Self {
            default_filter: "info".to_string(),
        }
    }

    /// Install this configuration as the global default subscriber.
    ///
    /// Safe to call at most once per process; a second call is a no-op
    /// (the underlying `tracing` global default can only be set once).
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_filter.clone()));
        let _ = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .try_init();
    }
}

/// The assembled server: lifecycle manager, capability registry,
/// primitive registries, middleware engine, dispatcher, and the
/// transports that feed it.
pub struct Server {
    lifecycle: Arc<LifecycleManager>,
    capabilities: Arc<CapabilityRegistry>,
    registries: Arc<Registries>,
    dispatcher: Arc<Dispatcher>,
    transports: Arc<TransportOrchestrator>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.lifecycle.state())
            .field("transports", &self.transports.len())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Assemble a server from its registries and middleware engine.
    ///
    /// Unless [`NO_DEFAULT_TRANSPORT_ENV`] is set to exactly `"true"`,
    /// a [`StdioTransport`] is auto-registered.
    pub fn new(registries: Registries, middleware: MiddlewareEngine) -> Self {
        let capabilities = Arc::new(CapabilityRegistry::new());
        let registries = Arc::new(registries);
        capabilities.set_dynamic_source(Arc::clone(&registries) as Arc<dyn DynamicCapabilitySource>);
        let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&capabilities)));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&lifecycle),
            Arc::clone(&capabilities),
            Arc::clone(&registries),
            Arc::new(middleware),
        ));

        let transports = Arc::new(TransportOrchestrator::new());
        if !default_transport_suppressed() {
            transports.register(Arc::new(StdioTransport::new()));
        }

        Self {
            lifecycle,
            capabilities,
            registries,
            dispatcher,
            transports,
        }
    }

    /// The lifecycle manager backing this server.
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// The capability registry backing this server.
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// The prompt/tool/resource registries backing this server.
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// The transport orchestrator backing this server. Register
    /// additional transports here before calling [`Server::listen`].
    pub fn transports(&self) -> &TransportOrchestrator {
        &self.transports
    }

    /// Start every registered transport, routing each decoded message
    /// to the dispatcher on its own task so one slow request cannot
    /// block the next (`spec.md` §5's cooperative-suspension model).
    ///
    /// # Errors
    ///
    /// See [`TransportOrchestrator::start_all`].
    pub async fn listen(&self) -> CoreResult<()> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let dispatch: DispatchFn = Arc::new(move |message, respond, transport| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher.dispatch(message, Some(respond), transport).await;
            });
        });
        self.transports.start_all(dispatch).await
    }

    /// Stop every registered transport and run the lifecycle's
    /// `shutdown` sequence.
    pub async fn shutdown(&self, reason: Option<String>) -> CoreResult<()> {
        self.transports.stop_all().await;
        self.lifecycle.shutdown(reason).await
    }
}
