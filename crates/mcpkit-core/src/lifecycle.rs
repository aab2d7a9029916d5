//! The four-state lifecycle handshake state machine (`spec.md` §3, §4.1).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mcpkit_protocol::{InitializeParams, InitializeResult, server_info};

use crate::capabilities::CapabilityRegistry;
use crate::error::{CoreError, CoreResult};

/// The four protocol lifecycle states (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    /// Before any `initialize` call has been made.
    Idle,
    /// `initialize` has been called but `notifications/initialized` has not.
    Initializing,
    /// The handshake is complete; operational requests are accepted.
    Ready,
    /// `shutdown` has been invoked; tearing down.
    ShuttingDown,
}

impl LifecycleState {
    /// Whether this state permits the given transition target, per the
    /// fixed table in `spec.md` §3.
    pub fn can_transition_to(self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            (Idle, Initializing)
                | (Initializing, Ready)
                | (Initializing, ShuttingDown)
                | (Initializing, Idle)
                | (Ready, ShuttingDown)
                | (ShuttingDown, Idle)
        )
    }
}

/// Events emitted by the [`LifecycleManager`] as the state machine advances.
///
/// Subscribers are pure observers: they must not attempt to mutate
/// lifecycle state from within a callback.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// The state changed from `prev` to `curr`.
    StateChanged {
        /// Previous state.
        prev: LifecycleState,
        /// New state.
        curr: LifecycleState,
        /// Wall-clock time of the transition.
        ts: SystemTime,
    },
    /// `initialize` began processing.
    InitializationStarted {
        /// The negotiated protocol version requested by the client.
        protocol_version: String,
        /// Wall-clock time.
        ts: SystemTime,
    },
    /// `initialize` completed successfully.
    InitializationCompleted {
        /// The result that was returned to the client.
        result: InitializeResult,
        /// Wall-clock time.
        ts: SystemTime,
    },
    /// `initialize` failed; the state returned to `Idle`.
    InitializationFailed {
        /// Human-readable failure reason.
        error: String,
        /// Wall-clock time.
        ts: SystemTime,
    },
    /// The server reached `Ready`.
    Ready {
        /// Wall-clock time.
        ts: SystemTime,
    },
    /// `shutdown` began processing.
    ShutdownStarted {
        /// Caller-supplied reason, if any.
        reason: Option<String>,
        /// Wall-clock time.
        ts: SystemTime,
    },
    /// `shutdown` completed, successfully or not.
    ShutdownCompleted {
        /// The cleanup hook's error, if it failed.
        error: Option<String>,
        /// Wall-clock time.
        ts: SystemTime,
    },
}

/// A pure observer of lifecycle events.
pub type LifecycleSubscriber = Arc<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// An optional async cleanup hook run during `shutdown`.
pub type ShutdownHook = Arc<dyn Fn() -> BoxFuture<'static, CoreResult<()>> + Send + Sync>;

/// The four-state lifecycle handshake state machine.
///
/// Transitions are serialized through a single mutex so that, per
/// `spec.md` §5, concurrent `initialize` callers observe a single
/// winner and all others fail with [`CoreError::AlreadyInitialized`].
pub struct LifecycleManager {
    state: Mutex<LifecycleState>,
    has_been_initialized: AtomicBool,
    capabilities: Arc<CapabilityRegistry>,
    subscribers: Mutex<Vec<LifecycleSubscriber>>,
    shutdown_hook: Mutex<Option<ShutdownHook>>,
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("state", &*self.state.lock())
            .field("has_been_initialized", &self.has_been_initialized.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl LifecycleManager {
    /// Create a new manager in the `Idle` state, backed by `capabilities`
    /// for building the `initialize` response.
    pub fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Idle),
            has_been_initialized: AtomicBool::new(false),
            capabilities,
            subscribers: Mutex::new(Vec::new()),
            shutdown_hook: Mutex::new(None),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// `isInitialized` ≡ state ≠ `Idle` (`spec.md` §3).
    pub fn is_initialized(&self) -> bool {
        self.state() != LifecycleState::Idle
    }

    /// `isReady` ≡ state = `Ready` (`spec.md` §3).
    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Whether `Initializing` has ever been entered. Never cleared once true.
    pub fn has_been_initialized(&self) -> bool {
        self.has_been_initialized.load(Ordering::SeqCst)
    }

    /// Register an observer of lifecycle events.
    pub fn subscribe(&self, subscriber: LifecycleSubscriber) {
        self.subscribers.lock().push(subscriber);
    }

    /// Register the cleanup hook run during `shutdown`.
    pub fn set_shutdown_hook(&self, hook: ShutdownHook) {
        *self.shutdown_hook.lock() = Some(hook);
    }

    fn emit(&self, event: LifecycleEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber(&event);
        }
    }

    /// Attempt a raw state transition, enforcing the fixed transition
    /// table. Emits [`LifecycleEvent::StateChanged`] on success.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidStateTransition`] if the transition
    /// is not in the allowed table; state is left unchanged.
    fn transition(&self, target: LifecycleState) -> CoreResult<()> {
        let mut guard = self.state.lock();
        let current = *guard;
        if !current.can_transition_to(target) {
            return Err(CoreError::InvalidStateTransition {
                from: current,
                to: target,
            });
        }
        *guard = target;
        drop(guard);
        self.emit(LifecycleEvent::StateChanged {
            prev: current,
            curr: target,
            ts: SystemTime::now(),
        });
        Ok(())
    }

    /// Handle an `initialize` request (`spec.md` §4.1).
    ///
    /// # Errors
    ///
    /// - [`CoreError::AlreadyInitialized`] if the state is not `Idle`.
    /// - [`CoreError::InvalidParams`] if `protocolVersion` is not supported;
    ///   the state returns to `Idle` in this case.
    pub fn initialize(&self, params: InitializeParams) -> CoreResult<InitializeResult> {
        {
            let mut guard = self.state.lock();
            if *guard != LifecycleState::Idle {
                return Err(CoreError::AlreadyInitialized);
            }
            *guard = LifecycleState::Initializing;
        }
        self.emit(LifecycleEvent::StateChanged {
            prev: LifecycleState::Idle,
            curr: LifecycleState::Initializing,
            ts: SystemTime::now(),
        });
        self.emit(LifecycleEvent::InitializationStarted {
            protocol_version: params.protocol_version.clone(),
            ts: SystemTime::now(),
        });

        if !mcpkit_protocol::is_supported_protocol_version(&params.protocol_version) {
            let message = format!(
                "Unsupported protocol version: {}",
                params.protocol_version
            );
            // Failed initialization returns to Idle (spec.md §3 transition table)
            // without ever marking the server as having been initialized, so a
            // later pre-init request is still classified NotInitialized, not
            // PostShutdown.
            self.transition(LifecycleState::Idle)
                .expect("Initializing -> Idle is always permitted");
            warn!(version = %params.protocol_version, "rejecting unsupported protocol version");
            self.emit(LifecycleEvent::InitializationFailed {
                error: message.clone(),
                ts: SystemTime::now(),
            });
            return Err(CoreError::InvalidParams(message));
        }

        self.has_been_initialized.store(true, Ordering::SeqCst);
        self.capabilities.process_client_capabilities(params.capabilities);

        let result = InitializeResult {
            protocol_version: params.protocol_version,
            capabilities: self.capabilities.get_server_capabilities(),
            server_info: server_info(),
        };

        debug!("initialize accepted, awaiting notifications/initialized");
        self.emit(LifecycleEvent::InitializationCompleted {
            result: result.clone(),
            ts: SystemTime::now(),
        });

        Ok(result)
    }

    /// Handle `notifications/initialized`, the handshake trigger that
    /// advances `Initializing -> Ready` (`spec.md` §9 open question,
    /// resolved in `DESIGN.md` toward the "trigger" interpretation).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LifecycleViolationGeneric`] unless the
    /// current state is `Initializing`.
    pub fn initialized(&self) -> CoreResult<()> {
        if self.state() != LifecycleState::Initializing {
            return Err(CoreError::LifecycleViolationGeneric(
                "notifications/initialized is only valid while initializing".to_string(),
            ));
        }
        self.transition(LifecycleState::Ready)?;
        info!("lifecycle ready");
        self.emit(LifecycleEvent::Ready {
            ts: SystemTime::now(),
        });
        Ok(())
    }

    /// Handle `shutdown` (`spec.md` §4.1). Idempotent when already `Idle`
    /// or `ShuttingDown`.
    ///
    /// Errors raised by the cleanup hook still force the final `Idle`
    /// transition, but propagate to the caller (`spec.md` §4.1, §7).
    pub async fn shutdown(&self, reason: Option<String>) -> CoreResult<()> {
        {
            let state = self.state();
            if state == LifecycleState::Idle || state == LifecycleState::ShuttingDown {
                return Ok(());
            }
        }

        self.transition(LifecycleState::ShuttingDown)?;
        self.emit(LifecycleEvent::ShutdownStarted {
            reason: reason.clone(),
            ts: SystemTime::now(),
        });

        let hook = self.shutdown_hook.lock().clone();
        let cleanup_result = if let Some(hook) = hook {
            hook().await
        } else {
            Ok(())
        };

        self.transition(LifecycleState::Idle)
            .expect("ShuttingDown -> Idle is always permitted");

        let error_message = cleanup_result.as_ref().err().map(ToString::to_string);
        self.emit(LifecycleEvent::ShutdownCompleted {
            error: error_message,
            ts: SystemTime::now(),
        });

        cleanup_result
    }

    /// Throwing form of the lifecycle precondition check used by
    /// callers that want a `Result` rather than the gate's
    /// non-throwing [`crate::gate::RequestGate::validation_error`].
    ///
    /// # Errors
    ///
    /// See [`crate::gate::RequestGate`] for the full rule table.
    pub fn validate_operation(&self, method: &str) -> CoreResult<()> {
        match crate::gate::RequestGate::validation_error(method, self) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;

    fn manager() -> LifecycleManager {
        LifecycleManager::new(Arc::new(CapabilityRegistry::new()))
    }

    fn params(version: &str) -> InitializeParams {
        InitializeParams {
            protocol_version: version.to_string(),
            capabilities: Default::default(),
            client_info: mcpkit_protocol::Implementation {
                name: "test-client".into(),
                version: "0.0.0".into(),
            },
        }
    }

    #[test]
    fn normal_session_sequence() {
        let mgr = manager();
        assert_eq!(mgr.state(), LifecycleState::Idle);
        assert!(!mgr.has_been_initialized());

        mgr.initialize(params("2025-06-18")).unwrap();
        assert_eq!(mgr.state(), LifecycleState::Initializing);
        assert!(mgr.has_been_initialized());

        mgr.initialized().unwrap();
        assert_eq!(mgr.state(), LifecycleState::Ready);

        futures::executor::block_on(mgr.shutdown(None)).unwrap();
        assert_eq!(mgr.state(), LifecycleState::Idle);
        assert!(mgr.has_been_initialized(), "never cleared once true");
    }

    #[test]
    fn duplicate_initialize_rejected() {
        let mgr = manager();
        mgr.initialize(params("2025-06-18")).unwrap();
        let err = mgr.initialize(params("2025-06-18")).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyInitialized));
        assert_eq!(mgr.state(), LifecycleState::Initializing);
    }

    #[test]
    fn unsupported_version_returns_to_idle() {
        let mgr = manager();
        let err = mgr.initialize(params("1.0.0")).unwrap_err();
        match err {
            CoreError::InvalidParams(msg) => {
                assert_eq!(msg, "Unsupported protocol version: 1.0.0");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mgr.state(), LifecycleState::Idle);
        assert!(!mgr.has_been_initialized());
    }

    #[test]
    fn initialized_without_initializing_fails() {
        let mgr = manager();
        assert!(mgr.initialized().is_err());
    }

    #[test]
    fn shutdown_is_idempotent_when_idle() {
        let mgr = manager();
        futures::executor::block_on(mgr.shutdown(None)).unwrap();
        assert_eq!(mgr.state(), LifecycleState::Idle);
    }

    #[test]
    fn all_supported_versions_accepted() {
        for version in mcpkit_protocol::SUPPORTED_PROTOCOL_VERSIONS {
            let mgr = manager();
            assert!(mgr.initialize(params(version)).is_ok());
        }
    }
}
