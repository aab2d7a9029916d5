//! Request gate: classifies methods and validates them against the
//! current lifecycle state (`spec.md` §4.2).

use mcpkit_protocol::JsonRpcError;

use crate::error::CoreError;
use crate::lifecycle::{LifecycleManager, LifecycleState};

/// Methods always permitted regardless of lifecycle state.
const ALWAYS_ALLOWED: &[&str] = &["ping", "notifications/cancelled", "notifications/progress"];

/// The handshake-only methods, gated by their own rules rather than
/// the blanket operational `Ready` requirement.
const INITIALIZATION: &[&str] = &["initialize", "notifications/initialized"];

/// The three buckets a method falls into (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCategory {
    /// Permitted in any lifecycle state.
    AlwaysAllowed,
    /// Part of the `initialize` / `notifications/initialized` handshake.
    Initialization,
    /// Requires the server to be `Ready`.
    Operational,
}

/// Classifies JSON-RPC methods and checks them against lifecycle state.
///
/// This type carries no state of its own — it is a pure function of
/// `(method, lifecycle manager)` and is safe to share across requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestGate;

impl RequestGate {
    /// Classify a method name into its gating category (`spec.md` §4.2).
    ///
    /// `shutdown` is treated as always-allowed: `LifecycleManager::shutdown`
    /// is idempotent in every state, so gating it behind `Ready` would
    /// make it unreachable exactly when a stuck handshake most needs it
    /// (see `DESIGN.md`, "shutdown classification").
    pub fn classify(method: &str) -> MethodCategory {
        if ALWAYS_ALLOWED.contains(&method) || method == "shutdown" {
            return MethodCategory::AlwaysAllowed;
        }
        if INITIALIZATION.contains(&method) {
            return MethodCategory::Initialization;
        }
        MethodCategory::Operational
    }

    /// Throwing form: validate `method` against `lifecycle`'s current state.
    ///
    /// # Errors
    ///
    /// See [`Self::validation_error`] for the full rule table.
    pub fn validate(method: &str, lifecycle: &LifecycleManager) -> Result<(), CoreError> {
        match Self::validation_error(method, lifecycle) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Non-throwing form used by the dispatcher: returns the `CoreError`
    /// this request would fail with, or `None` if it may proceed.
    pub fn validation_error(method: &str, lifecycle: &LifecycleManager) -> Option<CoreError> {
        match Self::classify(method) {
            MethodCategory::AlwaysAllowed => None,
            MethodCategory::Initialization => Self::validate_initialization(method, lifecycle),
            MethodCategory::Operational => Self::validate_operational(method, lifecycle),
        }
    }

    fn validate_initialization(method: &str, lifecycle: &LifecycleManager) -> Option<CoreError> {
        match method {
            "initialize" => {
                if lifecycle.is_initialized() {
                    Some(CoreError::AlreadyInitialized)
                } else {
                    None
                }
            }
            "notifications/initialized" => {
                if lifecycle.state() == LifecycleState::Initializing {
                    None
                } else {
                    Some(CoreError::LifecycleViolationGeneric(
                        "notifications/initialized is only valid while initializing".to_string(),
                    ))
                }
            }
            _ => None,
        }
    }

    fn validate_operational(method: &str, lifecycle: &LifecycleManager) -> Option<CoreError> {
        if lifecycle.is_ready() {
            return None;
        }
        if !lifecycle.is_initialized() {
            return Some(if lifecycle.has_been_initialized() {
                CoreError::PostShutdown
            } else {
                CoreError::NotInitialized
            });
        }
        Some(CoreError::LifecycleViolation {
            current_state: lifecycle.state(),
            operation: method.to_string(),
        })
    }

    /// Build the JSON-RPC error object for a rejected method, or `None`
    /// if the request may proceed. This is the form the dispatcher calls
    /// directly (`spec.md` §4.7 step 2b).
    pub fn json_rpc_error(method: &str, lifecycle: &LifecycleManager) -> Option<JsonRpcError> {
        Self::validation_error(method, lifecycle).map(CoreError::into_json_rpc_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::CapabilityRegistry;
    use std::sync::Arc;

    fn manager() -> LifecycleManager {
        LifecycleManager::new(Arc::new(CapabilityRegistry::new()))
    }

    fn init_params() -> mcpkit_protocol::InitializeParams {
        mcpkit_protocol::InitializeParams {
            protocol_version: "2025-06-18".to_string(),
            capabilities: Default::default(),
            client_info: mcpkit_protocol::Implementation {
                name: "c".into(),
                version: "0".into(),
            },
        }
    }

    #[test]
    fn pre_init_operational_request_is_not_initialized() {
        let mgr = manager();
        let err = RequestGate::validate("tools/list", &mgr).unwrap_err();
        assert!(matches!(err, CoreError::NotInitialized));
    }

    #[test]
    fn post_shutdown_operational_request_is_post_shutdown() {
        let mgr = manager();
        mgr.initialize(init_params()).unwrap();
        mgr.initialized().unwrap();
        futures::executor::block_on(mgr.shutdown(None)).unwrap();
        let err = RequestGate::validate("tools/list", &mgr).unwrap_err();
        assert!(matches!(err, CoreError::PostShutdown));
    }

    #[test]
    fn initializing_operational_request_is_lifecycle_violation() {
        let mgr = manager();
        mgr.initialize(init_params()).unwrap();
        let err = RequestGate::validate("tools/list", &mgr).unwrap_err();
        assert!(matches!(err, CoreError::LifecycleViolation { .. }));
    }

    #[test]
    fn always_allowed_methods_pass_in_any_state() {
        let mgr = manager();
        assert!(RequestGate::validate("ping", &mgr).is_ok());
        assert!(RequestGate::validate("notifications/cancelled", &mgr).is_ok());
        assert!(RequestGate::validate("shutdown", &mgr).is_ok());
    }

    #[test]
    fn unknown_methods_default_operational() {
        assert_eq!(
            RequestGate::classify("some/unknown/method"),
            MethodCategory::Operational
        );
    }

    #[test]
    fn initialize_twice_is_already_initialized() {
        let mgr = manager();
        mgr.initialize(init_params()).unwrap();
        let err = RequestGate::validate("initialize", &mgr).unwrap_err();
        assert!(matches!(err, CoreError::AlreadyInitialized));
    }
}
