//! The `Transport` trait and the orchestrator that manages a set of
//! running transports (`spec.md` §4.8).

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::dispatcher::DispatchFn;
use crate::error::{CoreError, CoreResult};

/// A concrete binding between the wire and the dispatcher: owns I/O,
/// decodes incoming messages, and calls `dispatch` for each one
/// (`spec.md` §4.9 for the stdio reference implementation).
#[async_trait]
pub trait Transport: Send + Sync {
    /// A short name identifying this transport, e.g. `"stdio"`.
    fn name(&self) -> &str;

    /// Begin accepting input and delivering decoded messages to `dispatch`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] if the transport could not start.
    async fn start(&self, dispatch: DispatchFn) -> CoreResult<()>;

    /// Stop accepting input and release any held resources. Idempotent.
    async fn stop(&self) -> CoreResult<()>;
}

/// Manages a set of registered transports, starting and stopping them
/// together (`spec.md` §4.8).
///
/// Duplicate `register` calls under the same transport name are
/// **appended**, not replaced — see `DESIGN.md`, "duplicate transport
/// registration".
#[derive(Default)]
pub struct TransportOrchestrator {
    transports: Mutex<Vec<std::sync::Arc<dyn Transport>>>,
}

impl std::fmt::Debug for TransportOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportOrchestrator")
            .field("len", &self.transports.lock().len())
            .finish_non_exhaustive()
    }
}

impl TransportOrchestrator {
    /// An orchestrator with no transports registered.
    pub fn new() -> Self {
        Self {
            transports: Mutex::new(Vec::new()),
        }
    }

    /// Register a transport. Names are not deduplicated (`spec.md` §4.8).
    pub fn register(&self, transport: std::sync::Arc<dyn Transport>) {
        self.transports.lock().push(transport);
    }

    /// The number of registered transports.
    pub fn len(&self) -> usize {
        self.transports.lock().len()
    }

    /// True iff no transport is registered.
    pub fn is_empty(&self) -> bool {
        self.transports.lock().is_empty()
    }

    /// Start every registered transport with `dispatch`.
    ///
    /// # Errors
    ///
    /// If any transport fails to start, attempts to start the rest
    /// anyway, then returns `"Failed to start K of N transports"`.
    pub async fn start_all(&self, dispatch: DispatchFn) -> CoreResult<()> {
        let transports = self.transports.lock().clone();
        let total = transports.len();
        let mut failures = 0usize;
        for transport in &transports {
            if let Err(err) = transport.start(dispatch.clone()).await {
                error!(transport = transport.name(), %err, "transport failed to start");
                failures += 1;
            } else {
                info!(transport = transport.name(), "transport started");
            }
        }
        if failures > 0 {
            return Err(CoreError::Transport(format!(
                "Failed to start {failures} of {total} transports"
            )));
        }
        Ok(())
    }

    /// Stop every registered transport. Per-transport errors are logged
    /// but do not prevent the rest from stopping.
    pub async fn stop_all(&self) {
        let transports = self.transports.lock().clone();
        for transport in &transports {
            if let Err(err) = transport.stop().await {
                error!(transport = transport.name(), %err, "transport failed to stop cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyTransport {
        name: String,
        fail_start: bool,
        starts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        fn name(&self) -> &str {
            &self.name
        }

        async fn start(&self, _dispatch: DispatchFn) -> CoreResult<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                Err(CoreError::Transport("boom".to_string()))
            } else {
                Ok(())
            }
        }

        async fn stop(&self) -> CoreResult<()> {
            Ok(())
        }
    }

    fn noop_dispatch() -> DispatchFn {
        Arc::new(|_msg, _respond, _transport| {})
    }

    #[tokio::test]
    async fn duplicate_names_are_appended_not_replaced() {
        let orchestrator = TransportOrchestrator::new();
        let starts = Arc::new(AtomicUsize::new(0));
        orchestrator.register(Arc::new(FlakyTransport {
            name: "stdio".into(),
            fail_start: false,
            starts: Arc::clone(&starts),
        }));
        orchestrator.register(Arc::new(FlakyTransport {
            name: "stdio".into(),
            fail_start: false,
            starts: Arc::clone(&starts),
        }));
        assert_eq!(orchestrator.len(), 2);
        orchestrator.start_all(noop_dispatch()).await.unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn start_all_aggregates_failures_after_attempting_every_transport() {
        let orchestrator = TransportOrchestrator::new();
        let starts = Arc::new(AtomicUsize::new(0));
        orchestrator.register(Arc::new(FlakyTransport {
            name: "a".into(),
            fail_start: true,
            starts: Arc::clone(&starts),
        }));
        orchestrator.register(Arc::new(FlakyTransport {
            name: "b".into(),
            fail_start: false,
            starts: Arc::clone(&starts),
        }));
        let err = orchestrator.start_all(noop_dispatch()).await.unwrap_err();
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        match err {
            CoreError::Transport(msg) => assert_eq!(msg, "Failed to start 1 of 2 transports"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
