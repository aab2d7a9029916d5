//! Onion-style middleware composition (`spec.md` §4.6).
//!
//! Generalizes the teacher's Tower `ServiceBuilder` layering
//! (`turbomcp-server::middleware::mod`) to the spec's explicit
//! `(ctx, next)`-with-optional-call contract, using the same `Next`
//! continuation shape as `axum::middleware::from_fn` (the teacher
//! depends on axum for its HTTP transport): each middleware receives a
//! `Next` it may or may not invoke, rather than Tower's compile-time
//! service stacking which cannot skip constructing the inner service
//! at call time in the general case this spec requires.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;

/// A single middleware segment in the onion.
///
/// Calling `next.run(ctx).await` advances to the next segment (or the
/// core handler, if this is the last middleware). Omitting that call
/// short-circuits: no later middleware and no core handler runs, but
/// this middleware's own code after the (omitted) call still does not
/// run either, since it was never reached.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle `ctx`, optionally delegating to `next`.
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>);

    /// A short name for diagnostics (defaults to the Rust type name).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The core routing function at the center of the onion
/// (`spec.md` §4.7). Implemented as a trait rather than a bare
/// closure type so it can be stored behind a `dyn` reference without
/// the higher-ranked lifetime bound a `Fn(&mut T) -> BoxFuture<'_, _>`
/// closure type would otherwise require.
#[async_trait]
pub trait CoreHandler: Send + Sync {
    /// Route `ctx`, setting `ctx.response` if a reply is due.
    async fn call(&self, ctx: &mut RequestContext);
}

#[async_trait]
impl<F> CoreHandler for F
where
    F: for<'a> Fn(&'a mut RequestContext) -> futures::future::BoxFuture<'a, ()> + Send + Sync,
{
    async fn call(&self, ctx: &mut RequestContext) {
        (self)(ctx).await
    }
}

/// The remaining middleware chain plus the core handler it eventually
/// bottoms out at. Threaded through each [`Middleware::handle`] call.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
    core: &'a dyn CoreHandler,
}

impl<'a> Next<'a> {
    fn new(remaining: &'a [Arc<dyn Middleware>], core: &'a dyn CoreHandler) -> Self {
        Self { remaining, core }
    }

    /// Advance to the next middleware segment, or the core handler if
    /// this was the last one in the chain.
    pub async fn run(self, ctx: &mut RequestContext) {
        match self.remaining.split_first() {
            Some((mw, rest)) => {
                let next = Next::new(rest, self.core);
                mw.handle(ctx, next).await;
            }
            None => self.core.call(ctx).await,
        }
    }
}

/// Composes a registered list of middleware into a single onion-callable
/// unit (`spec.md` §4.6's `applyMiddleware`).
///
/// Registration order is preserved: later `use_middleware` calls
/// append and therefore run closer to the core handler.
#[derive(Default)]
pub struct MiddlewareEngine {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareEngine {
    /// An empty engine — the core handler runs directly.
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware to the end of the chain.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// The number of registered middleware segments.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// True iff no middleware is registered.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the full onion around `core` for a single request.
    pub async fn run(&self, ctx: &mut RequestContext, core: &dyn CoreHandler) {
        let next = Next::new(&self.middlewares, core);
        next.run(ctx).await;
    }
}

/// Traces request entry/exit at `debug` level (`spec.md` §4.6's reference
/// stack), grounded in the teacher's audit middleware.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
        let method = ctx.request.method().unwrap_or("<response>").to_string();
        tracing::debug!(method = %method, "request received");
        next.run(ctx).await;
        tracing::debug!(method = %method, responded = ctx.response.is_some(), "request handled");
    }
}

/// Converts an escaping [`crate::error::CoreError`] surfaced via
/// `ctx.state["__error"]` into a `-32000` JSON-RPC error envelope
/// (`spec.md` §7). Registered as the outermost reference middleware so
/// every inner layer's errors are caught.
#[derive(Debug, Default)]
pub struct ErrorMapperMiddleware;

#[async_trait]
impl Middleware for ErrorMapperMiddleware {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
        next.run(ctx).await;
        if ctx.response.is_none() {
            if let Some(message) = ctx
                .state
                .get("__error")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
            {
                let id = ctx.request.id().cloned();
                let error = crate::error::CoreError::Internal(message).into_json_rpc_error();
                ctx.response = Some(mcpkit_protocol::JsonRpcMessage::error(id, error));
            }
        }
    }
}

/// Stamps an advisory execution timeout onto the context before
/// delegating (`spec.md` §5: cancellation/timeouts are advisory, not
/// enforced by the core).
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    /// The advisory timeout to stamp, if `ctx.execution` is set downstream.
    pub timeout: std::time::Duration,
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
        ctx.set_state(
            "__advisory_timeout_ms",
            serde_json::json!(self.timeout.as_millis() as u64),
        );
        next.run(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_protocol::JsonRpcMessage;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn noop_request() -> RequestContext {
        RequestContext::detached(
            JsonRpcMessage::Notification {
                method: "ping".into(),
                params: None,
            },
            "test",
        )
    }

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        call_next: bool,
    }

    #[async_trait]
    impl Middleware for Recording {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
            self.log.lock().push(format!("{}-enter", self.name));
            if self.call_next {
                next.run(ctx).await;
            }
            self.log.lock().push(format!("{}-exit", self.name));
        }
    }

    struct RecordingCore(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl CoreHandler for RecordingCore {
        async fn call(&self, _ctx: &mut RequestContext) {
            self.0.lock().push("core".to_string());
        }
    }

    #[tokio::test]
    async fn onion_ordering_matches_spec_scenario_4() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MiddlewareEngine::new();
        for name in ["A", "B", "C"] {
            engine.use_middleware(Arc::new(Recording {
                name,
                log: Arc::clone(&log),
                call_next: true,
            }));
        }
        let core = RecordingCore(Arc::clone(&log));
        let mut ctx = noop_request();
        engine.run(&mut ctx, &core).await;

        assert_eq!(
            *log.lock(),
            vec![
                "A-enter", "B-enter", "C-enter", "core", "C-exit", "B-exit", "A-exit"
            ]
        );
    }

    #[tokio::test]
    async fn middleware_omitting_next_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MiddlewareEngine::new();
        engine.use_middleware(Arc::new(Recording {
            name: "A",
            log: Arc::clone(&log),
            call_next: true,
        }));
        engine.use_middleware(Arc::new(Recording {
            name: "B",
            log: Arc::clone(&log),
            call_next: false,
        }));
        engine.use_middleware(Arc::new(Recording {
            name: "C",
            log: Arc::clone(&log),
            call_next: true,
        }));
        let core = RecordingCore(Arc::clone(&log));
        let mut ctx = noop_request();
        engine.run(&mut ctx, &core).await;

        assert_eq!(*log.lock(), vec!["A-enter", "B-enter", "B-exit", "A-exit"]);
    }

    #[tokio::test]
    async fn error_mapper_converts_state_error_into_envelope() {
        struct Failing;
        #[async_trait]
        impl Middleware for Failing {
            async fn handle(&self, ctx: &mut RequestContext, _next: Next<'_>) {
                ctx.set_state("__error", serde_json::json!("boom"));
            }
        }

        let mut engine = MiddlewareEngine::new();
        engine.use_middleware(Arc::new(ErrorMapperMiddleware));
        engine.use_middleware(Arc::new(Failing));
        let core = RecordingCore(Arc::new(Mutex::new(Vec::new())));
        let mut ctx = noop_request();
        engine.run(&mut ctx, &core).await;

        let response = ctx.response.expect("error mapper should set a response");
        match response {
            mcpkit_protocol::JsonRpcMessage::Response {
                outcome: mcpkit_protocol::JsonRpcOutcome::Error(err),
                ..
            } => assert_eq!(err.message, "Internal error: boom"),
            other => panic!("expected error response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_middleware_stamps_state_and_delegates() {
        let mut engine = MiddlewareEngine::new();
        engine.use_middleware(Arc::new(TimeoutMiddleware {
            timeout: std::time::Duration::from_millis(500),
        }));
        let log = Arc::new(Mutex::new(Vec::new()));
        let core = RecordingCore(Arc::clone(&log));
        let mut ctx = noop_request();
        engine.run(&mut ctx, &core).await;

        assert_eq!(*log.lock(), vec!["core"]);
        assert_eq!(
            ctx.get_state("__advisory_timeout_ms").and_then(|v| v.as_u64()),
            Some(500)
        );
    }
}
