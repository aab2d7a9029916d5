//! End-to-end dispatcher scenarios mirroring the concrete test cases.

use std::sync::Arc;

use mcpkit_core::{
    CapabilityRegistry, Dispatcher, LifecycleManager, MiddlewareEngine, Registries,
    RequestContext, RespondFn, ToolDefinition, TransportInfo,
};
use mcpkit_protocol::{JsonRpcMessage, JsonRpcOutcome, RequestId};
use parking_lot::Mutex;

fn build_dispatcher(registries: Arc<Registries>) -> Dispatcher {
    let capabilities = Arc::new(CapabilityRegistry::new());
    capabilities.set_dynamic_source(Arc::clone(&registries) as _);
    let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&capabilities)));
    Dispatcher::new(lifecycle, capabilities, registries, Arc::new(MiddlewareEngine::new()))
}

fn collector() -> (RespondFn, Arc<Mutex<Vec<JsonRpcMessage>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&log);
    let respond: RespondFn = Arc::new(move |msg| captured.lock().push(msg));
    (respond, log)
}

fn request(id: i64, method: &str, params: Option<serde_json::Value>) -> JsonRpcMessage {
    JsonRpcMessage::Request {
        id: RequestId::Number(id),
        method: method.to_string(),
        params,
    }
}

fn init_params() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": "2025-06-18",
        "capabilities": {},
        "clientInfo": {"name": "client", "version": "0.0.0"},
    })
}

#[tokio::test]
async fn scenario_pre_init_tools_list_is_not_initialized() {
    let dispatcher = build_dispatcher(Arc::new(Registries::new()));
    let (respond, log) = collector();
    dispatcher
        .dispatch(
            request(1, "tools/list", Some(serde_json::json!({}))),
            Some(respond),
            TransportInfo { name: "stdio".into() },
        )
        .await;

    let log = log.lock();
    match &log[0] {
        JsonRpcMessage::Response {
            id: Some(RequestId::Number(1)),
            outcome: JsonRpcOutcome::Error(err),
        } => {
            assert_eq!(err.code, -32002);
            assert!(err.message.to_lowercase().contains("not") && err.message.to_lowercase().contains("initialized"));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn scenario_successful_initialize_with_one_tool_registered() {
    let registries = Arc::new(Registries::new());
    registries
        .tools
        .register(ToolDefinition {
            name: "echo".to_string(),
            description: None,
            tags: vec![],
            validator: None,
            params: vec![],
            authorization: Default::default(),
            hooks: Default::default(),
            handler: Arc::new(|args, _ctx| Box::pin(async move { Ok(args.clone()) })),
        })
        .unwrap();

    let dispatcher = build_dispatcher(Arc::clone(&registries));
    let (respond, log) = collector();
    dispatcher
        .dispatch(
            request(1, "initialize", Some(init_params())),
            Some(respond),
            TransportInfo { name: "stdio".into() },
        )
        .await;

    let log = log.lock();
    match &log[0] {
        JsonRpcMessage::Response {
            outcome: JsonRpcOutcome::Result(value),
            ..
        } => {
            assert!(value["capabilities"]["tools"].is_object());
            assert!(value["capabilities"]["experimental"].is_object());
            assert_eq!(value["serverInfo"]["name"], "MCP Server Framework");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn scenario_resource_longest_prefix_routing() {
    use mcpkit_core::{InMemoryResourceProvider, ResourceContent};

    let registries = Arc::new(Registries::new());
    registries
        .resources
        .register(
            "test://",
            Arc::new(InMemoryResourceProvider::new(vec![ResourceContent {
                uri: "test://general/resource".to_string(),
                mime_type: "application/json".to_string(),
                text: "general".to_string(),
            }])),
        )
        .unwrap();
    registries
        .resources
        .register(
            "test://specific/",
            Arc::new(InMemoryResourceProvider::new(vec![ResourceContent {
                uri: "test://specific/resource".to_string(),
                mime_type: "application/json".to_string(),
                text: "specific".to_string(),
            }])),
        )
        .unwrap();

    let dispatcher = build_dispatcher(Arc::clone(&registries));
    let (respond, log) = collector();
    dispatcher
        .dispatch(
            request(1, "initialize", Some(init_params())),
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;
    dispatcher
        .dispatch(
            JsonRpcMessage::Notification {
                method: "notifications/initialized".to_string(),
                params: None,
            },
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;
    dispatcher
        .dispatch(
            request(
                2,
                "resources/read",
                Some(serde_json::json!({"uri": "test://specific/resource"})),
            ),
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;

    let log = log.lock();
    match &log[2] {
        JsonRpcMessage::Response {
            outcome: JsonRpcOutcome::Result(value),
            ..
        } => {
            assert_eq!(value["contents"][0]["text"], "specific");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn scenario_post_shutdown_rejection() {
    let dispatcher = build_dispatcher(Arc::new(Registries::new()));
    let (respond, log) = collector();

    dispatcher
        .dispatch(
            request(1, "initialize", Some(init_params())),
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;
    dispatcher
        .dispatch(
            JsonRpcMessage::Notification {
                method: "notifications/initialized".to_string(),
                params: None,
            },
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;
    dispatcher
        .dispatch(
            request(2, "shutdown", None),
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;
    dispatcher
        .dispatch(
            request(3, "tools/list", Some(serde_json::json!({}))),
            Some(Arc::clone(&respond)),
            TransportInfo { name: "stdio".into() },
        )
        .await;

    let log = log.lock();
    match &log[3] {
        JsonRpcMessage::Response {
            outcome: JsonRpcOutcome::Error(err),
            ..
        } => {
            assert_eq!(err.code, -32003);
            assert!(err.message.to_lowercase().contains("shut down"));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn onion_ordering_through_the_full_dispatcher() {
    use mcpkit_core::{Middleware, Next};

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Middleware for Recording {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) {
            self.log.lock().push(format!("{}-enter", self.name));
            next.run(ctx).await;
            self.log.lock().push(format!("{}-exit", self.name));
        }
    }

    let trace = Arc::new(Mutex::new(Vec::new()));
    let mut engine = MiddlewareEngine::new();
    for name in ["A", "B", "C"] {
        engine.use_middleware(Arc::new(Recording {
            name,
            log: Arc::clone(&trace),
        }));
    }

    let capabilities = Arc::new(CapabilityRegistry::new());
    let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&capabilities)));
    let registries = Arc::new(Registries::new());
    let dispatcher = Dispatcher::new(lifecycle, capabilities, registries, Arc::new(engine));

    let (respond, _log) = collector();
    dispatcher
        .dispatch(
            request(1, "ping", None),
            Some(respond),
            TransportInfo { name: "stdio".into() },
        )
        .await;

    let trace = trace.lock();
    assert_eq!(
        &trace[..6],
        &["A-enter", "B-enter", "C-enter", "C-exit", "B-exit", "A-exit"]
    );
}
