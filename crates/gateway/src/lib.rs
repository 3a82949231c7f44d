//! HTTP gateway for Deckr.
//!
//! Routes:
//! - `POST /api/chat`: run one request, streamed as server-sent events
//! - `GET /api/tools`: the tool catalog the model sees
//! - `GET /health`: liveness probe
//!
//! A chat stream carries every agent event as `event: <type>`, followed by
//! one final `complete` event (the run outcome) or `error` event (the run
//! failure).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use deckr_agent::{
    AgentStreamEvent, ChannelObserver, ExecutionLoop, ResponseFormat, RunRequest,
    SideChannelContext,
};
use deckr_core::message::Message;
use deckr_core::provider::ToolDefinition;

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Origin of the Deckr web app during local development.
const DEV_ORIGIN: &str = "http://localhost:3000";

/// Shared application state.
pub struct GatewayState {
    pub agent: Arc<ExecutionLoop>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with every gateway route and layer.
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(HeaderValue::from_static(DEV_ORIGIN)))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/tools", get(tools_handler))
        .route("/api/chat", post(chat_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start(config: deckr_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = deckr_providers::build_from_config(&config)?;
    let registry = Arc::new(deckr_tools::default_registry()?);
    let agent = Arc::new(ExecutionLoop::from_config(&config, provider, registry));
    let app = build_router(Arc::new(GatewayState { agent }));

    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<ToolDefinition>,
    count: usize,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolsResponse> {
    let tools = state.agent.registry().list();
    Json(ToolsResponse {
        count: tools.len(),
        tools,
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<Message>,
    #[serde(default)]
    pub context: SideChannelContext,
    #[serde(default)]
    pub response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct InternalFailure {
    kind: &'static str,
    message: String,
    retryable: bool,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// `POST /api/chat`
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "message must not be empty".into(),
            }),
        ));
    }

    info!(
        message_len = payload.message.len(),
        history = payload.conversation_history.len(),
        notes = payload.context.notes.len(),
        "Chat request"
    );

    let request = RunRequest::new(payload.message)
        .with_history(payload.conversation_history)
        .with_context(payload.context)
        .with_response_format(payload.response_format);

    let (tx, rx) = mpsc::unbounded_channel();
    let agent = state.agent.clone();
    let run = AbortOnDrop(tokio::spawn(async move {
        agent.run(request, ChannelObserver::new(tx)).await
    }));

    // The run's own `error` event is superseded by the full failure below.
    let events = UnboundedReceiverStream::new(rx)
        .filter(|event| !matches!(event, AgentStreamEvent::Error { .. }))
        .map(|event| sse_event(event.event_type(), &event));

    let verdict = futures::stream::once(async move {
        let mut run = run;
        match (&mut run.0).await {
            Ok(Ok(outcome)) => sse_event("complete", &outcome),
            Ok(Err(failure)) => sse_event("error", &failure),
            Err(join_err) => {
                error!(error = %join_err, "Agent task failed");
                sse_event(
                    "error",
                    &InternalFailure {
                        kind: "internal",
                        message: join_err.to_string(),
                        retryable: true,
                    },
                )
            }
        }
    });

    Ok(Sse::new(events.chain(verdict)).keep_alive(KeepAlive::default()))
}

/// Aborts the run when the stream is dropped (client went away). Dropping
/// the run future drops its tool `JoinSet`, which aborts in-flight tools.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn sse_event<T: Serialize>(name: &str, payload: &T) -> Result<Event, Infallible> {
    Ok(Event::default().event(name).data(event_data(name, payload)))
}

/// JSON body of one stream event. A payload that cannot be serialized is
/// logged and replaced by an error object, never sent as an empty frame.
fn event_data<T: Serialize>(name: &str, payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|e| {
        error!(event = name, error = %e, "Failed to serialize stream event");
        serde_json::json!({ "error": format!("failed to serialize {name} event") }).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use deckr_core::error::ProviderError;
    use deckr_core::provider::{ModelRequest, ModelResponse, Provider};
    use deckr_core::tool::ToolRegistry;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tower::ServiceExt;

    /// Answers every call with the next scripted result.
    struct MockProvider {
        script: Mutex<Vec<Result<Message, ProviderError>>>,
        seen: Mutex<Vec<ModelRequest>>,
    }

    impl MockProvider {
        fn new(mut script: Vec<Result<Message, ProviderError>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ProviderError::InvalidRequest("script exhausted".into())));
            next.map(|message| ModelResponse {
                message,
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    fn app_with(provider: Arc<MockProvider>) -> Router {
        let registry = Arc::new(deckr_tools::default_registry().unwrap());
        let agent = ExecutionLoop::new(provider, "mock-model", registry)
            .with_retry_policy(deckr_providers::RetryPolicy::no_retry());
        build_router(Arc::new(GatewayState {
            agent: Arc::new(agent),
        }))
    }

    fn chat(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn event_names(body: &str) -> Vec<&str> {
        body.lines()
            .filter_map(|l| l.strip_prefix("event: "))
            .collect()
    }

    #[test]
    fn unserializable_payload_becomes_error_object() {
        // JSON object keys must be strings.
        let mut bad = std::collections::HashMap::new();
        bad.insert((1u8, 2u8), "x");

        let data = event_data("complete", &bad);
        let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(parsed["error"], "failed to serialize complete event");

        assert_eq!(event_data("step", &serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = app_with(MockProvider::new(vec![]));
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"ok\""));
    }

    #[tokio::test]
    async fn tools_endpoint_lists_registry() {
        let app = app_with(MockProvider::new(vec![]));
        let req = Request::builder()
            .uri("/api/tools")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["count"], 4);
        let names: Vec<_> = json["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"fetch_logo".to_string()));
    }

    #[tokio::test]
    async fn chat_streams_steps_then_complete() {
        let provider = MockProvider::new(vec![
            Ok(Message {
                role: deckr_core::message::Role::Model,
                blocks: vec![deckr_core::message::ContentBlock::ToolInvocation {
                    id: "call_0".into(),
                    name: "research_company".into(),
                    arguments: serde_json::json!({"company": "Acme Corp"}),
                    continuation: None,
                }],
            }),
            Ok(Message::model_text("Acme Corp makes anvils.")),
        ]);
        let app = app_with(provider.clone());

        let response = app
            .oneshot(chat(serde_json::json!({
                "message": "research Acme Corp",
                "context": {"notes": ["deck: Q3 pitch"]}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        let names = event_names(&body);
        assert!(names.contains(&"step_started"));
        assert!(names.contains(&"step_completed"));
        let done = names.iter().position(|n| *n == "done").unwrap();
        assert_eq!(names.last(), Some(&"complete"));
        assert_eq!(done, names.len() - 2);
        assert!(body.contains("Acme Corp makes anvils."));

        let first = provider.seen.lock().unwrap()[0].clone();
        assert_eq!(first.messages.len(), 1);
        assert_eq!(first.messages[0].blocks.len(), 2);
    }

    #[tokio::test]
    async fn chat_failure_ends_with_single_error_event() {
        let provider = MockProvider::new(vec![Err(ProviderError::AuthenticationFailed(
            "bad key".into(),
        ))]);
        let app = app_with(provider);

        let response = app
            .oneshot(chat(serde_json::json!({"message": "hello"})))
            .await
            .unwrap();
        let body = body_text(response).await;
        let names = event_names(&body);

        assert_eq!(names.iter().filter(|n| **n == "error").count(), 1);
        assert_eq!(names.last(), Some(&"error"));
        assert!(!names.contains(&"complete"));
        assert!(body.contains("\"kind\":\"upstream\""));
        assert!(body.contains("\"retryable\":false"));
    }

    #[tokio::test]
    async fn dropped_stream_aborts_the_run() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let guard = AbortOnDrop(tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await
        }));
        drop(guard);
        // The sender is dropped with the aborted task.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let app = app_with(MockProvider::new(vec![]));
        let response = app
            .oneshot(chat(serde_json::json!({"message": "   "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = app_with(MockProvider::new(vec![]));
        let huge = "x".repeat(MAX_BODY_BYTES + 1);
        let response = app
            .oneshot(chat(serde_json::json!({ "message": huge })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn empty_registry_still_serves_tools() {
        let agent = ExecutionLoop::new(
            MockProvider::new(vec![]),
            "mock-model",
            Arc::new(ToolRegistry::new()),
        );
        let app = build_router(Arc::new(GatewayState {
            agent: Arc::new(agent),
        }));
        let req = Request::builder()
            .uri("/api/tools")
            .body(Body::empty())
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&body_text(app.oneshot(req).await.unwrap()).await).unwrap();
        assert_eq!(json["count"], 0);
    }
}
