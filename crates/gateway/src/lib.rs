//! HTTP gateway for NEXUS.
//!
//! Routes:
//! - `GET  /health`              liveness + whether a provider credential is set
//! - `POST /chat`, `/api/chat`   chat completion with knowledge context
//! - `GET  /knowledge/status`    mirror location and last sync outcome
//! - `POST /knowledge/sync`      trigger a mirror sync
//! - `POST /dev/create-file`     write a file into the workspace
//! - `GET  /dev/list-files`      list a workspace directory
//!
//! Built on Axum. Chat requests always answer 200 with a `reply`; failures
//! are reported in-band through an `error` object.

pub mod knowledge;
pub mod workspace;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::{
    Router,
    extract::State,
    response::Json,
    routing::{get, post},
};
use nexus_agent::{ChatPipeline, ChatRequest, CompletionForwarder, PromptComposer};
use nexus_config::{AppConfig, GatewayConfig};
use nexus_core::error::ProviderError;
use nexus_core::provider::Provider;
use nexus_knowledge::{ContextExtractor, KnowledgeMirror};
use nexus_providers::OpenAiCompatProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use workspace::{Workspace, WorkspaceError};

/// Shared application state, built once at startup.
pub struct AppState {
    pub pipeline: ChatPipeline,
    pub mirror: Arc<KnowledgeMirror>,
    pub workspace: Workspace,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the state with the HTTP provider described by `[provider]`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);
        Ok(Self::with_provider(config, provider))
    }

    /// Build the state around an already constructed provider.
    pub fn with_provider(config: &AppConfig, provider: Arc<dyn Provider>) -> Self {
        let mirror = Arc::new(KnowledgeMirror::from_config(&config.knowledge));
        let extractor = ContextExtractor::for_mirror(
            &mirror,
            config.knowledge.context_file.clone(),
            config.knowledge.max_context_chars,
        );
        let pipeline = ChatPipeline::new(
            extractor,
            PromptComposer::from_config(&config.persona),
            CompletionForwarder::from_config(provider, &config.provider),
            config.default_model.clone(),
        );

        Self {
            pipeline,
            mirror,
            workspace: Workspace::new(&config.workspace_dir),
        }
    }
}

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/api/chat", post(chat_handler))
        .route("/knowledge/status", get(knowledge::status_handler))
        .route("/knowledge/sync", post(knowledge::sync_handler))
        .route("/dev/create-file", post(create_file_handler))
        .route("/dev/list-files", get(list_files_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(cors_layer(&gateway.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Performs one best-effort knowledge sync before binding; a failed sync
/// leaves the previous mirror (or none) in place and serving continues.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = Arc::new(AppState::from_config(&config)?);

    if !state.pipeline.forwarder().is_configured() {
        warn!("No provider API key configured; chat requests will be answered with a configuration error");
    }

    if let Err(e) = tokio::fs::create_dir_all(state.workspace.root()).await {
        warn!(path = %state.workspace.root().display(), error = %e, "Could not create workspace directory");
    }

    if state.mirror.sync().await.is_err() {
        info!(mirror = %state.mirror.path().display(), "Serving with the existing knowledge mirror");
    }

    if config.knowledge.sync_interval_secs > 0 {
        knowledge::spawn_refresh(
            state.mirror.clone(),
            Duration::from_secs(config.knowledge.sync_interval_secs),
        );
    }

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, model = %config.default_model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

/// Failure details carried in-band by JSON responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    provider_configured: bool,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider_configured: state.pipeline.forwarder().is_configured(),
    })
}

/// Kind reported when the chat body cannot be decoded.
pub const INVALID_REQUEST_KIND: &str = "invalid_request";

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let message = rejection.body_text();
            warn!(status = rejection.status().as_u16(), error = %message, "Malformed chat request");
            return Json(ChatResponse {
                reply: format!("Invalid chat request: {message}"),
                error: Some(ErrorBody {
                    kind: INVALID_REQUEST_KIND.to_string(),
                    message,
                }),
            });
        }
    };

    let outcome = state.pipeline.handle(request).await;
    let error = outcome.result.as_ref().err().map(|e| ErrorBody {
        kind: e.kind().as_str().to_string(),
        message: e.to_string(),
    });

    Json(ChatResponse {
        reply: outcome.reply_text(),
        error,
    })
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn workspace_error(e: WorkspaceError) -> ApiError {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    warn!(error = %e, status = status.as_u16(), "Workspace request rejected");
    (status, Json(ErrorResponse { error: e.to_string() }))
}

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFileResponse {
    pub status: String,
    pub path: String,
}

async fn create_file_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CreateFileRequest>,
) -> Result<Json<CreateFileResponse>, ApiError> {
    let written = state
        .workspace
        .create_file(&payload.path, &payload.content)
        .await
        .map_err(workspace_error)?;

    info!(path = %written.display(), "Workspace file created");
    Ok(Json(CreateFileResponse {
        status: "created".into(),
        path: written.display().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct ListFilesQuery {
    #[serde(default = "default_list_path")]
    path: String,
}

fn default_list_path() -> String {
    ".".into()
}

async fn list_files_handler(
    State(state): State<SharedState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = state
        .workspace
        .list(&query.path)
        .await
        .map_err(workspace_error)?;
    debug!(path = %query.path, entries = names.len(), "Workspace listing");
    Ok(Json(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use nexus_core::message::ChatMessage;
    use nexus_core::provider::{ProviderRequest, ProviderResponse, Usage};
    use tower::ServiceExt;

    /// Lightweight mock provider for gateway tests.
    struct MockProvider {
        response_text: String,
        configured: bool,
    }

    impl MockProvider {
        fn new(text: &str) -> Self {
            Self {
                response_text: text.to_string(),
                configured: true,
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: ChatMessage::assistant(&self.response_text),
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: request.model,
            })
        }
    }

    struct TestGateway {
        app: Router,
        _tmp: tempfile::TempDir,
        workspace: std::path::PathBuf,
    }

    fn test_gateway(provider: MockProvider) -> TestGateway {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace_dir = tmp.path().join("workspace");
        config.knowledge.dir = tmp.path().join("kit");
        std::fs::create_dir_all(&config.workspace_dir).unwrap();

        let state = Arc::new(AppState::with_provider(&config, Arc::new(provider)));
        TestGateway {
            app: build_router(state, &config.gateway),
            workspace: config.workspace_dir.clone(),
            _tmp: tmp,
        }
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let gw = test_gateway(MockProvider::new("unused"));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = gw.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["provider_configured"], true);
    }

    #[tokio::test]
    async fn chat_returns_reply() {
        let gw = test_gateway(MockProvider::new("Hello!"));

        let response = gw
            .app
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: ChatResponse = body_json(response).await;
        assert_eq!(json.reply, "Hello!");
        assert!(json.error.is_none());
    }

    #[tokio::test]
    async fn malformed_chat_body_still_gets_a_reply() {
        let gw = test_gateway(MockProvider::new("unused"));

        let response = gw
            .app
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"messages": [{"role": "tool", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: ChatResponse = body_json(response).await;
        assert!(json.reply.starts_with("Invalid chat request"));
        assert_eq!(json.error.unwrap().kind, INVALID_REQUEST_KIND);
    }

    #[tokio::test]
    async fn api_chat_alias_is_served() {
        let gw = test_gateway(MockProvider::new("Hello!"));

        let response = gw
            .app
            .oneshot(json_post("/api/chat", serde_json::json!({"messages": []})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: ChatResponse = body_json(response).await;
        assert_eq!(json.reply, "Hello!");
    }

    #[tokio::test]
    async fn chat_without_credential_reports_configuration_error() {
        let gw = test_gateway(MockProvider {
            configured: false,
            ..MockProvider::new("unused")
        });

        let response = gw
            .app
            .oneshot(json_post(
                "/chat",
                serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: ChatResponse = body_json(response).await;
        assert_eq!(json.reply, nexus_agent::MISSING_CREDENTIAL_MESSAGE);
        assert_eq!(json.error.unwrap().kind, "configuration_error");
    }

    #[tokio::test]
    async fn create_file_then_list() {
        let gw = test_gateway(MockProvider::new("unused"));

        let response = gw
            .app
            .clone()
            .oneshot(json_post(
                "/dev/create-file",
                serde_json::json!({"path": "app/main.py", "content": "print('hi')"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created: CreateFileResponse = body_json(response).await;
        assert_eq!(created.status, "created");
        assert!(created.path.ends_with("main.py"));
        assert_eq!(
            std::fs::read_to_string(gw.workspace.join("app/main.py")).unwrap(),
            "print('hi')"
        );

        let req = Request::builder()
            .uri("/dev/list-files?path=app")
            .body(Body::empty())
            .unwrap();
        let response = gw.app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let names: Vec<String> = body_json(response).await;
        assert_eq!(names, vec!["main.py"]);
    }

    #[tokio::test]
    async fn list_missing_directory_is_empty() {
        let gw = test_gateway(MockProvider::new("unused"));

        let req = Request::builder()
            .uri("/dev/list-files?path=does-not-exist")
            .body(Body::empty())
            .unwrap();
        let response = gw.app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let names: Vec<String> = body_json(response).await;
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn list_defaults_to_workspace_root() {
        let gw = test_gateway(MockProvider::new("unused"));
        std::fs::write(gw.workspace.join("README.md"), "").unwrap();

        let req = Request::builder()
            .uri("/dev/list-files")
            .body(Body::empty())
            .unwrap();
        let response = gw.app.oneshot(req).await.unwrap();

        let names: Vec<String> = body_json(response).await;
        assert_eq!(names, vec!["README.md"]);
    }

    #[tokio::test]
    async fn create_file_rejects_traversal() {
        let gw = test_gateway(MockProvider::new("unused"));

        let response = gw
            .app
            .oneshot(json_post(
                "/dev/create-file",
                serde_json::json!({"path": "../escape.txt", "content": "x"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn knowledge_status_before_any_sync() {
        let gw = test_gateway(MockProvider::new("unused"));

        let req = Request::builder()
            .uri("/knowledge/status")
            .body(Body::empty())
            .unwrap();
        let response = gw.app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = body_json(response).await;
        assert_eq!(json["present"], false);
        assert_eq!(json["context_file_present"], false);
        assert_eq!(json["last_sync"]["state"], "never_synced");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.workspace_dir = tmp.path().join("workspace");
        config.knowledge.dir = tmp.path().join("kit");
        config.gateway.max_body_bytes = 64;
        let state = Arc::new(AppState::with_provider(
            &config,
            Arc::new(MockProvider::new("unused")),
        ));
        let app = build_router(state, &config.gateway);

        let content = "x".repeat(1024);
        let response = app
            .oneshot(json_post(
                "/dev/create-file",
                serde_json::json!({"path": "big.txt", "content": content}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
