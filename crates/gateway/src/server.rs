//! Axum-based HTTP server for the classification gateway.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use civiscan_core::{Error, Result};

use crate::classifier::ClassificationGateway;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Enable CORS.
    pub enable_cors: bool,
    /// Enable request tracing.
    pub enable_tracing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            enable_tracing: true,
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// The classification gateway.
    pub gateway: ClassificationGateway,
}

/// Gateway HTTP server.
pub struct GatewayServer {
    config: ServerConfig,
    state: Arc<AppState>,
    metrics: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a new server around a gateway.
    pub fn new(config: ServerConfig, gateway: ClassificationGateway) -> Self {
        Self {
            config,
            state: Arc::new(AppState { gateway }),
            metrics: None,
        }
    }

    /// Expose Prometheus metrics at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the router. Exposed separately so tests can drive it without
    /// binding a socket.
    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/v1/classify/text", post(classify_text_handler))
            .route("/v1/classify/image", post(classify_image_handler));

        if let Some(handle) = self.metrics.clone() {
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        let mut router = router.with_state(self.state.clone());

        if self.config.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }
        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::internal(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(addr = %addr, "Gateway listening");

        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| Error::internal(format!("server error: {e}")))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct ClassifyTextRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ClassifyImageRequest {
    image_base64: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Classify a free-text issue description.
///
/// Provider failures never surface as 5xx here: the gateway contract means
/// every decodable request answers 200 with a well-formed result.
async fn classify_text_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClassifyTextRequest>,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, chars = body.text.len(), "Text classification request");

    let result = state.gateway.classify_text(&body.text, None).await;
    Json(result)
}

/// Classify a base64-encoded photo.
async fn classify_image_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClassifyImageRequest>,
) -> Response {
    let request_id = Uuid::new_v4();

    let bytes = match base64::engine::general_purpose::STANDARD.decode(&body.image_base64) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(%request_id, "Image request with undecodable base64 body");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("invalid base64 image: {e}"),
                }),
            )
                .into_response();
        }
    };

    tracing::info!(
        %request_id,
        size = bytes.len(),
        mime = %body.mime_type,
        "Image classification request"
    );

    let result = state
        .gateway
        .classify_image(bytes.into(), &body.mime_type, None)
        .await;
    Json(result).into_response()
}
