//! HTTP dev harness that plays the platform's part.
//!
//! Each `/api/*` route dispatches one worker event. Any other GET is served
//! through the worker's fetch handler, so the app shell can be loaded
//! through the harness and keeps working when the origin is down.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::clients::{ClientCall, MemoryClients, WindowClient};
use crate::click::NotificationClick;
use crate::error::Error;
use crate::http::Request;
use crate::notification::MemoryNotifier;
use crate::worker::ServiceWorker;

/// Headers that describe the original connection rather than the content.
const HOP_BY_HOP: &[&str] = &["connection", "content-length", "transfer-encoding", "keep-alive"];

/// Shared state for the harness routes.
#[derive(Clone)]
pub struct ApiState {
    pub worker: Arc<ServiceWorker>,
    pub notifier: Arc<MemoryNotifier>,
    pub clients: Arc<MemoryClients>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct InstallResponse {
    assets: usize,
}

#[derive(Serialize)]
struct ActivateResponse {
    deleted: Vec<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    recognized: bool,
}

#[derive(Serialize)]
struct WindowsResponse {
    windows: Vec<WindowClient>,
    calls: Vec<ClientCall>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A worker error rendered as a JSON response.
struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::InvalidState { .. } => StatusCode::CONFLICT,
            Error::Http(_) | Error::AssetFetch { .. } | Error::Io(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

async fn api_health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn api_state(State(state): State<ApiState>) -> impl IntoResponse {
    axum::Json(state.worker.status())
}

async fn api_install(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let assets = state.worker.install().await?;
    Ok(axum::Json(InstallResponse { assets }))
}

async fn api_activate(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.worker.activate().await?;
    Ok(axum::Json(ActivateResponse { deleted }))
}

async fn api_push(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let data = (!body.is_empty()).then_some(body.as_ref());
    axum::Json(state.worker.push(data).await)
}

async fn api_notification_click(
    State(state): State<ApiState>,
    axum::Json(click): axum::Json<NotificationClick>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.worker.notification_click(&click).await?;
    Ok(axum::Json(outcome))
}

async fn api_message(
    State(state): State<ApiState>,
    axum::Json(value): axum::Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.worker.message(&value).await?;
    Ok(axum::Json(MessageResponse {
        recognized: message.is_some(),
    }))
}

async fn api_notifications(State(state): State<ApiState>) -> impl IntoResponse {
    axum::Json(state.notifier.displayed())
}

async fn api_windows(State(state): State<ApiState>) -> impl IntoResponse {
    axum::Json(WindowsResponse {
        windows: state.clients.windows(),
        calls: state.clients.calls(),
    })
}

/// Serves any other request through the worker's fetch handler.
async fn proxy(
    State(state): State<ApiState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, ApiError> {
    let url = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);
    let mut request = Request::new(method, url);
    if !body.is_empty() {
        request = request.with_body(body);
    }

    let response = state.worker.fetch(&request).await?;

    let mut builder = axum::http::Response::builder().status(response.status);
    for (name, value) in &response.headers {
        if !HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            builder = builder.header(name, value);
        }
    }
    Ok(builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| {
            log::error!("Could not relay response for {}: {e}", request.url);
            StatusCode::BAD_GATEWAY.into_response()
        }))
}

/// Builds the harness router.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/state", get(api_state))
        .route("/api/install", post(api_install))
        .route("/api/activate", post(api_activate))
        .route("/api/push", post(api_push))
        .route("/api/notificationclick", post(api_notification_click))
        .route("/api/message", post(api_message))
        .route("/api/notifications", get(api_notifications))
        .route("/api/windows", get(api_windows))
        .fallback(proxy)
        .layer(cors)
        .with_state(state)
}

/// Starts the harness and serves until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the server cannot bind to the specified address.
pub async fn run_api_server(
    state: ApiState,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Harness listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}
