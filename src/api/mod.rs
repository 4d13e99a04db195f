//! HTTP surface: operator routes under `/api`, server enrollment under
//! `/auth`, and a handful of unauthenticated system routes at the root.

pub mod auth;
pub mod commands;
pub mod logs;
pub mod ratelimit;
pub mod servers;
pub mod system;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::WardenError;
use crate::store::{CommandQueue, LogSpec, LogStore, ServerRegistry};

use self::auth::TokenIssuer;
use self::ratelimit::RateLimiter;

/// Shared handles threaded through every handler.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub queue: Arc<RwLock<CommandQueue>>,
    pub registry: Arc<RwLock<ServerRegistry>>,
    pub logs: Arc<RwLock<LogStore>>,
    pub tokens: Arc<TokenIssuer>,
    pub limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

/// Error shape every route responds with: a status code plus a
/// `{"success": false, "error": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<WardenError> for ApiError {
    fn from(err: WardenError) -> Self {
        match err {
            WardenError::InvalidCommand(_) | WardenError::InvalidLog(_) => {
                Self::bad_request(err.to_string())
            }
            _ => {
                tracing::error!(%err, "request failed");
                Self::internal(err.to_string())
            }
        }
    }
}

/// Builds the full application router.
pub fn router(state: ApiState) -> Router {
    let api = Router::new()
        .route(
            "/api/commands",
            get(commands::pending).post(commands::create),
        )
        .route("/api/commands/batch", post(commands::create_batch))
        .route("/api/commands/stats", get(commands::stats))
        .route("/api/results", post(commands::report))
        .route("/api/heartbeat", post(servers::heartbeat))
        .route("/api/logs", get(logs::query).post(logs::append))
        .route("/api/logs/cleanup", delete(logs::cleanup))
        .route("/auth/connect", post(servers::connect))
        .route("/auth/disconnect", post(servers::disconnect))
        .route("/auth/servers", get(servers::list))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .route("/panel", get(system::panel))
        .route("/stats", get(system::stats))
        .route("/cleanup", post(system::cleanup))
        .merge(api)
        .fallback(system::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), request_log))
        .layer(cors_layer(&state.config))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

/// Binds the listener and serves until the token is cancelled.
pub async fn serve(state: ApiState, shutdown: CancellationToken) -> Result<(), WardenError> {
    let addr = state.config.listen_addr;
    let app = router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await?;

    Ok(())
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn rate_limit(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_key(&request);
    if !state.limiter.try_acquire(&key).await {
        return Err(ApiError::too_many_requests(
            "too many requests, try again later",
        ));
    }
    Ok(next.run(request).await)
}

/// Emits a tracing line and an `api_request` log entry for every request
/// except the high-frequency probe paths.
async fn request_log(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !matches!(path.as_str(), "/" | "/health" | "/favicon.ico") {
        let method = request.method().to_string();
        let client = client_key(&request);
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string();

        tracing::info!(method = %method, path = %path, client = %client, "request");

        let mut data = Map::new();
        data.insert("method".to_string(), Value::String(method.clone()));
        data.insert("path".to_string(), Value::String(path.clone()));
        data.insert("ip".to_string(), Value::String(client));
        data.insert("user_agent".to_string(), Value::String(user_agent));

        let spec = LogSpec::new("api_request", format!("{method} {path}")).with_data(data);
        if let Err(error) = state.logs.write().await.append(spec) {
            tracing::warn!(%error, "request log entry dropped");
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'",
        ),
    );
    response
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}
