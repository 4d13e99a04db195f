use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::Html;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::api::auth::ApiKey;
use crate::api::{ApiError, ApiState};
use crate::maintenance;
use crate::store::{global_stats, LogSpec};

/// GET /. Route directory plus a coarse status block.
pub async fn index(State(state): State<ApiState>) -> Json<Value> {
    let queue = state.queue.read().await;
    let registry = state.registry.read().await;
    let logs = state.logs.read().await;

    let queue_stats = queue.stats();
    let active = registry.list_active(state.config.active_window).len();

    Json(json!({
        "success": true,
        "message": "warden command relay",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "health": "GET /health",
            "panel": "GET /panel",
            "stats": "GET /stats",
            "cleanup": "POST /cleanup",
            "connect": "POST /auth/connect",
            "disconnect": "POST /auth/disconnect",
            "servers": "GET /auth/servers",
            "commands": "GET|POST /api/commands",
            "batch": "POST /api/commands/batch",
            "command_stats": "GET /api/commands/stats",
            "results": "POST /api/results",
            "heartbeat": "POST /api/heartbeat",
            "logs": "GET|POST /api/logs",
            "log_cleanup": "DELETE /api/logs/cleanup",
        },
        "stats": {
            "servers": { "total": registry.len(), "active": active },
            "commands": {
                "total": queue_stats.total_commands,
                "pending": queue_stats.total_pending,
                "successful": queue_stats.successful_commands,
                "failed": queue_stats.failed_commands,
            },
            "logs": logs.len(),
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        },
    }))
}

/// GET /health. Cheap liveness probe, also consumed by the panel.
pub async fn health(State(state): State<ApiState>) -> Json<Value> {
    let registry = state.registry.read().await;
    let active = registry.list_active(state.config.active_window).len();
    let memory = crate::store::stats::process_memory();

    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().timestamp_millis(),
        "servers": { "total": registry.len(), "active": active },
        "memory": {
            "rss_mb": memory.rss_bytes / (1024 * 1024),
            "virtual_mb": memory.virtual_bytes / (1024 * 1024),
        },
    }))
}

/// GET /panel. The operator panel ships inside the binary.
pub async fn panel() -> Html<&'static str> {
    Html(include_str!("panel.html"))
}

/// GET /stats.
pub async fn stats(State(state): State<ApiState>) -> Json<Value> {
    let queue = state.queue.read().await;
    let registry = state.registry.read().await;
    let logs = state.logs.read().await;

    let stats = global_stats(
        &queue,
        &registry,
        &logs,
        state.config.active_window,
        state.started_at.elapsed(),
    );

    Json(json!({
        "success": true,
        "stats": stats,
        "timestamp": Utc::now().timestamp_millis(),
    }))
}

/// POST /cleanup. Runs the same pass the scheduler runs on its interval.
pub async fn cleanup(_key: ApiKey, State(state): State<ApiState>) -> Json<Value> {
    let report = maintenance::cleanup_pass(&state).await;

    Json(json!({
        "success": true,
        "message": "cleanup finished",
        "deleted": report,
    }))
}

/// Fallback for unmatched routes. Recorded in the log store so misfiring
/// clients show up in the panel.
pub async fn not_found(State(state): State<ApiState>, method: Method, uri: Uri) -> ApiError {
    let path = uri.path().to_string();

    let mut data = Map::new();
    data.insert("method".to_string(), Value::String(method.to_string()));
    data.insert("path".to_string(), Value::String(path.clone()));

    let spec = LogSpec::new("error", format!("404 - {method} {path}")).with_data(data);
    if let Err(error) = state.logs.write().await.append(spec) {
        tracing::warn!(%error, "404 log entry dropped");
    }

    ApiError::not_found(format!("route not found: {path}"))
}
