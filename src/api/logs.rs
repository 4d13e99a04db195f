use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::auth::{ApiKey, ServerClaims};
use crate::api::{ApiError, ApiState};
use crate::store::{LogFilter, LogSpec};

/// POST /api/logs. The entry is attributed to the job id in the bearer
/// token, never to whatever the body claims.
pub async fn append(
    claims: ServerClaims,
    State(state): State<ApiState>,
    Json(mut spec): Json<LogSpec>,
) -> Result<Json<Value>, ApiError> {
    spec.server_id = Some(claims.job_id);
    let entry = state.logs.write().await.append(spec)?;

    Ok(Json(json!({ "success": true, "log": entry })))
}

#[derive(Deserialize)]
pub struct LogQuery {
    limit: Option<usize>,
    #[serde(rename = "type")]
    kind: Option<String>,
    server_id: Option<String>,
    /// Unix milliseconds; entries at or after this instant.
    since: Option<i64>,
}

/// GET /api/logs.
pub async fn query(
    _key: ApiKey,
    State(state): State<ApiState>,
    Query(params): Query<LogQuery>,
) -> Json<Value> {
    let mut filter = LogFilter::default();
    if let Some(kind) = params.kind {
        filter = filter.kind(kind);
    }
    if let Some(server_id) = params.server_id {
        filter = filter.server_id(server_id);
    }
    if let Some(since) = params.since.and_then(DateTime::from_timestamp_millis) {
        filter = filter.since(since);
    }
    if let Some(limit) = params.limit {
        filter = filter.limit(limit);
    }

    let logs = state.logs.read().await.query(&filter);
    Json(json!({
        "success": true,
        "count": logs.len(),
        "logs": logs,
    }))
}

#[derive(Deserialize)]
pub struct CleanupRequest {
    days: Option<i64>,
}

/// DELETE /api/logs/cleanup. Prunes entries older than the requested
/// number of days, default seven.
pub async fn cleanup(
    _key: ApiKey,
    State(state): State<ApiState>,
    body: Option<Json<CleanupRequest>>,
) -> Json<Value> {
    let days = body.and_then(|Json(req)| req.days).unwrap_or(7);
    let mut logs = state.logs.write().await;
    let deleted = logs.prune_older_than(Duration::days(days));
    tracing::info!(deleted, days, "log cleanup");

    Json(json!({
        "success": true,
        "deleted": deleted,
        "remaining": logs.len(),
    }))
}
