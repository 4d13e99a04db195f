use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::auth::{ApiKey, ServerClaims};
use crate::api::{ApiError, ApiState};
use crate::store::{ConnectSpec, GameServer, HeartbeatInfo};

#[derive(Serialize)]
struct ServerSummary {
    #[serde(flatten)]
    server: GameServer,
    uptime_ms: i64,
    last_seen_ms: i64,
}

/// POST /auth/connect. Registers (or re-registers) a server and hands
/// back the bearer token it will use from then on.
pub async fn connect(
    _key: ApiKey,
    State(state): State<ApiState>,
    Json(spec): Json<ConnectSpec>,
) -> Result<Json<Value>, ApiError> {
    if spec.game_id.is_empty() || spec.job_id.is_empty() {
        return Err(ApiError::bad_request("game_id and job_id are required"));
    }

    let server = state.registry.write().await.connect(spec);
    let token = state.tokens.issue(&server)?;
    tracing::info!(job_id = %server.job_id, name = %server.server_name, "server connected");

    Ok(Json(json!({
        "success": true,
        "token": token,
        "server": server,
        "message": "server registered",
    })))
}

#[derive(Deserialize)]
pub struct DisconnectRequest {
    job_id: String,
}

/// POST /auth/disconnect.
pub async fn disconnect(
    _key: ApiKey,
    State(state): State<ApiState>,
    Json(body): Json<DisconnectRequest>,
) -> Result<Json<Value>, ApiError> {
    if state.registry.write().await.disconnect(&body.job_id) {
        tracing::info!(job_id = %body.job_id, "server disconnected");
        Ok(Json(json!({ "success": true, "message": "server removed" })))
    } else {
        Err(ApiError::not_found("unknown server"))
    }
}

/// GET /auth/servers. Every known server with derived age figures.
pub async fn list(_key: ApiKey, State(state): State<ApiState>) -> Json<Value> {
    let now = Utc::now();
    let servers: Vec<ServerSummary> = state
        .registry
        .read()
        .await
        .all()
        .into_iter()
        .map(|server| ServerSummary {
            uptime_ms: (now - server.connected_at).num_milliseconds(),
            last_seen_ms: (now - server.last_heartbeat).num_milliseconds(),
            server,
        })
        .collect();

    Json(json!({
        "success": true,
        "count": servers.len(),
        "servers": servers,
    }))
}

/// POST /api/heartbeat. The body is optional; an empty beat still proves
/// liveness. A beat from a job id the registry does not know is refused
/// so the server knows to reconnect.
pub async fn heartbeat(
    claims: ServerClaims,
    State(state): State<ApiState>,
    body: Option<Json<HeartbeatInfo>>,
) -> Result<Json<Value>, ApiError> {
    let info = body.map(|Json(info)| info).unwrap_or_default();
    let updated = state.registry.write().await.heartbeat(&claims.job_id, info);

    match updated {
        Some(server) => {
            tracing::debug!(
                job_id = %server.job_id,
                players = server.players_online,
                status = %server.status,
                "heartbeat"
            );
            Ok(Json(json!({
                "success": true,
                "message": "heartbeat recorded",
                "server_time": Utc::now().timestamp_millis(),
            })))
        }
        None => Err(ApiError::not_found("server not registered")),
    }
}
