use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::api::auth::{ApiKey, ServerClaims};
use crate::api::{ApiError, ApiState};
use crate::store::{Command, CommandSpec};

/// Wire shape handed to polling servers. Execution bookkeeping fields
/// stay internal.
#[derive(Serialize)]
struct PendingCommand {
    id: Uuid,
    command: String,
    executor: String,
    target: Option<String>,
    args: Vec<String>,
    executed: bool,
    priority: i32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
}

impl From<Command> for PendingCommand {
    fn from(cmd: Command) -> Self {
        Self {
            id: cmd.id,
            command: cmd.command,
            executor: cmd.executor,
            target: cmd.target,
            args: cmd.args,
            executed: cmd.executed,
            priority: cmd.priority,
            created_at: cmd.created_at,
        }
    }
}

/// GET /api/commands. Polled by servers with their bearer token; the
/// result is scoped to their job id.
pub async fn pending(State(state): State<ApiState>, claims: ServerClaims) -> Json<Value> {
    let pending = state.queue.read().await.list_pending(Some(&claims.job_id));
    let commands: Vec<PendingCommand> = pending.into_iter().map(PendingCommand::from).collect();

    Json(json!({
        "success": true,
        "count": commands.len(),
        "commands": commands,
    }))
}

/// POST /api/commands.
pub async fn create(
    _key: ApiKey,
    State(state): State<ApiState>,
    Json(spec): Json<CommandSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let command = state.queue.write().await.enqueue(spec)?;
    tracing::info!(id = %command.id, command = %command.command, "command queued");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "command": command,
            "message": "command created",
        })),
    ))
}

#[derive(Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    commands: Vec<CommandSpec>,
}

#[derive(Serialize)]
struct BatchFailure {
    index: usize,
    error: String,
}

/// POST /api/commands/batch. Items are accepted independently; a bad
/// entry is reported back by its position without sinking the rest.
pub async fn create_batch(
    _key: ApiKey,
    State(state): State<ApiState>,
    Json(body): Json<BatchRequest>,
) -> impl IntoResponse {
    let mut created = Vec::new();
    let mut failures = Vec::new();
    {
        let mut queue = state.queue.write().await;
        for (index, spec) in body.commands.into_iter().enumerate() {
            match queue.enqueue(spec) {
                Ok(command) => created.push(command),
                Err(error) => failures.push(BatchFailure {
                    index,
                    error: error.to_string(),
                }),
            }
        }
    }
    tracing::info!(
        created = created.len(),
        failed = failures.len(),
        "batch enqueue"
    );

    (
        StatusCode::CREATED,
        Json(json!({
            "success": failures.is_empty(),
            "count": created.len(),
            "commands": created,
            "failures": failures,
        })),
    )
}

/// GET /api/commands/stats.
pub async fn stats(_key: ApiKey, State(state): State<ApiState>) -> Json<Value> {
    let stats = state.queue.read().await.stats();
    Json(json!({ "success": true, "stats": stats }))
}

#[derive(Deserialize)]
pub struct ReportRequest {
    command_id: String,
    #[serde(default)]
    success: bool,
    message: Option<Value>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// POST /api/results. Always acknowledged: a report for an unknown or
/// malformed id carries no information worth failing the caller over.
pub async fn report(
    claims: ServerClaims,
    State(state): State<ApiState>,
    Json(body): Json<ReportRequest>,
) -> Json<Value> {
    match Uuid::parse_str(&body.command_id) {
        Ok(id) => {
            let updated = state.queue.write().await.report_result(
                &id,
                body.success,
                body.message,
                body.metadata,
            );
            match updated {
                Some(command) => tracing::info!(
                    id = %command.id,
                    success = body.success,
                    server = %claims.job_id,
                    "result recorded"
                ),
                None => tracing::debug!(id = %id, "result for unknown command ignored"),
            }
        }
        Err(_) => {
            tracing::debug!(command_id = %body.command_id, "unparseable command id in result")
        }
    }

    Json(json!({ "success": true, "message": "result recorded" }))
}
