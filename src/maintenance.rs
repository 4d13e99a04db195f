//! Scheduled upkeep: command eviction, log pruning, and the
//! inactive-server sweep.

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::ApiState;
use crate::store::{GameServer, LogSpec};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MaintenanceReport {
    pub commands_deleted: usize,
    pub logs_deleted: usize,
}

/// One eviction + prune pass. Shared by the interval task and the manual
/// POST /cleanup route.
pub async fn cleanup_pass(state: &ApiState) -> MaintenanceReport {
    let commands_deleted = state.queue.write().await.evict_expired();
    let logs_deleted = state
        .logs
        .write()
        .await
        .prune_older_than(state.config.log_retention);

    tracing::info!(commands_deleted, logs_deleted, "cleanup pass finished");

    let mut data = Map::new();
    data.insert(
        "commands_deleted".to_string(),
        Value::from(commands_deleted),
    );
    data.insert("logs_deleted".to_string(), Value::from(logs_deleted));
    let spec = LogSpec::new("info", "automatic cleanup finished").with_data(data);
    if let Err(error) = state.logs.write().await.append(spec) {
        tracing::warn!(%error, "cleanup log entry dropped");
    }

    MaintenanceReport {
        commands_deleted,
        logs_deleted,
    }
}

/// Removes servers whose last heartbeat is older than the inactivity
/// window and reports what was removed.
pub async fn sweep_pass(state: &ApiState) -> Vec<GameServer> {
    let removed = state
        .registry
        .write()
        .await
        .sweep_inactive(state.config.inactivity_window);

    for server in &removed {
        tracing::warn!(
            job_id = %server.job_id,
            name = %server.server_name,
            "inactive server removed"
        );

        let mut data = Map::new();
        data.insert("job_id".to_string(), Value::String(server.job_id.clone()));
        data.insert(
            "last_heartbeat".to_string(),
            Value::String(server.last_heartbeat.to_rfc3339()),
        );
        let spec = LogSpec::new(
            "warning",
            format!("inactive server removed: {}", server.server_name),
        )
        .with_data(data);
        if let Err(error) = state.logs.write().await.append(spec) {
            tracing::warn!(%error, "sweep log entry dropped");
        }
    }

    removed
}

/// Runs both passes on their configured intervals until shutdown.
pub async fn run(state: ApiState, shutdown: CancellationToken) {
    let mut cleanup = interval_at(
        Instant::now() + state.config.cleanup_interval,
        state.config.cleanup_interval,
    );
    cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sweep = interval_at(
        Instant::now() + state.config.sweep_interval,
        state.config.sweep_interval,
    );
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = cleanup.tick() => {
                cleanup_pass(&state).await;
            }
            _ = sweep.tick() => {
                sweep_pass(&state).await;
            }
        }
    }

    tracing::debug!("maintenance task stopped");
}
