use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::api::auth::TokenIssuer;
use crate::api::ratelimit::RateLimiter;
use crate::api::{self, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::maintenance;
use crate::store::{global_stats, CommandQueue, LogSpec, LogStore, ServerRegistry};

/// Owns the shared state and runs the HTTP API plus the maintenance task
/// until shutdown.
pub struct Service {
    state: ApiState,
}

impl Service {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let state = ApiState {
            queue: Arc::new(RwLock::new(CommandQueue::with_ttl(config.command_ttl))),
            registry: Arc::new(RwLock::new(ServerRegistry::new())),
            logs: Arc::new(RwLock::new(LogStore::with_capacity(config.log_capacity))),
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl)),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_window,
                config.rate_limit_max,
            )),
            started_at: Instant::now(),
            config,
        };
        Self { state }
    }

    /// Handle to the shared state, for embedding and tests.
    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    /// Serves until the token is cancelled, then records the final stats.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let state = self.state;

        tracing::info!(
            addr = %state.config.listen_addr,
            api_key_required = state.config.require_api_key,
            cleanup_interval_secs = state.config.cleanup_interval.as_secs(),
            store = "in-memory",
            "warden starting"
        );

        {
            let mut data = Map::new();
            data.insert(
                "port".to_string(),
                Value::from(state.config.listen_addr.port()),
            );
            data.insert(
                "version".to_string(),
                Value::String(env!("CARGO_PKG_VERSION").to_string()),
            );
            let spec = LogSpec::new("info", "server started").with_data(data);
            if let Err(error) = state.logs.write().await.append(spec) {
                tracing::warn!(%error, "startup log entry dropped");
            }
        }

        let maintenance_handle = tokio::spawn(maintenance::run(state.clone(), shutdown.clone()));

        api::serve(state.clone(), shutdown).await?;

        let _ = maintenance_handle.await;

        {
            let queue = state.queue.read().await;
            let registry = state.registry.read().await;
            let mut logs = state.logs.write().await;

            let stats = global_stats(
                &queue,
                &registry,
                &logs,
                state.config.active_window,
                state.started_at.elapsed(),
            );
            let mut data = Map::new();
            data.insert(
                "uptime_seconds".to_string(),
                Value::from(stats.uptime_seconds),
            );
            if let Ok(value) = serde_json::to_value(&stats) {
                data.insert("stats".to_string(), value);
            }
            let spec = LogSpec::new("info", "server stopped").with_data(data);
            if let Err(error) = logs.append(spec) {
                tracing::warn!(%error, "shutdown log entry dropped");
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }
}
