use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered remote game-server process, tracked for liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServer {
    /// Internal identifier, freshly assigned each time the process connects.
    pub id: Uuid,
    /// External key supplied by the caller, unique per live process.
    pub job_id: String,
    pub game_id: String,
    pub server_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub connected_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_heartbeat: DateTime<Utc>,
    pub status: String,
    pub players_online: u32,
}

/// Caller-supplied fields for a connect call.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectSpec {
    pub game_id: String,
    pub job_id: String,
    pub server_name: Option<String>,
}

/// Optional payload carried by a heartbeat.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatInfo {
    pub players_online: Option<u32>,
    pub status: Option<String>,
}

/// Tracks remote-process records keyed by job id. Liveness classification
/// and inactivity eviction use two independent windows: a server can miss
/// the short "active" window and still not be eligible for the sweep.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: HashMap<String, GameServer>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert by job id. A reconnect replaces the prior record, including
    /// its internal identifier.
    pub fn connect(&mut self, spec: ConnectSpec) -> GameServer {
        self.connect_at(spec, Utc::now())
    }

    pub fn connect_at(&mut self, spec: ConnectSpec, now: DateTime<Utc>) -> GameServer {
        let server = GameServer {
            id: Uuid::new_v4(),
            job_id: spec.job_id.clone(),
            game_id: spec.game_id,
            server_name: spec.server_name.unwrap_or_else(|| "Unknown".to_string()),
            connected_at: now,
            last_heartbeat: now,
            status: "active".to_string(),
            players_online: 0,
        };
        self.servers.insert(spec.job_id, server.clone());
        server
    }

    pub fn get(&self, job_id: &str) -> Option<GameServer> {
        self.servers.get(job_id).cloned()
    }

    /// Refresh a server's liveness. Unreported fields fall back to zero
    /// players and a "running" status rather than keeping prior values.
    /// Returns `None` when the job id is unknown.
    pub fn heartbeat(&mut self, job_id: &str, info: HeartbeatInfo) -> Option<GameServer> {
        self.heartbeat_at(job_id, info, Utc::now())
    }

    pub fn heartbeat_at(
        &mut self,
        job_id: &str,
        info: HeartbeatInfo,
        now: DateTime<Utc>,
    ) -> Option<GameServer> {
        let server = self.servers.get_mut(job_id)?;
        server.last_heartbeat = now;
        server.players_online = info.players_online.unwrap_or(0);
        server.status = info.status.unwrap_or_else(|| "running".to_string());
        Some(server.clone())
    }

    /// Remove a server if present. Returns whether anything was removed.
    pub fn disconnect(&mut self, job_id: &str) -> bool {
        self.servers.remove(job_id).is_some()
    }

    /// Servers whose last heartbeat is strictly younger than `window`.
    pub fn list_active(&self, window: Duration) -> Vec<GameServer> {
        self.list_active_at(window, Utc::now())
    }

    pub fn list_active_at(&self, window: Duration, now: DateTime<Utc>) -> Vec<GameServer> {
        self.servers
            .values()
            .filter(|s| now - s.last_heartbeat < window)
            .cloned()
            .collect()
    }

    /// Remove and return every server silent for at least `window`. The
    /// caller is responsible for logging each removal.
    pub fn sweep_inactive(&mut self, window: Duration) -> Vec<GameServer> {
        self.sweep_inactive_at(window, Utc::now())
    }

    pub fn sweep_inactive_at(&mut self, window: Duration, now: DateTime<Utc>) -> Vec<GameServer> {
        let stale: Vec<String> = self
            .servers
            .values()
            .filter(|s| now - s.last_heartbeat >= window)
            .map(|s| s.job_id.clone())
            .collect();

        stale
            .iter()
            .filter_map(|job_id| self.servers.remove(job_id))
            .collect()
    }

    /// Snapshot of every registered server, active or not.
    pub fn all(&self) -> Vec<GameServer> {
        self.servers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
