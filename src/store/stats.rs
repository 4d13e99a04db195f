use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sysinfo::{Pid, ProcessExt, System, SystemExt};

use crate::store::logs::LogStore;
use crate::store::queue::{CommandQueue, QueueStats};
use crate::store::registry::ServerRegistry;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ServerCounts {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LogCounts {
    pub total: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct MemoryStats {
    pub rss_bytes: u64,
    pub virtual_bytes: u64,
}

/// Aggregate snapshot across all three stores plus host-process figures.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub servers: ServerCounts,
    pub commands: QueueStats,
    pub logs: LogCounts,
    pub uptime_seconds: u64,
    pub memory: MemoryStats,
}

/// Pure read-side composition over the stores. Holds no state of its own,
/// so it is safe to call concurrently with any store operation as long as
/// the caller holds the usual read access.
pub fn global_stats(
    queue: &CommandQueue,
    registry: &ServerRegistry,
    logs: &LogStore,
    active_window: Duration,
    uptime: StdDuration,
) -> GlobalStats {
    global_stats_at(queue, registry, logs, active_window, uptime, Utc::now())
}

pub fn global_stats_at(
    queue: &CommandQueue,
    registry: &ServerRegistry,
    logs: &LogStore,
    active_window: Duration,
    uptime: StdDuration,
    now: DateTime<Utc>,
) -> GlobalStats {
    GlobalStats {
        servers: ServerCounts {
            total: registry.len(),
            active: registry.list_active_at(active_window, now).len(),
        },
        commands: queue.stats(),
        logs: LogCounts { total: logs.len() },
        uptime_seconds: uptime.as_secs(),
        memory: process_memory(),
    }
}

/// Resident and virtual memory of this process, zeroed if the host
/// refuses to report it.
pub fn process_memory() -> MemoryStats {
    let pid = Pid::from(std::process::id() as usize);
    let mut system = System::new();
    system.refresh_process(pid);
    match system.process(pid) {
        Some(process) => MemoryStats {
            rss_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        },
        None => MemoryStats::default(),
    }
}
