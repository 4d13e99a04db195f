//! In-memory stores for the command relay.
//!
//! Three stores with independent lifecycles:
//! - [`CommandQueue`]: prioritized commands awaiting execution by a remote server
//! - [`ServerRegistry`]: connected game servers and their heartbeat liveness
//! - [`LogStore`]: bounded ring of structured events
//!
//! Everything is volatile; a process restart loses all state. Each store
//! hands out snapshots, never references into its own storage, so callers
//! can only mutate through the documented operations.

pub mod command;
pub mod logs;
pub mod queue;
pub mod registry;
pub mod stats;

pub use command::{Command, CommandSpec};
pub use logs::{LogEntry, LogFilter, LogSpec, LogStore};
pub use queue::{CommandQueue, CommandTypeStats, QueueStats};
pub use registry::{ConnectSpec, GameServer, HeartbeatInfo, ServerRegistry};
pub use stats::{global_stats, global_stats_at, GlobalStats};
