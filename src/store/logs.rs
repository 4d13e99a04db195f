use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, WardenError};

/// Hard cap on retained entries when none is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 10_000;

/// Entries returned by a query when the caller gives no limit.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// A structured event retained by the log store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number, never reused even across pruning.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub data: Map<String, Value>,
    pub server_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for an append.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSpec {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub server_id: Option<String>,
}

impl LogSpec {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            message: message.into(),
            data: Map::new(),
            server_id: None,
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }
}

/// Query filters. All are optional and combine conjunctively.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub kind: Option<String>,
    pub server_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Append-only, capacity-bounded ring of structured events. Two bounds
/// apply: a hard count cap enforced on append, and age-based pruning run
/// by the maintenance pass. They serve different purposes and neither
/// replaces the other.
#[derive(Debug)]
pub struct LogStore {
    entries: VecDeque<LogEntry>,
    next_id: u64,
    capacity: usize,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_id: 1,
            capacity,
        }
    }

    /// Append an event. Rejects an empty message without storing anything;
    /// on overflow the oldest entry is dropped silently.
    pub fn append(&mut self, spec: LogSpec) -> Result<LogEntry> {
        self.append_at(spec, Utc::now())
    }

    pub fn append_at(&mut self, spec: LogSpec, now: DateTime<Utc>) -> Result<LogEntry> {
        if spec.message.is_empty() {
            return Err(WardenError::InvalidLog(
                "log message is required".to_string(),
            ));
        }

        let entry = LogEntry {
            id: self.next_id,
            kind: spec.kind.unwrap_or_else(|| "info".to_string()),
            message: spec.message,
            data: spec.data,
            server_id: spec.server_id,
            timestamp: now,
            created_at: now,
        };
        self.next_id += 1;

        self.entries.push_back(entry.clone());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }

        Ok(entry)
    }

    /// The most recent matching entries, newest first.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT);
        self.entries
            .iter()
            .rev()
            .filter(|e| filter.kind.as_deref().map_or(true, |k| e.kind == k))
            .filter(|e| {
                filter
                    .server_id
                    .as_deref()
                    .map_or(true, |s| e.server_id.as_deref() == Some(s))
            })
            .filter(|e| filter.since.map_or(true, |t| e.timestamp >= t))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Drop entries older than the retention window. Returns the number
    /// removed.
    pub fn prune_older_than(&mut self, retention: Duration) -> usize {
        self.prune_older_than_at(retention, Utc::now())
    }

    pub fn prune_older_than_at(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - retention;
        let before = self.entries.len();
        self.entries.retain(|e| e.timestamp > cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
