use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, WardenError};

/// Longest accepted command name, measured after prefix normalization.
pub const MAX_COMMAND_LEN: usize = 100;

/// Executor recorded when the submitter does not name one.
pub const PLATFORM_EXECUTOR: &str = "Server";

/// Producer-supplied fields for a new command. Everything except the
/// command name is optional and falls back to a default at enqueue time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,
    pub executor: Option<String>,
    pub target: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    pub server_id: Option<String>,
    pub priority: Option<i32>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_executor(mut self, executor: impl Into<String>) -> Self {
        self.executor = Some(executor.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A queued unit of work for a remote server to execute and report on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub command: String,
    pub executor: String,
    pub target: Option<String>,
    pub args: Vec<String>,
    /// When set, only a consumer identifying as this server sees the
    /// command as pending.
    pub server_id: Option<String>,
    pub priority: i32,
    pub executed: bool,
    pub success: Option<bool>,
    pub result: Option<Value>,
    pub metadata: Map<String, Value>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Command {
    /// Build a command from a spec, applying defaults and validating the
    /// name. Fails without side effects when the name is empty or too long.
    pub fn from_spec(spec: CommandSpec, now: DateTime<Utc>) -> Result<Self> {
        let name = normalize_name(&spec.command);
        if name.is_empty() {
            return Err(WardenError::InvalidCommand(
                "command name is required".to_string(),
            ));
        }
        if name.chars().count() > MAX_COMMAND_LEN {
            return Err(WardenError::InvalidCommand(format!(
                "command name exceeds {MAX_COMMAND_LEN} characters"
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            command: name.to_string(),
            executor: spec
                .executor
                .unwrap_or_else(|| PLATFORM_EXECUTOR.to_string()),
            target: spec.target,
            args: spec.args,
            server_id: spec.server_id,
            priority: spec.priority.unwrap_or(1),
            executed: false,
            success: None,
            result: None,
            metadata: Map::new(),
            created_at: now,
            executed_at: None,
        })
    }

    /// Record an execution outcome. Result is replaced wholesale; metadata
    /// keys merge into whatever was already attached.
    pub fn mark_executed(
        &mut self,
        success: bool,
        result: Option<Value>,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) {
        self.executed = true;
        self.executed_at = Some(now);
        self.success = Some(success);
        self.result = result;
        for (key, value) in metadata {
            self.metadata.insert(key, value);
        }
    }

    /// True once the command has outlived the TTL. Executed commands age
    /// from their execution time, unexecuted ones from creation.
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (self.executed, self.executed_at) {
            (true, Some(at)) => now - at > ttl,
            _ => now - self.created_at > ttl,
        }
    }
}

/// Strip a single leading `:` or `;` chat prefix from a command name.
pub fn normalize_name(raw: &str) -> &str {
    raw.strip_prefix([':', ';']).unwrap_or(raw)
}
