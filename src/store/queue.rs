use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, WardenError};
use crate::store::command::{Command, CommandSpec};

/// One queue slot. The sequence number resolves priority ties in
/// insertion order so repeated listings are deterministic.
#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    command: Command,
}

/// Per-command-name execution tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandTypeStats {
    pub total: u64,
    pub executed: u64,
    pub successful: u64,
    pub failed: u64,
    pub pending: u64,
}

/// Aggregate view over the queue. The running counters survive eviction;
/// `total_pending` and `by_type` reflect commands currently held.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total_commands: u64,
    pub successful_commands: u64,
    pub failed_commands: u64,
    pub total_pending: u64,
    pub by_type: BTreeMap<String, CommandTypeStats>,
}

/// Tracks command records: prioritized pending selection scoped to a
/// server, outcome recording, and TTL-based eviction.
///
/// `list_pending` does not claim commands. Two consumers polling the same
/// scope can both observe a command before either reports a result; the
/// queue provides at-least-once visibility, not at-most-once delivery.
#[derive(Debug)]
pub struct CommandQueue {
    commands: HashMap<Uuid, Slot>,
    ttl: Duration,
    next_seq: u64,
    total_commands: u64,
    successful_commands: u64,
    failed_commands: u64,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(1))
    }

    /// A single TTL governs both the pending filter and eviction, whether
    /// or not a command was ever executed.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            commands: HashMap::new(),
            ttl,
            next_seq: 0,
            total_commands: 0,
            successful_commands: 0,
            failed_commands: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Validate and store a new command. On validation failure nothing is
    /// recorded and no counter moves.
    pub fn enqueue(&mut self, spec: CommandSpec) -> Result<Command> {
        self.enqueue_at(spec, Utc::now())
    }

    pub fn enqueue_at(&mut self, spec: CommandSpec, now: DateTime<Utc>) -> Result<Command> {
        let command = Command::from_spec(spec, now)?;
        if self.commands.contains_key(&command.id) {
            return Err(WardenError::DuplicateId(command.id));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_commands += 1;

        let snapshot = command.clone();
        self.commands.insert(command.id, Slot { seq, command });
        Ok(snapshot)
    }

    /// Snapshot of a single command, if still held.
    pub fn get(&self, id: &Uuid) -> Option<Command> {
        self.commands.get(id).map(|slot| slot.command.clone())
    }

    /// Commands not yet executed, not expired, and visible to the given
    /// scope, ordered by priority descending. A `None` scope sees every
    /// pending command, scoped or not.
    pub fn list_pending(&self, server_id: Option<&str>) -> Vec<Command> {
        self.list_pending_at(server_id, Utc::now())
    }

    pub fn list_pending_at(&self, server_id: Option<&str>, now: DateTime<Utc>) -> Vec<Command> {
        let mut slots: Vec<&Slot> = self
            .commands
            .values()
            .filter(|slot| {
                let cmd = &slot.command;
                if cmd.executed {
                    return false;
                }
                if let (Some(requester), Some(scope)) = (server_id, cmd.server_id.as_deref()) {
                    if requester != scope {
                        return false;
                    }
                }
                !cmd.is_expired(self.ttl, now)
            })
            .collect();

        slots.sort_by_key(|slot| (Reverse(slot.command.priority), slot.seq));
        slots.into_iter().map(|slot| slot.command.clone()).collect()
    }

    /// Record an execution outcome. Returns `None` for an unknown id;
    /// callers treat that as "nothing to update" because a result may
    /// arrive after the command was evicted.
    pub fn report_result(
        &mut self,
        id: &Uuid,
        success: bool,
        result: Option<Value>,
        metadata: Map<String, Value>,
    ) -> Option<Command> {
        self.report_result_at(id, success, result, metadata, Utc::now())
    }

    pub fn report_result_at(
        &mut self,
        id: &Uuid,
        success: bool,
        result: Option<Value>,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Option<Command> {
        let slot = self.commands.get_mut(id)?;

        // A repeat report replaces the previous outcome, so back out its
        // tally first. Counters track the recorded value, not how many
        // reports arrived.
        if slot.command.executed {
            match slot.command.success {
                Some(true) => self.successful_commands -= 1,
                _ => self.failed_commands -= 1,
            }
        }

        slot.command.mark_executed(success, result, metadata, now);
        if success {
            self.successful_commands += 1;
        } else {
            self.failed_commands += 1;
        }

        Some(slot.command.clone())
    }

    /// Drop every command past its TTL. Returns the number removed.
    pub fn evict_expired(&mut self) -> usize {
        self.evict_expired_at(Utc::now())
    }

    pub fn evict_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.commands.len();
        let ttl = self.ttl;
        self.commands
            .retain(|_, slot| !slot.command.is_expired(ttl, now));
        before - self.commands.len()
    }

    pub fn stats(&self) -> QueueStats {
        let mut by_type: BTreeMap<String, CommandTypeStats> = BTreeMap::new();
        let mut total_pending = 0;

        for slot in self.commands.values() {
            let cmd = &slot.command;
            let entry = by_type.entry(cmd.command.clone()).or_default();
            entry.total += 1;
            if cmd.executed {
                entry.executed += 1;
                if cmd.success == Some(true) {
                    entry.successful += 1;
                } else {
                    entry.failed += 1;
                }
            } else {
                entry.pending += 1;
                total_pending += 1;
            }
        }

        QueueStats {
            total_commands: self.total_commands,
            successful_commands: self.successful_commands,
            failed_commands: self.failed_commands,
            total_pending,
            by_type,
        }
    }

    /// Number of commands currently held, executed or not.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> CommandSpec {
        CommandSpec::new(name)
    }

    #[test]
    fn test_enqueue_makes_command_pending() {
        let mut queue = CommandQueue::new();
        let cmd = queue.enqueue(spec("ff")).unwrap();

        let pending = queue.list_pending(None);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, cmd.id);
        assert!(!pending[0].executed);
    }

    #[test]
    fn test_invalid_spec_leaves_no_trace() {
        let mut queue = CommandQueue::new();
        assert!(queue.enqueue(spec("")).is_err());
        assert!(queue.is_empty());
        assert_eq!(queue.stats().total_commands, 0);
    }

    #[test]
    fn test_priority_descending_with_stable_ties() {
        let mut queue = CommandQueue::new();
        queue.enqueue(spec("low").with_priority(1)).unwrap();
        queue.enqueue(spec("high").with_priority(10)).unwrap();
        queue.enqueue(spec("mid").with_priority(5)).unwrap();
        queue.enqueue(spec("tie_a").with_priority(5)).unwrap();
        queue.enqueue(spec("tie_b").with_priority(5)).unwrap();

        let pending = queue.list_pending(None);
        let names: Vec<&str> = pending.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "tie_a", "tie_b", "low"]);
    }

    #[test]
    fn test_scoped_commands_hidden_from_other_servers() {
        let mut queue = CommandQueue::new();
        queue.enqueue(spec("ban").with_server_id("S1")).unwrap();

        assert_eq!(queue.list_pending(Some("S1")).len(), 1);
        assert_eq!(queue.list_pending(Some("S2")).len(), 0);
        // An unscoped listing sees scoped commands too
        assert_eq!(queue.list_pending(None).len(), 1);
    }

    #[test]
    fn test_report_result_transitions_exactly_once() {
        let mut queue = CommandQueue::new();
        let cmd = queue.enqueue(spec("kick")).unwrap();

        let first = queue
            .report_result(&cmd.id, true, Some(Value::from("kicked")), Map::new())
            .unwrap();
        assert!(first.executed);
        assert_eq!(queue.stats().successful_commands, 1);
        assert_eq!(queue.stats().failed_commands, 0);

        // Second report overwrites the outcome without double counting
        let second = queue
            .report_result(&cmd.id, false, None, Map::new())
            .unwrap();
        assert!(second.executed);
        assert_eq!(queue.stats().successful_commands, 0);
        assert_eq!(queue.stats().failed_commands, 1);
    }

    #[test]
    fn test_report_result_unknown_id_is_not_found() {
        let mut queue = CommandQueue::new();
        let missing = Uuid::new_v4();
        assert!(queue
            .report_result(&missing, true, None, Map::new())
            .is_none());
        assert_eq!(queue.stats().successful_commands, 0);
    }

    #[test]
    fn test_executed_commands_leave_pending() {
        let mut queue = CommandQueue::new();
        let cmd = queue.enqueue(spec("ban")).unwrap();
        queue.report_result(&cmd.id, true, None, Map::new());

        assert!(queue.list_pending(None).is_empty());
        // Still held until eviction
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_ttl_eviction_boundaries() {
        let start = Utc::now();
        let mut queue = CommandQueue::with_ttl(Duration::hours(1));
        queue.enqueue_at(spec("ff"), start).unwrap();

        assert_eq!(queue.evict_expired_at(start + Duration::minutes(59)), 0);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.evict_expired_at(start + Duration::minutes(61)), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_expired_commands_hidden_before_eviction() {
        let start = Utc::now();
        let mut queue = CommandQueue::with_ttl(Duration::minutes(10));
        queue.enqueue_at(spec("ff"), start).unwrap();

        assert!(queue
            .list_pending_at(None, start + Duration::minutes(11))
            .is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_executed_commands_age_from_execution_time() {
        let start = Utc::now();
        let mut queue = CommandQueue::with_ttl(Duration::hours(1));
        let cmd = queue.enqueue_at(spec("ban"), start).unwrap();

        let executed_at = start + Duration::minutes(50);
        queue.report_result_at(&cmd.id, true, None, Map::new(), executed_at);

        // Beyond created_at + ttl but within executed_at + ttl
        assert_eq!(queue.evict_expired_at(start + Duration::minutes(70)), 0);
        assert_eq!(
            queue.evict_expired_at(executed_at + Duration::minutes(61)),
            1
        );
    }

    #[test]
    fn test_stats_by_type_breakdown() {
        let mut queue = CommandQueue::new();
        let a = queue.enqueue(spec("ban")).unwrap();
        queue.enqueue(spec("ban")).unwrap();
        let c = queue.enqueue(spec("kick")).unwrap();

        queue.report_result(&a.id, true, None, Map::new());
        queue.report_result(&c.id, false, None, Map::new());

        let stats = queue.stats();
        assert_eq!(stats.total_commands, 3);
        assert_eq!(stats.total_pending, 1);

        let ban = &stats.by_type["ban"];
        assert_eq!(ban.total, 2);
        assert_eq!(ban.executed, 1);
        assert_eq!(ban.successful, 1);
        assert_eq!(ban.pending, 1);

        let kick = &stats.by_type["kick"];
        assert_eq!(kick.failed, 1);
        assert_eq!(kick.pending, 0);
    }
}
