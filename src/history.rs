//! Snapshot-based undo/redo over task store state.
//!
//! Entries hold whole `TaskState` snapshots rather than inverse operations,
//! so restoring one is a pointer swap. `past` is oldest first; `future` is
//! soonest-undone first.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::store::{Change, HistoryAction, TaskState};

/// Default number of undo steps kept
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Anything whose whole state can be captured and put back
pub trait Snapshots {
    fn snapshot(&self) -> Arc<TaskState>;
    fn restore(&mut self, state: Arc<TaskState>);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTag {
    pub action: HistoryAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_task_ids: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub state: Arc<TaskState>,
    pub tag: HistoryTag,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    past: Vec<HistoryEntry>,
    future: VecDeque<HistoryEntry>,
    limit: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// A limit of zero is treated as one.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            past: Vec::new(),
            future: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Capture the source's current state as the newest undo step.
    pub fn push_state<S: Snapshots + ?Sized>(
        &mut self,
        source: &S,
        action: HistoryAction,
        affected: Option<BTreeSet<String>>,
    ) {
        self.push(HistoryEntry {
            state: source.snapshot(),
            tag: HistoryTag {
                action,
                affected_task_ids: affected,
            },
        });
    }

    /// Record an applied change using the state it replaced.
    pub fn record(&mut self, change: Change) {
        self.push(HistoryEntry {
            state: change.before,
            tag: HistoryTag {
                action: change.action,
                affected_task_ids: change.affected,
            },
        });
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.past.push(entry);
        if self.past.len() > self.limit {
            let excess = self.past.len() - self.limit;
            self.past.drain(..excess);
        }
        self.future.clear();
    }

    /// Restore the newest past entry. Returns its tag, or `None` when there
    /// is nothing to undo.
    pub fn undo<S: Snapshots + ?Sized>(&mut self, target: &mut S) -> Option<HistoryTag> {
        let entry = self.past.pop()?;
        let current = target.snapshot();
        target.restore(entry.state);
        debug!(action = %entry.tag.action, "undo");
        self.future.push_front(HistoryEntry {
            state: current,
            tag: entry.tag.clone(),
        });
        Some(entry.tag)
    }

    /// Re-apply the most recently undone entry.
    pub fn redo<S: Snapshots + ?Sized>(&mut self, target: &mut S) -> Option<HistoryTag> {
        let entry = self.future.pop_front()?;
        let current = target.snapshot();
        target.restore(entry.state);
        debug!(action = %entry.tag.action, "redo");
        self.past.push(HistoryEntry {
            state: current,
            tag: entry.tag.clone(),
        });
        Some(entry.tag)
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn peek_undo(&self) -> Option<&HistoryTag> {
        self.past.last().map(|entry| &entry.tag)
    }

    pub fn peek_redo(&self) -> Option<&HistoryTag> {
        self.future.front().map(|entry| &entry.tag)
    }

    /// Tags from newest to oldest
    pub fn past_tags(&self) -> impl Iterator<Item = &HistoryTag> {
        self.past.iter().rev().map(|entry| &entry.tag)
    }

    /// Tags in redo order
    pub fn future_tags(&self) -> impl Iterator<Item = &HistoryTag> {
        self.future.iter().map(|entry| &entry.tag)
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }
}
