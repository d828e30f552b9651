//! Task store: the task collection plus its two ordering projections.
//!
//! `tasks` keeps insertion order. `table_order` is the table view's display
//! order and `board_orders` holds one display order per status column. Every
//! mutation preserves:
//!
//! - `table_order` is a permutation of the ids in `tasks`
//! - `board_orders[S]` is a permutation of the ids of tasks with status `S`
//!
//! The current state is published as an `Arc<TaskState>`. Mutations build the
//! next state and swap the Arc, so a reader holding a snapshot never observes
//! a half-applied change. Each effective mutation returns a [`Change`]
//! carrying the pre-mutation snapshot for the history store; no-ops return
//! `None`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::history::Snapshots;
use crate::model::{check_values, Task, TaskPatch, TaskStatus};

/// Display order of each board column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardOrders {
    #[serde(default)]
    pub todo: Vec<String>,
    #[serde(default)]
    pub in_progress: Vec<String>,
    #[serde(default)]
    pub done: Vec<String>,
}

impl BoardOrders {
    /// Bucket each task id by status, keeping the incoming relative order.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut orders = BoardOrders::default();
        for task in tasks {
            orders.column_mut(task.status).push(task.id.clone());
        }
        orders
    }

    pub fn column(&self, status: TaskStatus) -> &[String] {
        match status {
            TaskStatus::Todo => &self.todo,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Done => &self.done,
        }
    }

    pub fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<String> {
        match status {
            TaskStatus::Todo => &mut self.todo,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Done => &mut self.done,
        }
    }
}

/// The `(tasks, tableOrder, boardOrders)` tuple
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub table_order: Vec<String>,
    #[serde(default)]
    pub board_orders: BoardOrders,
}

impl TaskState {
    /// Derive both projections from the order of `tasks`.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let table_order = tasks.iter().map(|task| task.id.clone()).collect();
        let board_orders = BoardOrders::from_tasks(&tasks);
        Self {
            tasks,
            table_order,
            board_orders,
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in table display order
    pub fn table_tasks(&self) -> Vec<&Task> {
        self.ordered(&self.table_order)
    }

    /// Tasks of one board column in display order
    pub fn column_tasks(&self, status: TaskStatus) -> Vec<&Task> {
        self.ordered(self.board_orders.column(status))
    }

    fn ordered(&self, ids: &[String]) -> Vec<&Task> {
        let by_id: HashMap<&str, &Task> = self
            .tasks
            .iter()
            .map(|task| (task.id.as_str(), task))
            .collect();
        ids.iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect()
    }

    /// Describe every broken ordering invariant; empty when consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut ids = HashSet::new();
        for task in &self.tasks {
            if !ids.insert(task.id.as_str()) {
                problems.push(format!("duplicate task id {}", task.id));
            }
        }

        check_permutation(
            "tableOrder",
            &self.table_order,
            &ids,
            &mut problems,
        );

        let mut columns: HashMap<&str, TaskStatus> = HashMap::new();
        for status in TaskStatus::ALL {
            for id in self.board_orders.column(status) {
                if let Some(first) = columns.insert(id.as_str(), status) {
                    if first != status {
                        problems.push(format!("boardOrders lists {id} in both {first} and {status}"));
                    }
                }
            }
        }

        for status in TaskStatus::ALL {
            let expected: HashSet<&str> = self
                .tasks
                .iter()
                .filter(|task| task.status == status)
                .map(|task| task.id.as_str())
                .collect();
            check_permutation(
                &format!("boardOrders.{status}"),
                self.board_orders.column(status),
                &expected,
                &mut problems,
            );
        }

        problems
    }

    pub fn is_consistent(&self) -> bool {
        self.invariant_violations().is_empty()
    }

    /// Rebuild the projections so they satisfy the invariants again.
    ///
    /// Duplicate tasks keep their first occurrence. Known ids keep their
    /// relative order; unknown and duplicate ids are dropped; missing ids are
    /// appended in `tasks` order.
    pub fn repaired(mut self) -> Self {
        let mut seen = HashSet::new();
        self.tasks.retain(|task| seen.insert(task.id.clone()));

        self.table_order = repair_order(
            &self.table_order,
            self.tasks.iter().map(|task| task.id.as_str()),
        );

        let mut board_orders = BoardOrders::default();
        for status in TaskStatus::ALL {
            let members = self
                .tasks
                .iter()
                .filter(|task| task.status == status)
                .map(|task| task.id.as_str());
            *board_orders.column_mut(status) =
                repair_order(self.board_orders.column(status), members);
        }
        self.board_orders = board_orders;
        self
    }

    fn remove_from_orders(&mut self, id: &str, status: TaskStatus) {
        self.table_order.retain(|entry| entry != id);
        self.board_orders.column_mut(status).retain(|entry| entry != id);
    }
}

fn check_permutation(
    name: &str,
    order: &[String],
    expected: &HashSet<&str>,
    problems: &mut Vec<String>,
) {
    let mut seen = HashSet::new();
    for id in order {
        if !seen.insert(id.as_str()) {
            problems.push(format!("{name} lists {id} more than once"));
        } else if !expected.contains(id.as_str()) {
            problems.push(format!("{name} lists unexpected id {id}"));
        }
    }
    for id in expected {
        if !seen.contains(id) {
            problems.push(format!("{name} is missing {id}"));
        }
    }
}

fn repair_order<'a>(current: &[String], members: impl Iterator<Item = &'a str>) -> Vec<String> {
    let members: Vec<&str> = members.collect();
    let allowed: HashSet<&str> = members.iter().copied().collect();
    let mut seen = HashSet::new();
    let mut order: Vec<String> = current
        .iter()
        .filter(|id| allowed.contains(id.as_str()) && seen.insert(id.as_str()))
        .cloned()
        .collect();
    for id in members {
        if seen.insert(id) {
            order.push(id.to_string());
        }
    }
    order
}

/// Tag recorded with each history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Add,
    Delete,
    Update,
    Reorder,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Add => "add",
            HistoryAction::Delete => "delete",
            HistoryAction::Update => "update",
            HistoryAction::Reorder => "reorder",
        }
    }
}

impl std::fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An applied mutation, reported back to the caller
#[derive(Debug, Clone)]
pub struct Change {
    pub action: HistoryAction,
    pub affected: Option<BTreeSet<String>>,
    /// State right before the mutation
    pub before: Arc<TaskState>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    state: Arc<TaskState>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a state loaded from storage, repairing broken projections.
    pub fn from_state(state: TaskState) -> Self {
        let violations = state.invariant_violations();
        let state = if violations.is_empty() {
            state
        } else {
            warn!(
                problems = violations.len(),
                first = %violations[0],
                "stored task state is inconsistent; rebuilding orders"
            );
            state.repaired()
        };
        Self {
            state: Arc::new(state),
        }
    }

    /// Current immutable snapshot
    pub fn state(&self) -> Arc<TaskState> {
        Arc::clone(&self.state)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.task(id)
    }

    /// Replace the whole collection; both projections follow incoming order.
    ///
    /// A repeated id keeps its first task. Custom values that cannot be
    /// stored are dropped.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) -> Change {
        let tasks = admissible(tasks);
        let count = tasks.len();
        let change = self.apply(HistoryAction::Update, None, |state| {
            *state = TaskState::from_tasks(tasks);
        });
        debug!(count, "tasks replaced");
        change
    }

    /// Append a task to the collection, the table, and its status column.
    ///
    /// The caller assigns the id and timestamps. An id that is already
    /// present is rejected so the projections stay permutations.
    pub fn add_task(&mut self, task: Task) -> Result<Change> {
        if self.state.task(&task.id).is_some() {
            return Err(Error::DuplicateTaskId(task.id));
        }
        check_values(&task.custom_fields)?;
        let id = task.id.clone();
        let change = self.apply(HistoryAction::Add, Some(single(&id)), |state| {
            state.table_order.push(task.id.clone());
            state.board_orders.column_mut(task.status).push(task.id.clone());
            state.tasks.push(task);
        });
        debug!(task_id = %id, "task added");
        Ok(change)
    }

    /// Merge `patch` into the task. A status change moves the id to the end
    /// of the new column.
    ///
    /// Unknown ids and empty patches are no-ops; a patch carrying a value
    /// that cannot be stored is rejected.
    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<Option<Change>> {
        let Some(old_status) = self.state.task(id).map(|task| task.status) else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(None);
        }
        patch.check()?;

        let change = self.apply(HistoryAction::Update, Some(single(id)), |state| {
            if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                patch.apply(task);
            }
            if let Some(new_status) = patch.status.filter(|status| *status != old_status) {
                state.board_orders.column_mut(old_status).retain(|entry| entry != id);
                state.board_orders.column_mut(new_status).push(id.to_string());
            }
        });
        debug!(task_id = %id, "task updated");
        Ok(Some(change))
    }

    pub fn delete_task(&mut self, id: &str) -> Option<Change> {
        let status = self.state.task(id)?.status;
        let change = self.apply(HistoryAction::Delete, Some(single(id)), |state| {
            state.tasks.retain(|task| task.id != id);
            state.remove_from_orders(id, status);
        });
        debug!(task_id = %id, "task deleted");
        Some(change)
    }

    /// Delete several tasks as one change. Unknown ids are skipped.
    pub fn delete_tasks(&mut self, ids: &[String]) -> Option<Change> {
        let doomed: Vec<(String, TaskStatus)> = ids
            .iter()
            .filter_map(|id| self.state.task(id).map(|task| (task.id.clone(), task.status)))
            .collect();
        if doomed.is_empty() {
            return None;
        }

        let affected: BTreeSet<String> = doomed.iter().map(|(id, _)| id.clone()).collect();
        let change = self.apply(HistoryAction::Delete, Some(affected.clone()), |state| {
            state.tasks.retain(|task| !affected.contains(&task.id));
            for (id, status) in &doomed {
                state.remove_from_orders(id, *status);
            }
        });
        debug!(count = doomed.len(), "tasks deleted");
        Some(change)
    }

    /// Drop a task into `status` at `index` (clamped to the column length).
    ///
    /// Covers a board drag across columns in one change. `updated_at` is
    /// refreshed when the status actually changes.
    pub fn move_task(&mut self, id: &str, status: TaskStatus, index: usize) -> Option<Change> {
        let old_status = self.state.task(id)?.status;
        let change = self.apply(HistoryAction::Update, Some(single(id)), |state| {
            state.board_orders.column_mut(old_status).retain(|entry| entry != id);
            let column = state.board_orders.column_mut(status);
            let index = index.min(column.len());
            column.insert(index, id.to_string());
            if status != old_status {
                if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                    task.status = status;
                    task.updated_at = Utc::now();
                }
            }
        });
        debug!(task_id = %id, %status, index, "task moved");
        Some(change)
    }

    /// Move the entry at `source` to `destination` within the table order,
    /// or within one board column when `status` is given.
    ///
    /// Out-of-range indices are rejected without touching the state.
    pub fn reorder_tasks(
        &mut self,
        source: usize,
        destination: usize,
        status: Option<TaskStatus>,
    ) -> Result<Option<Change>> {
        let len = match status {
            Some(status) => self.state.board_orders.column(status).len(),
            None => self.state.table_order.len(),
        };
        for index in [source, destination] {
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
        }
        if source == destination {
            return Ok(None);
        }

        let change = self.apply(HistoryAction::Reorder, None, |state| {
            let order = match status {
                Some(status) => state.board_orders.column_mut(status),
                None => &mut state.table_order,
            };
            let moved = order.remove(source);
            order.insert(destination, moved);
        });
        debug!(source, destination, status = ?status, "tasks reordered");
        Ok(Some(change))
    }

    fn apply<F>(&mut self, action: HistoryAction, affected: Option<BTreeSet<String>>, f: F) -> Change
    where
        F: FnOnce(&mut TaskState),
    {
        let before = Arc::clone(&self.state);
        let mut next = (*before).clone();
        f(&mut next);
        self.state = Arc::new(next);
        Change {
            action,
            affected,
            before,
        }
    }
}

impl Snapshots for TaskStore {
    fn snapshot(&self) -> Arc<TaskState> {
        self.state()
    }

    fn restore(&mut self, state: Arc<TaskState>) {
        self.state = state;
    }
}

fn admissible(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| {
            let first = seen.insert(task.id.clone());
            if !first {
                warn!(task_id = %task.id, "dropping task with repeated id");
            }
            first
        })
        .map(|mut task| {
            task.custom_fields.retain(|field, value| {
                let keep = value.is_storable();
                if !keep {
                    warn!(task_id = %task.id, field = %field, "dropping non-finite field value");
                }
                keep
            });
            task
        })
        .collect()
}

fn single(id: &str) -> BTreeSet<String> {
    BTreeSet::from([id.to_string()])
}
