//! The board context: task store, field registry, undo history,
//! preferences, persistence and subscribers behind one API.
//!
//! Every effective mutation follows the same path: the store applies it and
//! hands back the replaced snapshot, the history records that snapshot, the
//! new state is persisted, and subscribers are notified before the call
//! returns. No-ops skip all of it.
//!
//! Before each mutation the board checks whether another writer replaced the
//! stored state since it last read or wrote it, and reloads if so. The undo
//! history does not survive such a reload.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::fields::FieldRegistry;
use crate::history::{HistoryStore, HistoryTag};
use crate::kv::{KvStore, MemoryKv};
use crate::model::{CustomField, FieldPatch, FieldType, FieldValue, Task, TaskDraft, TaskPatch, TaskStatus};
use crate::observe::{BoardSnapshot, SubscriptionId, Subscribers};
use crate::persist::{
    self, FieldsState, Migrations, Persistence, FIELDS_KEY, FIELDS_VERSION, PREFS_KEY,
    PREFS_VERSION, TASKS_KEY, TASKS_VERSION,
};
use crate::prefs::{Preferences, ViewMode};
use crate::query::{QueryPage, TaskQuery};
use crate::store::{Change, HistoryAction, TaskState, TaskStore};

#[derive(Debug)]
pub struct Board {
    store: TaskStore,
    fields: FieldRegistry,
    history: HistoryStore,
    prefs: Preferences,
    persistence: Persistence,
    subscribers: Subscribers,
    record_initial_load: bool,
}

impl Default for Board {
    fn default() -> Self {
        Self::in_memory(&Config::default())
    }
}

impl Board {
    /// A board backed by a fresh in-process store.
    pub fn in_memory(config: &Config) -> Self {
        Self::open(Arc::new(MemoryKv::new()), config)
    }

    /// Rehydrate fields, tasks and preferences from `kv`.
    ///
    /// Missing or unreadable keys start empty; preferences fall back to the
    /// `[preferences]` config section.
    pub fn open(kv: Arc<dyn KvStore>, config: &Config) -> Self {
        let mut persistence = Persistence::new(kv);

        let fields = load_fields(&mut persistence);
        let store = load_store(&mut persistence);
        let prefs = load_prefs(
            &mut persistence,
            Preferences {
                view: config.preferences.view,
                page_size: config.preferences.page_size.max(1),
            },
        );

        debug!(
            tasks = store.state().len(),
            fields = fields.len(),
            "board opened"
        );

        Self {
            store,
            fields,
            history: HistoryStore::with_limit(config.history.limit),
            prefs,
            persistence,
            subscribers: Subscribers::new(),
            record_initial_load: config.history.record_initial_load,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn tasks(&self) -> Arc<TaskState> {
        self.store.state()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.store.task(id)
    }

    pub fn fields(&self) -> Arc<Vec<CustomField>> {
        self.fields.fields()
    }

    pub fn field_registry(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// `(can_undo, can_redo)`
    pub fn history_flags(&self) -> (bool, bool) {
        (self.history.can_undo(), self.history.can_redo())
    }

    pub fn preferences(&self) -> Preferences {
        self.prefs
    }

    pub fn view(&self) -> ViewMode {
        self.prefs.view
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            tasks: self.store.state(),
            fields: self.fields.fields(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    /// Filter, sort and paginate the table view.
    pub fn query(&self, query: &TaskQuery) -> QueryPage {
        query.run(&self.store.state(), &self.fields.fields())
    }

    /// Reload whatever another writer changed in storage since this board
    /// last read or wrote it. Returns true when anything was reloaded.
    ///
    /// Reloading the tasks clears the undo history.
    pub fn refresh(&mut self) -> bool {
        let tasks = self.persistence.changed_since_seen(TASKS_KEY);
        let fields = self.persistence.changed_since_seen(FIELDS_KEY);
        let prefs = self.persistence.changed_since_seen(PREFS_KEY);
        if !(tasks || fields || prefs) {
            return false;
        }

        if fields {
            self.fields = load_fields(&mut self.persistence);
        }
        if tasks {
            self.store = load_store(&mut self.persistence);
            self.history.clear();
        }
        if prefs {
            self.prefs = load_prefs(&mut self.persistence, self.prefs);
        }
        warn!(tasks, fields, prefs, "storage changed by another writer; board reloaded");
        self.notify();
        true
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&BoardSnapshot) + Send + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // =========================================================================
    // Custom fields
    // =========================================================================

    pub fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        default_value: Option<FieldValue>,
    ) -> Result<String> {
        self.refresh();
        let id = self.fields.add_field(name, field_type, default_value)?;
        self.fields_changed();
        Ok(id)
    }

    pub fn remove_field(&mut self, id: &str) -> bool {
        self.refresh();
        let removed = self.fields.remove_field(id);
        if removed {
            self.fields_changed();
        }
        removed
    }

    pub fn update_field(&mut self, id: &str, patch: FieldPatch) -> Result<bool> {
        self.refresh();
        let changed = self.fields.update_field(id, patch)?;
        if changed {
            self.fields_changed();
        }
        Ok(changed)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.refresh();
        let change = self.store.set_tasks(tasks);
        self.commit(change);
    }

    /// Replace all tasks with freshly loaded seed data.
    ///
    /// The load itself is not undoable unless `history.record_initial_load`
    /// is set.
    pub fn load_seed(&mut self, tasks: Vec<Task>) {
        self.refresh();
        let change = self.store.set_tasks(tasks);
        self.history.record(change);
        if !self.record_initial_load {
            self.history.clear();
        }
        self.persist_tasks();
        self.notify();
    }

    /// Add a caller-built task (id and timestamps already assigned).
    pub fn add_task(&mut self, task: Task) -> Result<()> {
        self.refresh();
        let change = self.store.add_task(task)?;
        self.commit(change);
        Ok(())
    }

    /// Validate a draft, add it, and return the new id.
    pub fn create_task(&mut self, draft: TaskDraft) -> Result<String> {
        let task = draft.into_task()?;
        let id = task.id.clone();
        self.add_task(task)?;
        Ok(id)
    }

    /// Returns false when the id is unknown or the patch is empty.
    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> Result<bool> {
        self.refresh();
        match self.store.update_task(id, patch)? {
            Some(change) => {
                self.commit(change);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        self.apply(|store| store.delete_task(id))
    }

    pub fn delete_tasks(&mut self, ids: &[String]) -> bool {
        self.apply(|store| store.delete_tasks(ids))
    }

    pub fn move_task(&mut self, id: &str, status: TaskStatus, index: usize) -> bool {
        self.apply(|store| store.move_task(id, status, index))
    }

    /// Drag-and-drop completion within the table (`status = None`) or one
    /// board column.
    pub fn reorder_tasks(
        &mut self,
        source: usize,
        destination: usize,
        status: Option<TaskStatus>,
    ) -> Result<bool> {
        self.refresh();
        match self.store.reorder_tasks(source, destination, status)? {
            Some(change) => {
                self.commit(change);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn undo(&mut self) -> Option<HistoryTag> {
        self.refresh();
        let tag = self.history.undo(&mut self.store)?;
        self.persist_tasks();
        self.notify();
        Some(tag)
    }

    pub fn redo(&mut self) -> Option<HistoryTag> {
        self.refresh();
        let tag = self.history.redo(&mut self.store)?;
        self.persist_tasks();
        self.notify();
        Some(tag)
    }

    /// Capture the current state as an undo step without changing it.
    pub fn push_state(&mut self, action: HistoryAction, affected: Option<BTreeSet<String>>) {
        self.refresh();
        self.history.push_state(&self.store, action, affected);
        self.notify();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.notify();
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub fn set_view(&mut self, view: ViewMode) {
        self.refresh();
        if self.prefs.view != view {
            self.prefs.view = view;
            self.persist_prefs();
        }
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        let page_size = Preferences::validate_page_size(page_size)?;
        self.refresh();
        if self.prefs.page_size != page_size {
            self.prefs.page_size = page_size;
            self.persist_prefs();
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn apply<F>(&mut self, mutate: F) -> bool
    where
        F: FnOnce(&mut TaskStore) -> Option<Change>,
    {
        self.refresh();
        match mutate(&mut self.store) {
            Some(change) => {
                self.commit(change);
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, change: Change) {
        self.history.record(change);
        self.persist_tasks();
        self.notify();
    }

    fn fields_changed(&mut self) {
        let state = FieldsState {
            fields: self.fields.fields().as_ref().clone(),
        };
        self.persistence.save(FIELDS_KEY, FIELDS_VERSION, &state);
        self.notify();
    }

    fn persist_tasks(&mut self) {
        let state = self.store.state();
        self.persistence.save(TASKS_KEY, TASKS_VERSION, state.as_ref());
    }

    fn persist_prefs(&mut self) {
        self.persistence.save(PREFS_KEY, PREFS_VERSION, &self.prefs);
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.subscribers.notify(&snapshot);
    }
}

fn load_fields(persistence: &mut Persistence) -> FieldRegistry {
    persistence
        .load::<FieldsState>(FIELDS_KEY, FIELDS_VERSION, &Migrations::new())
        .map(|state| FieldRegistry::from_fields(state.fields))
        .unwrap_or_default()
}

fn load_store(persistence: &mut Persistence) -> TaskStore {
    persistence
        .load::<TaskState>(TASKS_KEY, TASKS_VERSION, &persist::tasks_migrations())
        .map(TaskStore::from_state)
        .unwrap_or_default()
}

fn load_prefs(persistence: &mut Persistence, fallback: Preferences) -> Preferences {
    persistence
        .load::<Preferences>(PREFS_KEY, PREFS_VERSION, &Migrations::new())
        .unwrap_or(fallback)
}

/// A board shared across threads; every operation runs under one lock.
#[derive(Debug, Clone)]
pub struct SharedBoard {
    inner: Arc<Mutex<Board>>,
}

impl SharedBoard {
    pub fn new(board: Board) -> Self {
        Self {
            inner: Arc::new(Mutex::new(board)),
        }
    }

    /// Run `f` with exclusive access to the board.
    pub fn with<T>(&self, f: impl FnOnce(&mut Board) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.lock().snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn board_with(titles: &[&str]) -> Board {
        let mut board = Board::default();
        for title in titles {
            board.create_task(TaskDraft::new(*title)).unwrap();
        }
        board
    }

    #[test]
    fn create_validates_title() {
        let mut board = Board::default();
        assert!(board.create_task(TaskDraft::new("   ")).is_err());
        assert!(board.tasks().is_empty());
        assert!(!board.history_flags().0);
    }

    #[test]
    fn first_undo_restores_state_before_the_mutation() {
        let mut board = board_with(&["one"]);
        let before = board.tasks();
        board.create_task(TaskDraft::new("two")).unwrap();

        board.undo().unwrap();
        assert_eq!(*board.tasks(), *before);
        assert_eq!(board.history_flags(), (true, true));
    }

    #[test]
    fn load_seed_is_not_undoable_by_default() {
        let mut board = Board::default();
        board.load_seed(crate::seed::builtin_tasks());
        assert_eq!(board.tasks().len(), 8);
        assert_eq!(board.history_flags(), (false, false));
    }

    #[test]
    fn load_seed_can_be_recorded() {
        let mut config = Config::default();
        config.history.record_initial_load = true;
        let mut board = Board::in_memory(&config);
        board.load_seed(crate::seed::builtin_tasks());
        assert!(board.history_flags().0);
        board.undo();
        assert!(board.tasks().is_empty());
    }

    #[test]
    fn subscribers_fire_once_per_effective_change() {
        let mut board = board_with(&["one"]);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        board.subscribe(move |snapshot| {
            assert!(snapshot.tasks.is_consistent());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let id = board.tasks().tasks[0].id.clone();
        assert!(board.update_task(&id, &TaskPatch::new().priority(Priority::High)).unwrap());
        assert!(!board.update_task("missing", &TaskPatch::new().title("x")).unwrap());
        assert!(!board.delete_task("missing"));
        assert!(!board.reorder_tasks(0, 0, None).unwrap());
        board.undo();
        board.redo();
        board.add_field("Owner", FieldType::Text, None).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn field_removal_leaves_task_values() {
        let mut board = board_with(&["one"]);
        let field = board.add_field("Points", FieldType::Number, None).unwrap();
        let id = board.tasks().tasks[0].id.clone();
        board
            .update_task(
                &id,
                &TaskPatch::new().custom_field(field.clone(), FieldValue::Number(3.0)),
            )
            .unwrap();

        assert!(board.remove_field(&field));
        assert_eq!(
            board.task(&id).unwrap().custom_fields.get(&field),
            Some(&FieldValue::Number(3.0))
        );
    }

    #[test]
    fn state_survives_reopen_but_history_does_not() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let config = Config::default();
        {
            let mut board = Board::open(Arc::clone(&kv), &config);
            board.create_task(TaskDraft::new("persisted")).unwrap();
            board.add_field("Owner", FieldType::Text, None).unwrap();
            board.set_view(ViewMode::Table);
            board.set_page_size(25).unwrap();
        }

        let board = Board::open(kv, &config);
        assert_eq!(board.tasks().len(), 1);
        assert_eq!(board.fields().len(), 1);
        assert_eq!(board.view(), ViewMode::Table);
        assert_eq!(board.preferences().page_size, 25);
        assert_eq!(board.history_flags(), (false, false));
    }

    #[test]
    fn boards_on_one_store_keep_each_others_writes() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let config = Config::default();
        let mut a = Board::open(Arc::clone(&kv), &config);
        let mut b = Board::open(Arc::clone(&kv), &config);

        a.create_task(TaskDraft::new("from a")).unwrap();
        b.create_task(TaskDraft::new("from b")).unwrap();
        b.add_field("Owner", FieldType::Text, None).unwrap();
        a.add_field("Points", FieldType::Number, None).unwrap();

        let reopened = Board::open(kv, &config);
        let titles: Vec<_> = reopened.tasks().tasks.iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["from a", "from b"]);
        assert_eq!(reopened.fields().len(), 2);
        assert!(reopened.tasks().is_consistent());
    }

    #[test]
    fn reload_after_foreign_write_drops_history() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let config = Config::default();
        let mut a = Board::open(Arc::clone(&kv), &config);
        let mut b = Board::open(Arc::clone(&kv), &config);

        a.create_task(TaskDraft::new("first")).unwrap();
        assert!(!a.refresh());
        b.create_task(TaskDraft::new("second")).unwrap();

        assert!(a.refresh());
        assert_eq!(a.tasks().len(), 2);
        assert_eq!(a.history_flags(), (false, false));
        // undo must not resurrect a state that drops the other board's task
        assert!(a.undo().is_none());
        assert_eq!(Board::open(kv, &config).tasks().len(), 2);
    }

    #[test]
    fn non_finite_value_does_not_lose_stored_tasks() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let config = Config::default();
        let mut board = Board::open(Arc::clone(&kv), &config);
        let id = board.create_task(TaskDraft::new("one")).unwrap();
        board.create_task(TaskDraft::new("two")).unwrap();

        let err = board
            .update_task(&id, &TaskPatch::new().custom_field("f", FieldValue::Number(f64::NAN)))
            .unwrap_err();
        assert!(matches!(err, crate::Error::NonFiniteNumber { .. }));

        let reopened = Board::open(kv, &config);
        assert_eq!(reopened.tasks().len(), 2);
        assert!(reopened.task(&id).unwrap().custom_fields.is_empty());
    }

    #[test]
    fn shared_board_serializes_writers() {
        let shared = SharedBoard::new(Board::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for n in 0..10 {
                        shared.with(|board| {
                            board
                                .create_task(TaskDraft::new(format!("t{i}-{n}")))
                                .unwrap();
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.tasks.len(), 40);
        assert!(snapshot.tasks.is_consistent());
        assert!(snapshot.can_undo);
    }
}
