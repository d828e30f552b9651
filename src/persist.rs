//! Versioned envelopes over a [`KvStore`].
//!
//! Each store is written as `{"state": ..., "version": N}` under its own key.
//! On load, older versions run through registered migrations one step at a
//! time. Anything that goes wrong while loading is logged and the key is
//! treated as absent; save failures are logged and the in-memory state
//! carries on.
//!
//! [`Persistence`] remembers the last body it read or wrote for each key, so
//! an owner can tell when another writer has replaced the stored state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::kv::KvStore;
use crate::model::{CustomField, Task};
use crate::store::TaskState;

pub const TASKS_KEY: &str = "task-storage";
pub const TASKS_VERSION: u32 = 1;

pub const FIELDS_KEY: &str = "custom-fields-storage";
pub const FIELDS_VERSION: u32 = 0;

pub const PREFS_KEY: &str = "taskboard-prefs";
pub const PREFS_VERSION: u32 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub state: T,
    #[serde(default)]
    pub version: u32,
}

/// Persisted shape of the field registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldsState {
    #[serde(default)]
    pub fields: Vec<CustomField>,
}

/// Upgrades raw `state` from version `from` to `from + 1`
pub type MigrationFn = fn(Value) -> std::result::Result<Value, String>;

#[derive(Debug, Clone, Default)]
pub struct Migrations {
    steps: BTreeMap<u32, MigrationFn>,
}

impl Migrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: u32, step: MigrationFn) -> Self {
        self.steps.insert(from, step);
        self
    }

    /// Run every step from `from` up to `to`.
    pub fn apply(&self, key: &str, from: u32, to: u32, mut state: Value) -> Result<Value> {
        for version in from..to {
            let step = self.steps.get(&version).ok_or_else(|| Error::Migration {
                key: key.to_string(),
                from: version,
                reason: "no migration registered".to_string(),
            })?;
            state = step(state).map_err(|reason| Error::Migration {
                key: key.to_string(),
                from: version,
                reason,
            })?;
            debug!(key, from = version, to = version + 1, "migrated stored state");
        }
        Ok(state)
    }
}

/// Migrations for the task store key
pub fn tasks_migrations() -> Migrations {
    Migrations::new().with(0, tasks_v0_to_v1)
}

/// Version 0 stored only the task list; orders are derived from it.
fn tasks_v0_to_v1(state: Value) -> std::result::Result<Value, String> {
    let tasks = match state {
        Value::Object(mut map) => map.remove("tasks").unwrap_or(Value::Array(Vec::new())),
        Value::Array(items) => Value::Array(items),
        other => return Err(format!("expected an object, found {other}")),
    };
    let tasks: Vec<Task> = serde_json::from_value(tasks).map_err(|e| e.to_string())?;
    serde_json::to_value(TaskState::from_tasks(tasks)).map_err(|e| e.to_string())
}

#[derive(Clone)]
pub struct Persistence {
    kv: Arc<dyn KvStore>,
    /// Last body read or written per key; `None` when the key was absent
    seen: HashMap<String, Option<String>>,
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistence")
            .field("seen", &self.seen.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Persistence {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            seen: HashMap::new(),
        }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Load and migrate `key`, surfacing every failure.
    pub fn try_load<T: DeserializeOwned>(
        &mut self,
        key: &str,
        version: u32,
        migrations: &Migrations,
    ) -> Result<Option<T>> {
        let raw = self.kv.get(key)?;
        self.seen.insert(key.to_string(), raw.clone());
        let Some(raw) = raw else {
            return Ok(None);
        };
        let envelope: Envelope<Value> = serde_json::from_str(&raw)?;
        if envelope.version > version {
            return Err(Error::UnsupportedVersion {
                key: key.to_string(),
                found: envelope.version,
                supported: version,
            });
        }
        let state = migrations.apply(key, envelope.version, version, envelope.state)?;
        Ok(Some(serde_json::from_value(state)?))
    }

    /// Like [`Persistence::try_load`], but failures are logged and read as absent.
    pub fn load<T: DeserializeOwned>(
        &mut self,
        key: &str,
        version: u32,
        migrations: &Migrations,
    ) -> Option<T> {
        match self.try_load(key, version, migrations) {
            Ok(state) => state,
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable stored state");
                None
            }
        }
    }

    /// Serialize and write `state`. A state that cannot be serialized fails
    /// before anything is written, so the stored body stays readable.
    pub fn try_save<T: Serialize>(&mut self, key: &str, version: u32, state: &T) -> Result<()> {
        let body = serde_json::to_string(&Envelope { state, version })?;
        self.kv.set(key, &body)?;
        self.seen.insert(key.to_string(), Some(body));
        Ok(())
    }

    /// Returns false when the write failed; the failure is only logged.
    pub fn save<T: Serialize>(&mut self, key: &str, version: u32, state: &T) -> bool {
        match self.try_save(key, version, state) {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "failed to persist state");
                false
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.kv.remove(key)?;
        self.seen.insert(key.to_string(), None);
        Ok(())
    }

    /// True when the stored body of `key` differs from the one this adapter
    /// last read or wrote. An unreadable store counts as unchanged.
    pub fn changed_since_seen(&self, key: &str) -> bool {
        match self.kv.get(key) {
            Ok(current) => self.seen.get(key) != Some(&current),
            Err(err) => {
                debug!(key, error = %err, "could not check stored state");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::model::{Priority, TaskStatus};
    use serde_json::json;

    fn persistence() -> (MemoryKv, Persistence) {
        let kv = MemoryKv::new();
        let persistence = Persistence::new(Arc::new(kv.clone()));
        (kv, persistence)
    }

    #[test]
    fn saves_envelope_with_version() {
        let (kv, mut persistence) = persistence();
        let state = TaskState::from_tasks(vec![Task::new("a", TaskStatus::Done, Priority::High)]);
        assert!(persistence.save(TASKS_KEY, TASKS_VERSION, &state));

        let raw: Value = serde_json::from_str(&kv.get(TASKS_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["state"]["boardOrders"]["done"].as_array().unwrap().len(), 1);
        assert!(raw["state"]["tableOrder"].is_array());

        let loaded: TaskState = persistence
            .load(TASKS_KEY, TASKS_VERSION, &tasks_migrations())
            .unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn unserializable_state_keeps_previous_body() {
        use crate::model::FieldValue;

        let (kv, mut persistence) = persistence();
        let task = Task::new("a", TaskStatus::Todo, Priority::Low);
        let good = TaskState::from_tasks(vec![task.clone()]);
        assert!(persistence.save(TASKS_KEY, TASKS_VERSION, &good));
        let stored = kv.get(TASKS_KEY).unwrap();

        let bad = TaskState::from_tasks(vec![
            task.with_custom_field("points", FieldValue::Number(f64::NAN))
        ]);
        assert!(!persistence.save(TASKS_KEY, TASKS_VERSION, &bad));
        assert_eq!(kv.get(TASKS_KEY).unwrap(), stored);

        let loaded: TaskState = persistence
            .load(TASKS_KEY, TASKS_VERSION, &tasks_migrations())
            .unwrap();
        assert_eq!(loaded, good);
    }

    #[test]
    fn detects_writes_from_another_adapter() {
        let (kv, mut persistence) = persistence();
        let _: Option<TaskState> = persistence.load(TASKS_KEY, TASKS_VERSION, &tasks_migrations());
        assert!(!persistence.changed_since_seen(TASKS_KEY));

        let mut other = Persistence::new(Arc::new(kv.clone()));
        other.save(TASKS_KEY, TASKS_VERSION, &TaskState::default());
        assert!(persistence.changed_since_seen(TASKS_KEY));
        assert!(!other.changed_since_seen(TASKS_KEY));

        let _: Option<TaskState> = persistence.load(TASKS_KEY, TASKS_VERSION, &tasks_migrations());
        assert!(!persistence.changed_since_seen(TASKS_KEY));
    }

    #[test]
    fn malformed_json_reads_as_absent() {
        let (kv, mut persistence) = persistence();
        kv.set(TASKS_KEY, "{not json").unwrap();
        let loaded: Option<TaskState> =
            persistence.load(TASKS_KEY, TASKS_VERSION, &tasks_migrations());
        assert!(loaded.is_none());
    }

    #[test]
    fn newer_version_is_rejected() {
        let (kv, mut persistence) = persistence();
        kv.set(FIELDS_KEY, r#"{"state":{"fields":[]},"version":7}"#)
            .unwrap();
        let err = persistence
            .try_load::<FieldsState>(FIELDS_KEY, FIELDS_VERSION, &Migrations::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { found: 7, supported: 0, .. }));
    }

    #[test]
    fn version_zero_task_state_is_migrated() {
        let (kv, mut persistence) = persistence();
        let task = Task::new("old", TaskStatus::InProgress, Priority::Low);
        let body = json!({ "state": { "tasks": [task] }, "version": 0 });
        kv.set(TASKS_KEY, &body.to_string()).unwrap();

        let loaded: TaskState = persistence
            .try_load(TASKS_KEY, TASKS_VERSION, &tasks_migrations())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.table_order, vec![task.id.clone()]);
        assert_eq!(loaded.board_orders.in_progress, vec![task.id]);
    }

    #[test]
    fn missing_migration_step_fails() {
        let (kv, mut persistence) = persistence();
        kv.set(TASKS_KEY, r#"{"state":{},"version":0}"#).unwrap();
        let err = persistence
            .try_load::<TaskState>(TASKS_KEY, TASKS_VERSION, &Migrations::new())
            .unwrap_err();
        assert!(matches!(err, Error::Migration { from: 0, .. }));
    }
}
