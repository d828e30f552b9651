use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use taskboard::config::Config;
use taskboard::kv::{FileKv, KvStore};
use taskboard::model::{FieldType, FieldValue, Priority, Task, TaskDraft, TaskStatus};
use taskboard::persist::{TASKS_KEY, TASKS_VERSION};
use taskboard::prefs::ViewMode;
use taskboard::Board;

fn file_board(dir: &std::path::Path) -> Board {
    Board::open(Arc::new(FileKv::new(dir)), &Config::default())
}

fn read_envelope(dir: &std::path::Path, key: &str) -> Value {
    let raw = fs::read_to_string(dir.join(format!("{key}.json"))).expect("stored key");
    serde_json::from_str(&raw).expect("json")
}

#[test]
fn every_mutation_is_written_through() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut board = file_board(dir.path());

    let id = board.create_task(TaskDraft::new("Persist me")).unwrap();
    let stored = read_envelope(dir.path(), TASKS_KEY);
    assert_eq!(stored["version"], TASKS_VERSION);
    assert_eq!(stored["state"]["tasks"][0]["id"], id.as_str());
    assert_eq!(stored["state"]["boardOrders"]["todo"][0], id.as_str());

    board.undo().unwrap();
    let stored = read_envelope(dir.path(), TASKS_KEY);
    assert!(stored["state"]["tasks"].as_array().unwrap().is_empty());
}

#[test]
fn reopen_restores_tasks_fields_and_preferences() {
    let dir = tempfile::tempdir().expect("tempdir");
    let field_id;
    {
        let mut board = file_board(dir.path());
        field_id = board
            .add_field("Done?", FieldType::Checkbox, Some(FieldValue::Checkbox(true)))
            .unwrap();
        board
            .create_task(
                TaskDraft::new("With field")
                    .status(TaskStatus::InProgress)
                    .custom_field(field_id.clone(), FieldValue::Checkbox(false)),
            )
            .unwrap();
        board.set_view(ViewMode::Table);
    }

    let stored = read_envelope(dir.path(), "custom-fields-storage");
    assert_eq!(stored["version"], 0);
    assert_eq!(stored["state"]["fields"][0]["type"], "checkbox");
    assert_eq!(stored["state"]["fields"][0]["defaultValue"], true);

    let board = file_board(dir.path());
    assert_eq!(board.fields()[0].id, field_id);
    let state = board.tasks();
    assert_eq!(state.board_orders.in_progress.len(), 1);
    assert_eq!(
        state.tasks[0].custom_fields.get(&field_id),
        Some(&FieldValue::Checkbox(false))
    );
    assert_eq!(board.view(), ViewMode::Table);
    assert_eq!(board.history_flags(), (false, false));
}

#[test]
fn corrupt_storage_is_treated_as_absent() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("task-storage.json"), "{\"state\": [").unwrap();
    fs::write(dir.path().join("custom-fields-storage.json"), "null").unwrap();
    fs::write(
        dir.path().join("taskboard-prefs.json"),
        r#"{"state":{"view":"table"},"version":99}"#,
    )
    .unwrap();

    let mut board = file_board(dir.path());
    assert!(board.tasks().is_empty());
    assert!(board.fields().is_empty());
    assert_eq!(board.view(), ViewMode::Board);

    // the board keeps working and overwrites the bad file
    board.create_task(TaskDraft::new("fresh")).unwrap();
    assert_eq!(read_envelope(dir.path(), TASKS_KEY)["state"]["tasks"][0]["title"], "fresh");
}

#[test]
fn inconsistent_orders_are_repaired_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut a = Task::new("a", TaskStatus::Todo, Priority::Low);
    a.id = "a".into();
    let mut b = Task::new("b", TaskStatus::Done, Priority::Low);
    b.id = "b".into();
    let body = json!({
        "state": {
            "tasks": [a, b],
            "tableOrder": ["b", "ghost"],
            "boardOrders": { "todo": ["b"], "in_progress": [], "done": [] }
        },
        "version": 1
    });
    FileKv::new(dir.path())
        .set(TASKS_KEY, &body.to_string())
        .unwrap();

    let board = file_board(dir.path());
    let state = board.tasks();
    assert!(state.is_consistent(), "{:?}", state.invariant_violations());
    assert_eq!(state.table_order, vec!["b".to_string(), "a".to_string()]);
    assert_eq!(state.board_orders.todo, vec!["a".to_string()]);
    assert_eq!(state.board_orders.done, vec!["b".to_string()]);
}

#[test]
fn version_zero_state_is_migrated_on_open() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut task = Task::new("legacy", TaskStatus::Done, Priority::High);
    task.id = "legacy".into();
    let body = json!({ "state": { "tasks": [task] }, "version": 0 });
    fs::write(dir.path().join("task-storage.json"), body.to_string()).unwrap();

    let board = file_board(dir.path());
    let state = board.tasks();
    assert_eq!(state.table_order, vec!["legacy".to_string()]);
    assert_eq!(state.board_orders.done, vec!["legacy".to_string()]);
}

#[test]
fn save_failures_do_not_block_mutations() {
    let dir = tempfile::tempdir().expect("tempdir");
    // a directory where the data file should go makes every write fail
    fs::create_dir_all(dir.path().join("task-storage.json")).unwrap();

    let mut board = file_board(dir.path());
    board.create_task(TaskDraft::new("in memory only")).unwrap();
    assert_eq!(board.tasks().len(), 1);
    assert!(board.history_flags().0);
}
