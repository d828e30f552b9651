mod support;

use predicates::prelude::*;
use predicates::str::contains;
use support::TestBoard;
use taskboard::output::command_name;

fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|arg| arg.to_string()).collect()
}

#[test]
fn command_name_keeps_task_and_field_subcommands() {
    assert_eq!(command_name(args(&["--json", "task", "add", "x"])), "task add");
    assert_eq!(command_name(args(&["--data-dir", "task", "field", "rm", "a"])), "field rm");
    assert_eq!(command_name(args(&["board", "--quiet"])), "board");
    assert_eq!(command_name(args(&["--json"])), "tb");
}

#[test]
fn board_prints_columns_in_order() {
    let board = TestBoard::new();
    board.json(&["seed", "--builtin"]);

    board
        .tb()
        .arg("board")
        .assert()
        .success()
        .stdout(contains("tb board: 8 task(s)"))
        .stdout(contains("To Do (3)\n  0. 2  [medium] Review code changes (To Do)"))
        .stdout(contains("In Progress (3)"))
        .stdout(contains("Done (2)"));
}

#[test]
fn empty_board_suggests_seeding() {
    let board = TestBoard::new();
    board
        .tb()
        .arg("board")
        .assert()
        .success()
        .stdout(contains("hint: tb seed --builtin"));
}

#[test]
fn json_envelope_carries_partial_removal_warnings() {
    let board = TestBoard::new();
    board.json(&["seed", "--builtin"]);
    let assert = board
        .tb()
        .args(["--json", "task", "rm", "1", "nope"])
        .assert()
        .success();
    let envelope: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("json envelope");
    assert_eq!(envelope["command"], "task rm");
    assert_eq!(envelope["warnings"][0], "no task with id nope");
    assert_eq!(envelope["data"]["removed"][0], "1");
    assert_eq!(envelope["data"]["missing"][0], "nope");
}

#[test]
fn quiet_prints_nothing_on_success() {
    let board = TestBoard::new();
    board
        .tb()
        .args(["--quiet", "task", "add", "silent"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn session_undo_names_the_reverted_change() {
    let board = TestBoard::new();
    board.json(&["seed", "--builtin"]);

    board
        .tb()
        .arg("session")
        .write_stdin("task rm 3\nhistory\nundo\nredo\nundo\nundo\nexit\n")
        .assert()
        .success()
        .stdout(contains("tb history: 1 undo, 0 redo\n  undo delete 3"))
        .stdout(contains("tb undo: delete 3"))
        .stdout(contains("tb redo: delete 3"))
        .stdout(contains("tb undo: nothing to undo"));
}
