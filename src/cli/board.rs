//! tb board and tb view.

use serde::Serialize;

use crate::board::Board;
use crate::error::Result;
use crate::model::{Task, TaskStatus};
use crate::output::{emit, OutputOptions, Text};
use crate::prefs::{Preferences, ViewMode};

#[derive(Serialize)]
struct Column<'a> {
    status: TaskStatus,
    tasks: Vec<&'a Task>,
}

#[derive(Serialize)]
struct BoardReport<'a> {
    columns: Vec<Column<'a>>,
}

pub fn run_board(board: &Board, output: OutputOptions) -> Result<()> {
    let state = board.tasks();
    let fields = board.fields();
    let columns: Vec<Column<'_>> = TaskStatus::ALL
        .iter()
        .map(|&status| Column {
            status,
            tasks: state.column_tasks(status),
        })
        .collect();

    let mut text =
        Text::new(format!("tb board: {} task(s)", state.len())).columns(&state, &fields);
    if state.is_empty() {
        text = text.hint("tb seed --builtin");
    }
    emit(output, "board", &BoardReport { columns }, text)
}

pub fn run_view(
    board: &mut Board,
    view: Option<String>,
    page_size: Option<usize>,
    output: OutputOptions,
) -> Result<()> {
    if let Some(view) = view {
        board.set_view(view.parse::<ViewMode>()?);
    }
    if let Some(page_size) = page_size {
        board.set_page_size(page_size)?;
    }

    let prefs: Preferences = board.preferences();
    let text = Text::new(format!("tb view: {}", prefs.view)).row("page size", prefs.page_size);
    emit(output, "view", &prefs, text)
}
