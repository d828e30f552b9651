//! tb task command implementations.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::board::Board;
use crate::cli::{split_assignment, TaskCommands};
use crate::error::{Error, Result};
use crate::model::{CustomFieldValues, FieldValue, Priority, Task, TaskDraft, TaskPatch, TaskStatus};
use crate::output::{emit, OutputOptions, Text};
use crate::query::TaskQuery;

#[derive(Serialize)]
struct TaskReport<'a> {
    task: &'a Task,
}

#[derive(Serialize)]
struct RemoveReport {
    removed: Vec<String>,
    missing: Vec<String>,
}

#[derive(Serialize)]
struct ReorderReport {
    source: usize,
    destination: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<TaskStatus>,
    changed: bool,
}

pub fn run(board: &mut Board, cmd: TaskCommands, output: OutputOptions) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            title,
            status,
            priority,
            fields,
        } => {
            let mut draft = TaskDraft::new(title);
            if let Some(status) = status {
                draft = draft.status(status.parse()?);
            }
            if let Some(priority) = priority {
                draft = draft.priority(priority.parse()?);
            }
            draft.custom_fields = parse_field_values(board, &fields)?;

            let id = board.create_task(draft)?;
            let fields = board.fields();
            let task = lookup(board, &id)?;
            let text = Text::new(format!("tb task add: {}", task.title))
                .task(task, &fields)
                .hint("tb board");
            emit(output, "task add", &TaskReport { task }, text)
        }

        TaskCommands::Edit {
            id,
            title,
            status,
            priority,
            fields,
        } => {
            lookup(board, &id)?;
            let mut patch = TaskPatch::new();
            if let Some(title) = title {
                patch = patch.title(crate::model::validate_title(&title)?);
            }
            if let Some(status) = status {
                patch = patch.status(status.parse::<TaskStatus>()?);
            }
            if let Some(priority) = priority {
                patch = patch.priority(priority.parse::<Priority>()?);
            }
            let values = parse_field_values(board, &fields)?;
            if !values.is_empty() {
                patch.custom_fields = Some(values);
            }
            if patch.is_empty() {
                return Err(Error::InvalidArgument(
                    "nothing to change; pass --title, --status, --priority or --field".to_string(),
                ));
            }
            let patch = patch.touched_at(chrono::Utc::now());

            board.update_task(&id, &patch)?;
            let fields = board.fields();
            let task = lookup(board, &id)?;
            let text = Text::new(format!("tb task edit: {}", task.title)).task(task, &fields);
            emit(output, "task edit", &TaskReport { task }, text)
        }

        TaskCommands::Rm { ids } => {
            let (removed, missing): (Vec<String>, Vec<String>) =
                ids.into_iter().partition(|id| board.task(id).is_some());
            if removed.is_empty() {
                return Err(Error::TaskNotFound(missing.join(", ")));
            }
            board.delete_tasks(&removed);

            let mut text = Text::new(format!("tb task rm: removed {}", removed.len()));
            for id in &removed {
                text = text.line(format!("  {id}"));
            }
            for id in &missing {
                text = text.warn(format!("no task with id {id}"));
            }
            emit(output, "task rm", &RemoveReport { removed, missing }, text)
        }

        TaskCommands::Move { id, status, index } => {
            lookup(board, &id)?;
            let status: TaskStatus = status.parse()?;
            let index = index.unwrap_or(usize::MAX);
            board.move_task(&id, status, index);

            let task = lookup(board, &id)?;
            let position = board
                .tasks()
                .board_orders
                .column(status)
                .iter()
                .position(|entry| entry == &id)
                .unwrap_or_default();
            let text = Text::new(format!("tb task move: {}", task.title))
                .row("id", &task.id)
                .row("column", status.label())
                .row("position", position);
            emit(output, "task move", &TaskReport { task }, text)
        }

        TaskCommands::Reorder {
            source,
            destination,
            status,
        } => {
            let status = status.map(|s| s.parse::<TaskStatus>()).transpose()?;
            let changed = board.reorder_tasks(source, destination, status)?;
            let scope = status.map_or("table", |s| s.label());
            let text = if changed {
                Text::new(format!("tb task reorder: moved {source} -> {destination} in {scope}"))
            } else {
                Text::new("tb task reorder: nothing to do")
            };
            let report = ReorderReport {
                source,
                destination,
                status,
                changed,
            };
            emit(output, "task reorder", &report, text)
        }

        TaskCommands::List {
            title,
            status,
            priority,
            filters,
            sort,
            direction,
            page,
            page_size,
        } => {
            let mut custom = BTreeMap::new();
            for raw in &filters {
                let (name, needle) = split_assignment(raw)?;
                let field = board
                    .field_registry()
                    .resolve(name)
                    .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
                custom.insert(field.id.clone(), needle.to_string());
            }
            let query = TaskQuery {
                title,
                status: status.map(|s| s.parse()).transpose()?,
                priority: priority.map(|p| p.parse()).transpose()?,
                custom,
                sort: sort.parse()?,
                direction: direction.parse()?,
                page,
                page_size: page_size.unwrap_or(board.preferences().page_size).max(1),
            };
            let result = board.query(&query);

            let fields = board.fields();
            let mut text = Text::new("tb task list").page(&result, &fields);
            if result.total == 0 {
                text = text.hint("tb task add <title>");
            }
            emit(output, "task list", &result, text)
        }

        TaskCommands::Show { id } => {
            let task = lookup(board, &id)?;
            let fields = board.fields();
            let text = Text::new(format!("tb task show: {}", task.title)).task(task, &fields);
            emit(output, "task show", &TaskReport { task }, text)
        }
    }
}

fn lookup<'a>(board: &'a Board, id: &str) -> Result<&'a Task> {
    board
        .task(id)
        .ok_or_else(|| Error::TaskNotFound(id.to_string()))
}

/// Resolve `NAME=VALUE` pairs against the registry and parse by field type.
fn parse_field_values(board: &Board, raw: &[String]) -> Result<CustomFieldValues> {
    let mut values = CustomFieldValues::new();
    for entry in raw {
        let (name, value) = split_assignment(entry)?;
        let field = board
            .field_registry()
            .resolve(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        values.insert(field.id.clone(), FieldValue::parse(field.field_type, value)?);
    }
    Ok(values)
}
