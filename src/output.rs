//! What tb prints.
//!
//! With `--json` every command writes one envelope to stdout:
//!
//! ```text
//! {"schema_version": "tb.v1", "command": "task add", "status": "success", "data": {...}}
//! {"schema_version": "tb.v1", "command": "task add", "status": "error", "error": {...}}
//! ```
//!
//! Otherwise the command's [`Text`] is printed. Task rows, board columns,
//! query pages and history tags are rendered here so every command shows them
//! the same way.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::history::HistoryTag;
use crate::model::{CustomField, Task, TaskStatus};
use crate::query::QueryPage;
use crate::store::TaskState;

pub const SCHEMA_VERSION: &str = "tb.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Plain-text rendering of one command result
#[derive(Debug, Clone, Default)]
pub struct Text {
    headline: String,
    body: Vec<String>,
    warnings: Vec<String>,
    hint: Option<String>,
}

impl Text {
    pub fn new(headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            ..Self::default()
        }
    }

    /// Aligned `key value` row
    pub fn row(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.body.push(format!("  {key:<9} {value}"));
        self
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.body.push(line.into());
        self
    }

    pub fn warn(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Suggested follow-up command; the last one wins.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Every attribute of one task, field values resolved against `fields`.
    pub fn task(mut self, task: &Task, fields: &[CustomField]) -> Self {
        self = self
            .row("id", &task.id)
            .row("title", &task.title)
            .row("status", task.status.label())
            .row("priority", task.priority)
            .row("created", task.created_at.to_rfc3339())
            .row("updated", task.updated_at.to_rfc3339());
        for field in fields {
            self = self.row(&field.name, task.field_value(field));
        }
        self
    }

    /// One line per task in the given order.
    pub fn tasks<'a>(
        mut self,
        tasks: impl IntoIterator<Item = &'a Task>,
        fields: &[CustomField],
    ) -> Self {
        for task in tasks {
            self.body.push(format!("  {}", task_line(task, fields)));
        }
        self
    }

    /// The kanban view: each column with its tasks numbered by position.
    pub fn columns(mut self, state: &TaskState, fields: &[CustomField]) -> Self {
        for status in TaskStatus::ALL {
            let tasks = state.column_tasks(status);
            self.body.push(format!("{} ({})", status.label(), tasks.len()));
            for (index, task) in tasks.iter().enumerate() {
                self.body.push(format!("  {index}. {}", task_line(task, fields)));
            }
        }
        self
    }

    /// One query page with its position in the result set.
    pub fn page(self, page: &QueryPage, fields: &[CustomField]) -> Self {
        let text = self.line(format!(
            "  page {}/{} of {} task(s)",
            page.page, page.pages, page.total
        ));
        text.tasks(&page.tasks, fields)
    }

    /// History entries, most recent last, prefixed with `verb`.
    pub fn tags<'a>(mut self, verb: &str, tags: impl IntoIterator<Item = &'a HistoryTag>) -> Self {
        for tag in tags {
            self.body.push(format!("  {verb} {}", tag_line(tag)));
        }
        self
    }

    pub fn render(&self) -> String {
        let mut out = self.headline.clone();
        for line in &self.body {
            out.push('\n');
            out.push_str(line);
        }
        for warning in &self.warnings {
            out.push_str("\nwarning: ");
            out.push_str(warning);
        }
        if let Some(hint) = &self.hint {
            out.push_str("\nhint: ");
            out.push_str(hint);
        }
        out
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "no_warnings")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
}

fn no_warnings(warnings: &&[String]) -> bool {
    warnings.is_empty()
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Print a successful result as an envelope or as `text`.
pub fn emit<T: Serialize>(options: OutputOptions, command: &str, data: &T, text: Text) -> Result<()> {
    if options.json {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data: Some(data),
            error: None,
            warnings: &text.warnings,
            hint: text.hint.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else if !options.quiet {
        println!("{text}");
    }
    Ok(())
}

/// Report `err`: an envelope on stdout with `--json`, otherwise stderr.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = error_hint(err);
    if json {
        let envelope: Envelope<'_, ()> = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            data: None,
            error: Some(ErrorBody {
                message: err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            }),
            warnings: &[],
            hint,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Command name for error envelopes, taken from raw arguments before clap
/// has parsed them. `task` and `field` include their subcommand.
pub fn command_name<I>(args: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut words: Vec<String> = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--data-dir" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        words.push(arg);
        let grouped = matches!(words[0].as_str(), "task" | "field");
        if !grouped || words.len() == 2 {
            break;
        }
    }
    if words.is_empty() {
        "tb".to_string()
    } else {
        words.join(" ")
    }
}

/// `id  [priority] title (Status)  Field=value ...`
pub fn task_line(task: &Task, fields: &[CustomField]) -> String {
    let mut line = format!(
        "{}  [{}] {} ({})",
        task.id,
        task.priority,
        task.title,
        task.status.label()
    );
    for field in fields {
        if let Some(value) = task.custom_fields.get(&field.id) {
            line.push_str(&format!("  {}={value}", field.name));
        }
    }
    line
}

/// `update 01abc, 01abd`
pub fn tag_line(tag: &HistoryTag) -> String {
    match &tag.affected_task_ids {
        Some(ids) if !ids.is_empty() => {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            format!("{} {}", tag.action, ids.join(", "))
        }
        _ => tag.action.to_string(),
    }
}

fn error_kind(err: &Error) -> &'static str {
    if err.is_validation() {
        "validation_error"
    } else if err.exit_code() == crate::error::exit_codes::USER_ERROR {
        "user_error"
    } else {
        "operation_failed"
    }
}

fn error_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::TaskNotFound(_) => Some("tb task list"),
        Error::FieldNotFound(_) | Error::DuplicateFieldName(_) => Some("tb field list"),
        Error::InvalidIndex { .. } => Some("tb board"),
        Error::InvalidConfig(_) => Some("fix taskboard.toml and retry"),
        Error::LockFailed(_) => Some("another tb process holds the board; retry when it exits"),
        Error::UnsupportedVersion { .. } => Some("this data directory was written by a newer tb"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::model::{FieldType, FieldValue, Priority};
    use crate::store::HistoryAction;

    fn points() -> CustomField {
        CustomField {
            id: "f1".into(),
            name: "Points".into(),
            field_type: FieldType::Number,
            default_value: FieldValue::Number(0.0),
        }
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        let mut task = Task::new(format!("Task {id}"), status, Priority::Low);
        task.id = id.into();
        task
    }

    #[test]
    fn text_renders_warnings_and_hint_last() {
        let text = Text::new("tb task rm: removed 1")
            .line("  a")
            .warn("no task with id b")
            .hint("tb task list");
        assert_eq!(
            text.render(),
            "tb task rm: removed 1\n  a\nwarning: no task with id b\nhint: tb task list"
        );
    }

    #[test]
    fn columns_number_tasks_by_position() {
        let state = TaskState::from_tasks(vec![
            task("a", TaskStatus::Todo),
            task("b", TaskStatus::Done),
            task("c", TaskStatus::Todo),
        ]);
        let rendered = Text::new("tb board").columns(&state, &[]).render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "To Do (2)");
        assert!(lines[2].starts_with("  0. a  "));
        assert!(lines[3].starts_with("  1. c  "));
        assert_eq!(lines[4], "In Progress (0)");
        assert_eq!(lines[5], "Done (1)");
    }

    #[test]
    fn tags_list_affected_ids() {
        let tags = [
            HistoryTag {
                action: HistoryAction::Delete,
                affected_task_ids: Some(BTreeSet::from(["a".to_string(), "b".to_string()])),
            },
            HistoryTag {
                action: HistoryAction::Reorder,
                affected_task_ids: None,
            },
        ];
        let rendered = Text::new("tb history").tags("undo", &tags).render();
        assert!(rendered.contains("  undo delete a, b"));
        assert!(rendered.ends_with("  undo reorder"));
    }

    #[test]
    fn task_line_lists_known_field_values() {
        let task = task("x", TaskStatus::Done)
            .with_custom_field("f1", FieldValue::Number(3.0))
            .with_custom_field("gone", FieldValue::Checkbox(true));

        let line = task_line(&task, &[points()]);
        assert!(line.contains("[low] Task x (Done)"));
        assert!(line.ends_with("Points=3"));
        assert!(!line.contains("gone"));
    }

    #[test]
    fn error_kinds_split_validation_from_lookup() {
        assert_eq!(error_kind(&Error::EmptyTitle), "validation_error");
        assert_eq!(error_kind(&Error::TaskNotFound("x".into())), "user_error");
        assert_eq!(error_kind(&Error::Seed("offline".into())), "operation_failed");
    }
}
