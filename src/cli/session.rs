//! tb session: line-oriented interactive mode.
//!
//! History lives in process memory, so undo/redo only exist here. Each line
//! is parsed with the same clap definitions as the one-shot commands, plus
//! `undo`, `redo`, `history` and `exit`. Errors are reported and the session
//! keeps going.
//!
//! The data directory is locked only while a line runs, so one-shot `tb`
//! commands can interleave. Changes they make are picked up before the next
//! line, at the cost of the undo history.

use std::io::{self, BufRead, Write};

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::board::Board;
use crate::cli::{board, field, task, Context, FieldCommands, TaskCommands};
use crate::error::{Error, Result};
use crate::history::HistoryTag;
use crate::output::{emit, emit_error, tag_line, OutputOptions, Text};

#[derive(Parser, Debug)]
#[command(name = "session", no_binary_name = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    #[command(subcommand)]
    Task(TaskCommands),

    #[command(subcommand)]
    Field(FieldCommands),

    /// Show the kanban board
    Board,

    /// Undo the last change
    Undo,

    /// Redo the last undone change
    Redo,

    /// Show undo and redo stacks
    History,

    /// Leave the session
    #[command(alias = "quit")]
    Exit,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StepReport<'a> {
    applied: Option<&'a HistoryTag>,
    can_undo: bool,
    can_redo: bool,
}

#[derive(Serialize)]
struct HistoryReport<'a> {
    past: Vec<&'a HistoryTag>,
    future: Vec<&'a HistoryTag>,
    limit: usize,
}

pub fn run(ctx: &Context) -> Result<()> {
    let kv = ctx.kv();
    let (guard, mut board) = ctx.open_board()?;
    drop(guard);
    let stdin = io::stdin();
    let interactive = !ctx.output.json && !ctx.output.quiet;

    if interactive {
        prompt()?;
    }
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            if interactive {
                prompt()?;
            }
            continue;
        }

        let result = kv.lock().and_then(|_guard| {
            if board.refresh() && interactive {
                eprintln!("tb: board changed outside this session; reloaded, undo history cleared");
            }
            execute(&mut board, trimmed, ctx.output)
        });
        match result {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                let command = trimmed.split_whitespace().next().unwrap_or("session");
                let _ = emit_error(command, &err, ctx.output.json);
            }
        }
        if interactive {
            prompt()?;
        }
    }
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "tb> ")?;
    stdout.flush()?;
    Ok(())
}

/// Returns false when the session should end.
fn execute(board: &mut Board, line: &str, output: OutputOptions) -> Result<bool> {
    let words = split_words(line)?;
    let parsed = match SessionLine::try_parse_from(&words) {
        Ok(parsed) => parsed,
        Err(err) => {
            // help and usage errors are printed verbatim
            let _ = err.print();
            return Ok(true);
        }
    };

    match parsed.command {
        SessionCommand::Task(cmd) => task::run(board, cmd, output)?,
        SessionCommand::Field(cmd) => field::run(board, cmd, output)?,
        SessionCommand::Board => board::run_board(board, output)?,
        SessionCommand::Undo => {
            let tag = board.undo();
            report_step(board, "undo", tag.as_ref(), output)?;
        }
        SessionCommand::Redo => {
            let tag = board.redo();
            report_step(board, "redo", tag.as_ref(), output)?;
        }
        SessionCommand::History => {
            let history = board.history();
            let report = HistoryReport {
                past: history.past_tags().collect(),
                future: history.future_tags().collect(),
                limit: history.limit(),
            };
            let text = Text::new(format!(
                "tb history: {} undo, {} redo",
                report.past.len(),
                report.future.len()
            ))
            .tags("undo", report.past.iter().copied())
            .tags("redo", report.future.iter().copied());
            emit(output, "history", &report, text)?;
        }
        SessionCommand::Exit => return Ok(false),
    }
    Ok(true)
}

fn report_step(
    board: &Board,
    command: &str,
    tag: Option<&HistoryTag>,
    output: OutputOptions,
) -> Result<()> {
    let (can_undo, can_redo) = board.history_flags();
    let text = match tag {
        Some(tag) => Text::new(format!("tb {command}: {}", tag_line(tag))),
        None => Text::new(format!("tb {command}: nothing to {command}")),
    };
    let report = StepReport {
        applied: tag,
        can_undo,
        can_redo,
    };
    emit(output, command, &report, text)
}

/// Split a line into words, honouring single quotes, double quotes and
/// backslash escapes.
fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| Error::InvalidArgument("trailing backslash".to_string()))?;
                current.push(escaped);
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::InvalidArgument("unterminated quote".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_words_handles_quotes_and_escapes() {
        assert_eq!(
            split_words(r#"task add "Write docs" -f 'Owner=Ann Lee' a\ b"#).unwrap(),
            vec!["task", "add", "Write docs", "-f", "Owner=Ann Lee", "a b"]
        );
        assert_eq!(split_words(r#"task add """#).unwrap(), vec!["task", "add", ""]);
        assert!(split_words("task add \"open").is_err());
    }

    #[test]
    fn session_lines_drive_undo_and_redo() {
        let mut board = Board::default();
        let quiet = OutputOptions {
            json: false,
            quiet: true,
        };

        assert!(execute(&mut board, "task add 'First task'", quiet).unwrap());
        assert!(execute(&mut board, "task add Second", quiet).unwrap());
        assert_eq!(board.tasks().len(), 2);

        execute(&mut board, "undo", quiet).unwrap();
        assert_eq!(board.tasks().len(), 1);
        assert_eq!(board.tasks().tasks[0].title, "First task");

        execute(&mut board, "redo", quiet).unwrap();
        assert_eq!(board.tasks().len(), 2);

        assert!(!execute(&mut board, "exit", quiet).unwrap());
    }

    #[test]
    fn session_errors_do_not_mutate() {
        let mut board = Board::default();
        let quiet = OutputOptions {
            json: false,
            quiet: true,
        };
        let err = execute(&mut board, "task add '   '", quiet).unwrap_err();
        assert!(matches!(err, Error::EmptyTitle));
        assert!(execute(&mut board, "task reorder 0 1", quiet).is_err());
        assert!(board.tasks().is_empty());
    }
}
