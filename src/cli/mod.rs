//! Command-line interface for tb
//!
//! This module defines the CLI structure using clap derive macros.
//! Each subcommand is defined in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::board::Board;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::kv::FileKv;
use crate::lock::FileLock;
use crate::output::OutputOptions;

mod board;
mod field;
mod init;
mod seed;
mod session;
mod task;

/// tb - task board
///
/// Tasks across a table and a kanban board, with custom fields and
/// undo/redo inside interactive sessions.
#[derive(Parser, Debug)]
#[command(name = "tb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding board state and taskboard.toml
    #[arg(long, global = true, env = "TB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default taskboard.toml
    Init,

    /// Replace all tasks with seed data
    Seed {
        /// Use the built-in sample tasks
        #[arg(long, conflicts_with_all = ["file", "url"])]
        builtin: bool,

        /// Read raw task records from a JSON file
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Fetch raw task records from a URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Task commands
    #[command(subcommand)]
    Task(TaskCommands),

    /// Custom field commands
    #[command(subcommand)]
    Field(FieldCommands),

    /// Show the kanban board
    Board,

    /// Show or change the preferred view
    View {
        /// table or board
        view: Option<String>,

        /// Rows per table page
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Interactive session reading commands from stdin (undo/redo live here)
    Session,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TaskCommands {
    /// Create a task
    Add {
        title: String,

        /// todo, in_progress or done
        #[arg(long, short)]
        status: Option<String>,

        /// low, medium or high
        #[arg(long, short)]
        priority: Option<String>,

        /// Custom field value as NAME=VALUE (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// Edit a task
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, short)]
        status: Option<String>,

        #[arg(long, short)]
        priority: Option<String>,

        /// Custom field value as NAME=VALUE (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// Delete one or more tasks
    Rm {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Move a task into a board column
    Move {
        id: String,

        /// Target column
        status: String,

        /// Position in the column (defaults to the end)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Reorder the table, or one board column with --status
    Reorder {
        source: usize,
        destination: usize,

        #[arg(long, short)]
        status: Option<String>,
    },

    /// List tasks as the table view shows them
    List {
        /// Title substring
        #[arg(long)]
        title: Option<String>,

        #[arg(long, short)]
        status: Option<String>,

        #[arg(long, short)]
        priority: Option<String>,

        /// Custom field substring as NAME=TEXT (repeatable)
        #[arg(long = "where", short = 'w')]
        filters: Vec<String>,

        /// title, createdAt, status, priority or custom:<field>
        #[arg(long, default_value = "createdAt")]
        sort: String,

        /// asc or desc
        #[arg(long, default_value = "desc")]
        direction: String,

        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Defaults to the saved preference
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Show one task
    Show { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FieldCommands {
    /// Define a custom field
    Add {
        name: String,

        /// text, number or checkbox
        #[arg(long = "type", short = 't', default_value = "text")]
        field_type: String,

        #[arg(long)]
        default: Option<String>,
    },

    /// Rename or retype a field
    Edit {
        /// Field id or name
        field: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "type", short = 't')]
        field_type: Option<String>,

        #[arg(long)]
        default: Option<String>,
    },

    /// Remove a field (task values are kept)
    Rm {
        /// Field id or name
        field: String,
    },

    /// List fields
    List,
}

/// Resolved data directory, config and output flags for one invocation
pub struct Context {
    pub data_dir: PathBuf,
    pub config: Config,
    pub output: OutputOptions,
}

impl Context {
    pub fn kv(&self) -> FileKv {
        FileKv::new(&self.data_dir)
    }

    /// Lock the data directory and load the board. Keep the guard alive
    /// until the command has written its changes.
    pub fn open_board(&self) -> Result<(FileLock, Board)> {
        let kv = self.kv();
        let guard = kv.lock()?;
        Ok((guard, Board::open(Arc::new(kv), &self.config)))
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let data_dir = resolve_data_dir(self.data_dir)?;
        let ctx = Context {
            config: Config::load_from_dir(&data_dir),
            data_dir,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => init::run(&ctx),
            Commands::Seed { builtin, file, url } => seed::run(&ctx, builtin, file, url),
            Commands::Task(cmd) => {
                let (_guard, mut board) = ctx.open_board()?;
                task::run(&mut board, cmd, ctx.output)
            }
            Commands::Field(cmd) => {
                let (_guard, mut board) = ctx.open_board()?;
                field::run(&mut board, cmd, ctx.output)
            }
            Commands::Board => {
                let (_guard, board) = ctx.open_board()?;
                board::run_board(&board, ctx.output)
            }
            Commands::View { view, page_size } => {
                let (_guard, mut board) = ctx.open_board()?;
                board::run_view(&mut board, view, page_size, ctx.output)
            }
            Commands::Session => session::run(&ctx),
        }
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    ProjectDirs::from("dev", "taskboard", "taskboard")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| {
            Error::InvalidArgument(
                "could not determine a data directory; pass --data-dir".to_string(),
            )
        })
}

/// Split `NAME=VALUE`
fn split_assignment(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("expected NAME=VALUE, got '{raw}'")))
}
