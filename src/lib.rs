//! taskboard - task board state core
//!
//! This library provides the state core behind the tb CLI: tasks shown in a
//! table and on a kanban board, user-defined custom fields, and
//! snapshot-based undo/redo.
//!
//! # Core Concepts
//!
//! - **Task store**: the task collection plus two display orders, the table
//!   order and one order per board column, kept consistent on every change
//! - **History**: whole-state snapshots for undo and redo
//! - **Custom fields**: typed, named fields with defaults; removing one keeps
//!   values already stored on tasks
//! - **Persistence**: versioned JSON envelopes with migrations
//!
//! # Module Organization
//!
//! - `board`: the context tying stores, history, persistence and subscribers
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `taskboard.toml`
//! - `error`: Error types and result aliases
//! - `fields`: Custom field registry
//! - `history`: Undo/redo history
//! - `kv`: Key-value storage backends
//! - `lock`: File locking and atomic writes
//! - `model`: Tasks, fields and values
//! - `observe`: Change subscriptions
//! - `output`: Human and JSON output for the CLI
//! - `persist`: Versioned envelopes and migrations
//! - `prefs`: View preferences
//! - `query`: Table filtering, sorting and pagination
//! - `seed`: Seed data loading and normalization
//! - `store`: Task store and ordering invariants

pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod fields;
pub mod history;
pub mod kv;
pub mod lock;
pub mod model;
pub mod observe;
pub mod output;
pub mod persist;
pub mod prefs;
pub mod query;
pub mod seed;
pub mod store;

pub use board::{Board, SharedBoard};
pub use error::{Error, Result};
