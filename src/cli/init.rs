//! tb init command implementation
//!
//! Creates the data directory and a default taskboard.toml.

use std::path::{Path, PathBuf};

use crate::cli::Context;
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::{emit, Text};

#[derive(serde::Serialize)]
struct InitReport {
    data_dir: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    data_dir: bool,
    config: bool,
}

pub fn run(ctx: &Context) -> Result<()> {
    let created_dir = ensure_dir(&ctx.data_dir)?;
    let created_config = ensure_config(&ctx.data_dir)?;

    let report = InitReport {
        data_dir: ctx.data_dir.clone(),
        created: InitCreated {
            data_dir: created_dir,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_dir {
        created_items.push("data dir");
    }
    if created_config {
        created_items.push(CONFIG_FILE);
    }

    let text = if created_items.is_empty() {
        Text::new("tb init: nothing to do")
    } else {
        Text::new("tb init: initialized").row("created", created_items.join(", "))
    };
    let text = text
        .row("data dir", ctx.data_dir.display())
        .hint("tb seed --builtin");
    emit(ctx.output, "init", &report, text)
}

fn ensure_config(dir: &Path) -> Result<bool> {
    let config_path = dir.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}

fn ensure_dir(path: &Path) -> Result<bool> {
    if path.exists() {
        if !path.is_dir() {
            return Err(Error::OperationFailed(format!(
                "Expected directory at {}",
                path.display()
            )));
        }
        return Ok(false);
    }

    std::fs::create_dir_all(path)?;
    Ok(true)
}
