//! tb seed: replace the board with seed tasks.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::Context;
use crate::error::Result;
use crate::output::{emit, Text};
use crate::seed::{self, SeedSource};

#[derive(Serialize)]
struct SeedReport {
    source: String,
    fallback: bool,
    count: usize,
}

pub fn run(
    ctx: &Context,
    builtin: bool,
    file: Option<PathBuf>,
    url: Option<String>,
) -> Result<()> {
    let source = match (builtin, file, url) {
        (true, _, _) => SeedSource::Builtin,
        (_, Some(path), _) => SeedSource::File(path),
        (_, _, Some(url)) => SeedSource::Url(url),
        _ => match SeedSource::from_config(&ctx.config.seed) {
            SeedSource::File(path) if path.is_relative() => {
                SeedSource::File(ctx.data_dir.join(path))
            }
            other => other,
        },
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (tasks, failure) = runtime.block_on(async {
        match seed::try_load(&source).await {
            Ok(tasks) => (tasks, None),
            Err(err) => {
                tracing::warn!(source = %source.describe(), error = %err, "seed load failed; using built-in tasks");
                (seed::builtin_tasks(), Some(err))
            }
        }
    });

    let (_guard, mut board) = ctx.open_board()?;
    board.load_seed(tasks);
    let count = board.tasks().len();

    let report = SeedReport {
        source: source.describe(),
        fallback: failure.is_some(),
        count,
    };
    let mut text = Text::new(format!("tb seed: loaded {count} task(s)"))
        .row("source", &report.source)
        .hint("tb board");
    if let Some(err) = failure {
        text = text.warn(format!("{err}; used the built-in tasks instead"));
    }
    emit(ctx.output, "seed", &report, text)
}
