//! Seed data: raw task records from a file or URL, normalized into tasks.
//!
//! Seed sources use free-text status and priority values. Unknown values map
//! to `todo` and `medium`. Loading never fails outright: any error is logged
//! and the built-in task set is returned instead.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{SeedConfig, SeedKind};
use crate::error::{Error, Result};
use crate::model::{CustomFieldValues, Priority, Task, TaskStatus};

/// Public sample task list used when no other source is configured
pub const DEFAULT_SEED_URL: &str = "https://gist.githubusercontent.com/yangshun/7acbe005af922e43a26dea8109e16aed/raw/01df391c8320df0a37c73fdbf6b8fc7d88aae719/greatfrontend-tasks.json";

const FETCH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSource {
    Builtin,
    File(PathBuf),
    Url(String),
}

impl SeedSource {
    /// Source selected by the `[seed]` config section
    pub fn from_config(config: &SeedConfig) -> Self {
        match (config.source, &config.path) {
            (SeedKind::File, Some(path)) => SeedSource::File(path.clone()),
            (SeedKind::Url, _) => SeedSource::Url(config.url.clone()),
            _ => SeedSource::Builtin,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SeedSource::Builtin => "builtin".to_string(),
            SeedSource::File(path) => path.display().to_string(),
            SeedSource::Url(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

/// One record as it appears in seed JSON
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    pub id: RawId,
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

pub fn normalize_status(raw: &str) -> TaskStatus {
    match raw.trim().to_lowercase().as_str() {
        "completed" => TaskStatus::Done,
        "not_started" => TaskStatus::Todo,
        "in_progress" => TaskStatus::InProgress,
        _ => TaskStatus::Todo,
    }
}

pub fn normalize_priority(raw: &str) -> Priority {
    match raw.trim().to_lowercase().as_str() {
        "urgent" | "high" => Priority::High,
        "medium" => Priority::Medium,
        "low" | "none" => Priority::Low,
        _ => Priority::Medium,
    }
}

impl RawTask {
    /// Stamp with the current time and no custom field values.
    pub fn normalize(self) -> Task {
        let now = Utc::now();
        Task {
            id: self.id.into_string(),
            title: self.title,
            status: self
                .status
                .as_deref()
                .map(normalize_status)
                .unwrap_or(TaskStatus::Todo),
            priority: self
                .priority
                .as_deref()
                .map(normalize_priority)
                .unwrap_or(Priority::Medium),
            created_at: now,
            updated_at: now,
            custom_fields: CustomFieldValues::new(),
        }
    }
}

/// Parse a JSON array of raw records.
pub fn parse_seed(json: &str) -> Result<Vec<Task>> {
    let raw: Vec<RawTask> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(RawTask::normalize).collect())
}

/// The eight fallback tasks
pub fn builtin_tasks() -> Vec<Task> {
    const ROWS: [(&str, &str, TaskStatus, Priority); 8] = [
        ("1", "Complete project proposal", TaskStatus::InProgress, Priority::High),
        ("2", "Review code changes", TaskStatus::Todo, Priority::Medium),
        ("3", "Fix navigation bug", TaskStatus::Done, Priority::High),
        ("4", "Update documentation", TaskStatus::Todo, Priority::Low),
        ("5", "Design new feature mockups", TaskStatus::InProgress, Priority::Medium),
        ("6", "Set up testing environment", TaskStatus::Done, Priority::High),
        ("7", "Write unit tests", TaskStatus::Todo, Priority::Medium),
        ("8", "Optimize database queries", TaskStatus::InProgress, Priority::High),
    ];

    ROWS.iter()
        .zip(10u32..)
        .map(|(&(id, title, status, priority), hour)| {
            let at = Utc
                .with_ymd_and_hms(2024, 3, 19, hour, 0, 0)
                .single()
                .unwrap_or_else(Utc::now);
            Task {
                id: id.to_string(),
                title: title.to_string(),
                status,
                priority,
                created_at: at,
                updated_at: at,
                custom_fields: CustomFieldValues::new(),
            }
        })
        .collect()
}

/// Load tasks from `source`, surfacing any failure.
pub async fn try_load(source: &SeedSource) -> Result<Vec<Task>> {
    match source {
        SeedSource::Builtin => Ok(builtin_tasks()),
        SeedSource::File(path) => {
            let body = tokio::fs::read_to_string(path).await?;
            parse_seed(&body)
        }
        SeedSource::Url(url) => fetch(url).await,
    }
}

/// Load tasks from `source`, falling back to [`builtin_tasks`] on error.
pub async fn load(source: &SeedSource) -> Vec<Task> {
    match try_load(source).await {
        Ok(tasks) => {
            debug!(source = %source.describe(), count = tasks.len(), "seed loaded");
            tasks
        }
        Err(err) => {
            warn!(source = %source.describe(), error = %err, "seed load failed; using built-in tasks");
            builtin_tasks()
        }
    }
}

async fn fetch(url: &str) -> Result<Vec<Task>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(FETCH_TIMEOUT_MS))
        .build()
        .map_err(|err| Error::Seed(err.to_string()))?;
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|err| Error::Seed(err.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Seed(format!("{url} returned HTTP {status}")));
    }
    let raw = resp
        .json::<Vec<RawTask>>()
        .await
        .map_err(|err| Error::Seed(err.to_string()))?;
    Ok(raw.into_iter().map(RawTask::normalize).collect())
}
