//! Table view read model: filter, sort and paginate tasks.
//!
//! Runs over tasks in table order and never mutates the store. Sorting is
//! stable, so ties keep their table order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{CustomField, Priority, Task, TaskStatus};
use crate::prefs::DEFAULT_PAGE_SIZE;
use crate::store::TaskState;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SortKey {
    Title,
    #[default]
    CreatedAt,
    Status,
    Priority,
    /// Custom field id
    Custom(String),
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(id) = s
            .strip_prefix("custom:")
            .or_else(|| s.strip_prefix("customFields."))
        {
            return Ok(SortKey::Custom(id.to_string()));
        }
        match s.to_lowercase().replace('-', "_").as_str() {
            "title" => Ok(SortKey::Title),
            "createdat" | "created_at" | "created" => Ok(SortKey::CreatedAt),
            "status" => Ok(SortKey::Status),
            "priority" => Ok(SortKey::Priority),
            other => Err(Error::InvalidArgument(format!("unknown sort column '{other}'"))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Title => f.write_str("title"),
            SortKey::CreatedAt => f.write_str("createdAt"),
            SortKey::Status => f.write_str("status"),
            SortKey::Priority => f.write_str("priority"),
            SortKey::Custom(id) => write!(f, "custom:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(Error::InvalidArgument(format!(
                "unknown direction '{other}' (expected asc or desc)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskQuery {
    /// Case-insensitive substring of the title
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    /// Case-insensitive substring per custom field id
    pub custom: BTreeMap<String, String>,
    pub sort: SortKey,
    pub direction: Direction,
    /// 1-based
    pub page: usize,
    pub page_size: usize,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            title: None,
            status: None,
            priority: None,
            custom: BTreeMap::new(),
            sort: SortKey::default(),
            direction: Direction::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub tasks: Vec<Task>,
    /// Matches across all pages
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

impl TaskQuery {
    pub fn run(&self, state: &TaskState, fields: &[CustomField]) -> QueryPage {
        let title = self.title.as_ref().map(|t| t.to_lowercase());
        let custom: Vec<(Option<&CustomField>, &str, String)> = self
            .custom
            .iter()
            .filter(|(_, needle)| !needle.is_empty())
            .map(|(id, needle)| {
                (
                    fields.iter().find(|field| &field.id == id),
                    id.as_str(),
                    needle.to_lowercase(),
                )
            })
            .collect();

        let mut matched: Vec<&Task> = state
            .table_tasks()
            .into_iter()
            .filter(|task| {
                title
                    .as_ref()
                    .map_or(true, |needle| task.title.to_lowercase().contains(needle))
            })
            .filter(|task| self.status.map_or(true, |status| task.status == status))
            .filter(|task| self.priority.map_or(true, |priority| task.priority == priority))
            .filter(|task| {
                custom.iter().all(|(field, id, needle)| {
                    custom_text(task, *field, id).to_lowercase().contains(needle)
                })
            })
            .collect();

        matched.sort_by(|a, b| {
            let ordering = self.compare(a, b, fields);
            match self.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });

        let page_size = self.page_size.max(1);
        let total = matched.len();
        let pages = total.div_ceil(page_size).max(1);
        let page = self.page.clamp(1, pages);
        let tasks = matched
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        QueryPage {
            tasks,
            total,
            page,
            pages,
        }
    }

    fn compare(&self, a: &Task, b: &Task, fields: &[CustomField]) -> Ordering {
        match &self.sort {
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
            SortKey::Priority => a.priority.as_str().cmp(b.priority.as_str()),
            SortKey::Custom(id) => {
                let field = fields.iter().find(|field| &field.id == id);
                custom_text(a, field, id).cmp(&custom_text(b, field, id))
            }
        }
    }
}

/// Stored value, else the field default, else empty.
fn custom_text(task: &Task, field: Option<&CustomField>, id: &str) -> String {
    match (task.custom_fields.get(id), field) {
        (Some(value), _) => value.to_string(),
        (None, Some(field)) => field.default_value.to_string(),
        (None, None) => String::new(),
    }
}
