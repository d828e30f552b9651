//! Task and custom field entities.
//!
//! Serialized names follow the persisted layout (`createdAt`, `customFields`,
//! `defaultValue`, status values `todo` / `in_progress` / `done`) so stored
//! state stays readable by other clients of the same storage key.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Board column a task lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// All statuses in board column order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Column heading
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(Error::InvalidArgument(format!(
                "invalid status '{other}' (expected todo|in_progress|done)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::InvalidArgument(format!(
                "invalid priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

/// Declared type of a custom field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Checkbox,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Checkbox => "checkbox",
        }
    }

    /// Value a new field of this type starts with when no default is given
    pub fn zero_value(self) -> FieldValue {
        match self {
            FieldType::Text => FieldValue::Text(String::new()),
            FieldType::Number => FieldValue::Number(0.0),
            FieldType::Checkbox => FieldValue::Checkbox(false),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "checkbox" => Ok(FieldType::Checkbox),
            other => Err(Error::InvalidArgument(format!(
                "invalid field type '{other}' (expected text|number|checkbox)"
            ))),
        }
    }
}

/// A custom field value; stored as a bare JSON string, number or bool.
///
/// JSON has no NaN or infinity, so only finite numbers can be stored.
/// Serializing a non-finite number is an error rather than a silent `null`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Checkbox(bool),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Number(_) => FieldType::Number,
            FieldValue::Checkbox(_) => FieldType::Checkbox,
        }
    }

    pub fn matches(&self, field_type: FieldType) -> bool {
        self.field_type() == field_type
    }

    /// False for NaN and infinite numbers.
    pub fn is_storable(&self) -> bool {
        match self {
            FieldValue::Number(n) => n.is_finite(),
            _ => true,
        }
    }

    pub(crate) fn check_storable(&self, field: &str) -> Result<()> {
        if self.is_storable() {
            Ok(())
        } else {
            Err(Error::NonFiniteNumber {
                field: field.to_string(),
            })
        }
    }

    /// Parse user input for a field of the given type
    pub fn parse(field_type: FieldType, raw: &str) -> Result<Self> {
        match field_type {
            FieldType::Text => Ok(FieldValue::Text(raw.to_string())),
            FieldType::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(FieldValue::Number)
                .ok_or_else(|| Error::InvalidArgument(format!("not a number: '{raw}'"))),
            FieldType::Checkbox => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(FieldValue::Checkbox(true)),
                "false" | "no" | "0" | "off" => Ok(FieldValue::Checkbox(false)),
                _ => Err(Error::InvalidArgument(format!(
                    "not a checkbox value: '{raw}' (expected true|false)"
                ))),
            },
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            FieldValue::Number(n) => Err(serde::ser::Error::custom(format!(
                "non-finite number {n} cannot be stored"
            ))),
            FieldValue::Checkbox(checked) => serializer.serialize_bool(*checked),
        }
    }
}

/// Reject any value in `values` that cannot be stored.
pub(crate) fn check_values(values: &CustomFieldValues) -> Result<()> {
    values
        .iter()
        .try_for_each(|(field, value)| value.check_storable(field))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Checkbox(checked) => write!(f, "{checked}"),
        }
    }
}

/// Values keyed by custom field id
pub type CustomFieldValues = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// May reference fields that have since been removed
    #[serde(default)]
    pub custom_fields: CustomFieldValues,
}

impl Task {
    /// Build a task with a fresh id and current timestamps.
    ///
    /// The title is taken as given; form-level validation lives in
    /// [`TaskDraft`].
    pub fn new(title: impl Into<String>, status: TaskStatus, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id: new_task_id(),
            title: title.into(),
            status,
            priority,
            created_at: now,
            updated_at: now,
            custom_fields: CustomFieldValues::new(),
        }
    }

    pub fn with_custom_field(mut self, field_id: impl Into<String>, value: FieldValue) -> Self {
        self.custom_fields.insert(field_id.into(), value);
        self
    }

    /// Stored value for `field`, or the field's default when unset.
    pub fn field_value(&self, field: &CustomField) -> FieldValue {
        self.custom_fields
            .get(&field.id)
            .cloned()
            .unwrap_or_else(|| field.default_value.clone())
    }
}

/// Partial update for a task; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Shallow-merged into the existing values
    pub custom_fields: Option<CustomFieldValues>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn touched_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn custom_field(mut self, field_id: impl Into<String>, value: FieldValue) -> Self {
        self.custom_fields
            .get_or_insert_with(CustomFieldValues::new)
            .insert(field_id.into(), value);
        self
    }

    /// Fails when a custom field value cannot be stored.
    pub fn check(&self) -> Result<()> {
        match &self.custom_fields {
            Some(values) => check_values(values),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.updated_at.is_none()
            && self.custom_fields.is_none()
    }

    pub(crate) fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(updated_at) = self.updated_at {
            task.updated_at = updated_at;
        }
        if let Some(values) = &self.custom_fields {
            for (key, value) in values {
                task.custom_fields.insert(key.clone(), value.clone());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub default_value: FieldValue,
}

/// Partial update for a custom field definition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub field_type: Option<FieldType>,
    pub default_value: Option<FieldValue>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.field_type.is_none() && self.default_value.is_none()
    }
}

/// Trim a title and reject it when nothing is left.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

pub fn new_task_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// Input collected by a create form, validated before it reaches the store.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub custom_fields: CustomFieldValues,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            custom_fields: CustomFieldValues::new(),
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn custom_field(mut self, field_id: impl Into<String>, value: FieldValue) -> Self {
        self.custom_fields.insert(field_id.into(), value);
        self
    }

    /// Validate and stamp the draft with an id and timestamps.
    pub fn into_task(self) -> Result<Task> {
        let title = validate_title(&self.title)?;
        check_values(&self.custom_fields)?;
        let mut task = Task::new(title, self.status, self.priority);
        task.custom_fields = self.custom_fields;
        Ok(task)
    }
}
