use crate::errors::ValidationError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub type TaskId = i64;

/// Persisted form of a due date.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

pub const TAG_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    /// Stored due-date text that is not an ISO date, as older versions could
    /// write. `due_date` is `None` whenever this is set.
    #[serde(default)]
    pub due_date_raw: Option<String>,
    pub priority: i64,
    /// Raw comma-separated tag field, exactly as persisted.
    pub tags: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Individual labels from the tag field, trimmed, empties dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        split_tags(&self.tags)
    }

    /// Substring containment on the raw tag field, the same test the store
    /// applies when filtering ("ab" matches a task tagged "abc").
    pub fn matches_tag_filter(&self, fragment: &str) -> bool {
        self.tags.contains(fragment)
    }

    pub fn due_date_string(&self) -> Option<String> {
        self.due_date
            .map(|d| d.format(DUE_DATE_FORMAT).to_string())
    }

    /// The mutable fields of this task, for editing and resubmitting.
    pub fn draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            due_date_raw: self.due_date_raw.clone(),
            priority: self.priority,
            tags: self.tags.clone(),
        }
    }
}

/// The user-editable fields of a task. `create` takes one of these as is;
/// `update` takes one plus the completion flag and replaces every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    /// Unparsed legacy due date carried over from the stored task; written
    /// back unchanged unless a new due date is set.
    #[serde(default)]
    pub due_date_raw: Option<String>,
    pub priority: i64,
    pub tags: String,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set (or clear) the due date. Replaces any unparsed legacy value.
    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self.due_date_raw = None;
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

/// Single-key ordering selectable for `list`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortKey {
    #[default]
    DueDate,
    Priority,
    Title,
}

/// Columns of the task table that can be clicked to re-sort the visible rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Column {
    Title,
    Due,
    Priority,
    Tags,
    Completed,
}

pub fn split_tags(raw: &str) -> Vec<&str> {
    raw.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn join_tags<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(&TAG_SEPARATOR.to_string())
}

/// Parse user input into an optional due date. Blank input means no due date.
pub fn parse_due_date(input: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, DUE_DATE_FORMAT)
        .map(Some)
        .map_err(|_| ValidationError::InvalidDueDate(trimmed.to_string()))
}
