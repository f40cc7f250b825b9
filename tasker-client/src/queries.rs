use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tasker_core::models::DUE_DATE_FORMAT;
use tasker_core::{Task, TaskDraft, TaskId, TaskerError, TaskerResult};

/// Timestamp text layout. Matches SQLite's CURRENT_TIMESTAMP plus milliseconds;
/// rows written by CURRENT_TIMESTAMP (no fraction) parse with the same pattern.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// SQL queries for the task store and the sync mapping store
pub struct Queries;

impl Queries {
    // Task queries
    pub const INSERT_TASK: &'static str = r#"
        INSERT INTO tasks (
            title, description, due_date, priority, tags, completed,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
    "#;

    pub const UPDATE_TASK: &'static str = r#"
        UPDATE tasks
        SET title = ?1, description = ?2, due_date = ?3, priority = ?4,
            tags = ?5, completed = ?6, updated_at = ?7
        WHERE id = ?8
    "#;

    pub const DELETE_TASK: &'static str = "DELETE FROM tasks WHERE id = ?1";

    pub const GET_TASK: &'static str = r#"
        SELECT id, title, description, due_date, priority, tags, completed,
               created_at, updated_at
        FROM tasks
        WHERE id = ?1
    "#;

    /// ?1 = show_completed, ?2 = tag fragment or NULL.
    /// `instr` keeps the tag match case-sensitive, unlike LIKE.
    pub const LIST_TASKS: &'static str = r#"
        SELECT id, title, description, due_date, priority, tags, completed,
               created_at, updated_at
        FROM tasks
        WHERE (?1 OR completed = 0)
          AND (?2 IS NULL OR instr(COALESCE(tags, ''), ?2) > 0)
        ORDER BY id ASC
    "#;

    pub const COUNT_TASKS: &'static str = "SELECT COUNT(*) FROM tasks";

    // Sync mapping queries
    pub const UPSERT_MAPPING: &'static str =
        "INSERT OR REPLACE INTO gc_mapping (task_id, gc_event_id) VALUES (?1, ?2)";

    pub const GET_MAPPING: &'static str = "SELECT gc_event_id FROM gc_mapping WHERE task_id = ?1";

    pub const DELETE_MAPPING: &'static str = "DELETE FROM gc_mapping WHERE task_id = ?1";
}

/// Helper functions for row decoding and parameter encoding
pub struct DbHelpers;

impl DbHelpers {
    pub fn format_timestamp(ts: DateTime<Utc>) -> String {
        ts.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_PARSE_FORMAT)
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
    }

    pub fn format_due_date(due: Option<NaiveDate>) -> Option<String> {
        due.map(|d| d.format(DUE_DATE_FORMAT).to_string())
    }

    /// Column value for a draft: the ISO date, else any legacy text it carried.
    pub fn stored_due_date(draft: &TaskDraft) -> Option<String> {
        Self::format_due_date(draft.due_date).or_else(|| draft.due_date_raw.clone())
    }

    /// The stored text when it did not parse as a date, so rewrites keep it.
    pub fn unparsed_due_date(parsed: Option<NaiveDate>, raw: Option<String>) -> Option<String> {
        match parsed {
            Some(_) => None,
            None => raw.filter(|r| !r.trim().is_empty()),
        }
    }

    /// Legacy rows may carry an empty string instead of NULL; both mean "no due date".
    pub fn parse_due_date(id: TaskId, raw: Option<String>) -> Option<NaiveDate> {
        let raw = raw?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(trimmed, DUE_DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::warn!(
                    "DATABASE: Task {} has unparseable due date {:?}: {}",
                    id,
                    trimmed,
                    e
                );
                None
            }
        }
    }

    /// Decode a task row selected with the column list used by GET_TASK / LIST_TASKS
    pub fn parse_task(row: &SqliteRow) -> TaskerResult<Task> {
        let id: i64 = row.try_get("id")?;
        let title: Option<String> = row.try_get("title")?;
        let description: Option<String> = row.try_get("description")?;
        let due_date: Option<String> = row.try_get("due_date")?;
        let priority: Option<i64> = row.try_get("priority")?;
        let tags: Option<String> = row.try_get("tags")?;
        let completed: Option<i64> = row.try_get("completed")?;
        let created_at: Option<String> = row.try_get("created_at")?;
        let updated_at: Option<String> = row.try_get("updated_at")?;

        let parsed_due = Self::parse_due_date(id, due_date.clone());

        Ok(Task {
            id,
            title: title.unwrap_or_default(),
            description: description.unwrap_or_default(),
            due_date: parsed_due,
            due_date_raw: Self::unparsed_due_date(parsed_due, due_date),
            priority: priority.unwrap_or(0),
            tags: tags.unwrap_or_default(),
            completed: completed.unwrap_or(0) != 0,
            created_at: Self::require_timestamp(id, "created_at", created_at)?,
            updated_at: Self::require_timestamp(id, "updated_at", updated_at)?,
        })
    }

    fn require_timestamp(
        id: TaskId,
        column: &str,
        raw: Option<String>,
    ) -> TaskerResult<DateTime<Utc>> {
        let raw = raw.ok_or_else(|| TaskerError::CorruptRecord {
            id,
            reason: format!("{} is NULL", column),
        })?;
        Self::parse_timestamp(&raw).ok_or_else(|| TaskerError::CorruptRecord {
            id,
            reason: format!("{} has unrecognised timestamp {:?}", column, raw),
        })
    }
}
