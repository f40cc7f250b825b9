use crate::config::ClientConfig;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};
use tasker_core::models::DUE_DATE_FORMAT;
use tasker_core::Task;

/// Start or end of a calendar event: either a whole day (`date`) or an
/// instant (`dateTime`, RFC 3339).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn all_day(date: NaiveDate) -> Self {
        Self {
            date: Some(date.format(DUE_DATE_FORMAT).to_string()),
            ..Self::default()
        }
    }

    pub fn at(instant: DateTime<Local>) -> Self {
        Self {
            date_time: Some(instant.to_rfc3339()),
            ..Self::default()
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.date.is_some()
    }
}

/// Body sent on insert and patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
}

/// Knobs for turning a task into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadOptions {
    pub title_prefix: String,
    pub default_hour: u32,
    pub default_minutes: i64,
}

impl Default for PayloadOptions {
    fn default() -> Self {
        Self {
            title_prefix: "[Task] ".to_string(),
            default_hour: 18,
            default_minutes: 60,
        }
    }
}

impl From<&ClientConfig> for PayloadOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            title_prefix: config.event_title_prefix.clone(),
            default_hour: config.default_event_hour,
            default_minutes: config.default_event_minutes,
        }
    }
}

impl EventPayload {
    /// Dated tasks become one all-day event (end exclusive). Undated tasks
    /// become a timed event today at the default hour. Never fails.
    pub fn for_task(task: &Task, options: &PayloadOptions, now: DateTime<Local>) -> Self {
        let (start, end) = match task.due_date {
            Some(due) => (
                EventTime::all_day(due),
                EventTime::all_day(due.succ_opt().unwrap_or(due)),
            ),
            None => {
                let start = default_start(now, options.default_hour);
                let end = start + Duration::minutes(options.default_minutes.max(0));
                (EventTime::at(start), EventTime::at(end))
            }
        };

        Self {
            summary: format!("{}{}", options.title_prefix, task.title),
            description: format!("{}\n\nTags: {}", task.description, task.tags),
            start,
            end,
        }
    }
}

/// Probe granularity when the default start falls into a DST gap.
const GAP_STEP_MINUTES: i64 = 15;
const GAP_SEARCH_STEPS: i64 = 12;

fn default_start(now: DateTime<Local>, hour: u32) -> DateTime<Local> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    first_valid_local(&Local, now.date_naive().and_time(time))
}

/// `naive` in `tz`; a skipped wall time moves forward to the first instant
/// that exists after the gap.
fn first_valid_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    (0..=GAP_SEARCH_STEPS)
        .find_map(|step| {
            let candidate = naive + Duration::minutes(GAP_STEP_MINUTES * step);
            tz.from_local_datetime(&candidate).earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}
