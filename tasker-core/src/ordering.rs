//! Ordering policy for task lists.
//!
//! Everything here is a pure function over `Task` values so the same rules can
//! be applied to rows from the store, to cached rows in a view, or in tests
//! without a database.
//!
//! - [`compare_by_key`] / [`sort_tasks`]: the single-key orderings `list` uses.
//! - [`default_order`] / [`sort_default`]: the four-key composite ordering
//!   (priority desc, dated before undated, due asc, title asc).
//! - [`sort_by_column`] / [`ColumnSortState`]: click-to-sort on table columns.
//!
//! All sorts are stable, so rows that compare equal keep their input order.

use crate::models::{Column, SortKey, Task};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Dated before undated, then earliest first.
pub fn compare_due_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

pub fn compare_by_key(a: &Task, b: &Task, key: SortKey) -> Ordering {
    match key {
        SortKey::Priority => b
            .priority
            .cmp(&a.priority)
            .then_with(|| compare_due_dates(a.due_date, b.due_date)),
        SortKey::Title => compare_titles(&a.title, &b.title),
        SortKey::DueDate => compare_due_dates(a.due_date, b.due_date),
    }
}

pub fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    tasks.sort_by(|a, b| compare_by_key(a, b, key));
}

/// The composite "default sort" comparator.
pub fn default_order(a: &Task, b: &Task) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| compare_due_dates(a.due_date, b.due_date))
        .then_with(|| compare_titles(&a.title, &b.title))
}

pub fn sort_default(tasks: &mut [Task]) {
    tasks.sort_by(default_order);
}

/// Ascending comparison for a single display column. Missing due dates sort
/// as the latest possible date.
pub fn compare_by_column(a: &Task, b: &Task, column: Column) -> Ordering {
    match column {
        Column::Title => compare_titles(&a.title, &b.title),
        Column::Tags => compare_titles(&a.tags, &b.tags),
        Column::Priority => a.priority.cmp(&b.priority),
        Column::Completed => a.completed.cmp(&b.completed),
        Column::Due => a
            .due_date
            .unwrap_or(NaiveDate::MAX)
            .cmp(&b.due_date.unwrap_or(NaiveDate::MAX)),
    }
}

pub fn sort_by_column(tasks: &mut [Task], column: Column, descending: bool) {
    if descending {
        tasks.sort_by(|a, b| compare_by_column(b, a, column));
    } else {
        tasks.sort_by(|a, b| compare_by_column(a, b, column));
    }
}

/// Per-column direction memory for click-to-sort tables. Each click on a
/// column flips its flag; an unclicked column starts ascending, so the first
/// click sorts it descending.
#[derive(Debug, Clone, Default)]
pub struct ColumnSortState {
    descending: HashMap<Column, bool>,
}

impl ColumnSortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the direction for `column` and return the new "descending" flag.
    pub fn toggle(&mut self, column: Column) -> bool {
        let flag = self.descending.entry(column).or_insert(false);
        *flag = !*flag;
        *flag
    }

    pub fn is_descending(&self, column: Column) -> bool {
        self.descending.get(&column).copied().unwrap_or(false)
    }

    /// Register a click on `column` and re-sort `tasks` accordingly.
    pub fn click(&mut self, tasks: &mut [Task], column: Column) {
        let descending = self.toggle(column);
        sort_by_column(tasks, column, descending);
    }
}
