use crate::errors::ValidationError;
use crate::models::TaskDraft;
use std::ops::RangeInclusive;

pub const PRIORITY_MIN: i64 = 0;
pub const PRIORITY_MAX: i64 = 5;

/// Input rules the presentation layer applies before calling the store.
/// The store itself accepts anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub require_due_date: bool,
    pub priority_range: RangeInclusive<i64>,
}

impl ValidationPolicy {
    /// Rules for the quick-add bar, which insists on a due date.
    pub fn quick_add() -> Self {
        Self {
            require_due_date: true,
            ..Self::default()
        }
    }

    /// Rules for the full editor, where the due date may be cleared.
    pub fn editor() -> Self {
        Self::default()
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            require_due_date: false,
            priority_range: PRIORITY_MIN..=PRIORITY_MAX,
        }
    }
}

impl TaskDraft {
    pub fn validate(&self, policy: &ValidationPolicy) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if policy.require_due_date && self.due_date.is_none() {
            return Err(ValidationError::MissingDueDate);
        }
        if !policy.priority_range.contains(&self.priority) {
            return Err(ValidationError::PriorityOutOfRange {
                value: self.priority,
                min: *policy.priority_range.start(),
                max: *policy.priority_range.end(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_blank_title_rejected() {
        let draft = TaskDraft::new("   ");
        assert_eq!(
            draft.validate(&ValidationPolicy::editor()),
            Err(ValidationError::EmptyTitle)
        );
    }

    #[test]
    fn test_quick_add_requires_due_date() {
        let draft = TaskDraft::new("Pay rent").with_priority(2);
        assert_eq!(
            draft.validate(&ValidationPolicy::quick_add()),
            Err(ValidationError::MissingDueDate)
        );
        assert!(draft.validate(&ValidationPolicy::editor()).is_ok());

        let dated = draft.with_due_date(NaiveDate::from_ymd_opt(2024, 4, 1));
        assert!(dated.validate(&ValidationPolicy::quick_add()).is_ok());
    }

    #[test]
    fn test_priority_bounds() {
        let policy = ValidationPolicy::editor();
        assert!(TaskDraft::new("t").with_priority(0).validate(&policy).is_ok());
        assert!(TaskDraft::new("t").with_priority(5).validate(&policy).is_ok());
        assert_eq!(
            TaskDraft::new("t").with_priority(6).validate(&policy),
            Err(ValidationError::PriorityOutOfRange {
                value: 6,
                min: 0,
                max: 5
            })
        );
        assert!(TaskDraft::new("t").with_priority(-1).validate(&policy).is_err());
    }
}
