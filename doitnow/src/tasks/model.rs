//! The canonical task entity and the editable-field draft.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use doitnow_proto::task::{Category, NewTaskRecord, OwnerId, Priority, TaskId, title_units};

use super::ValidationError;
use super::window::local_midnight;

/// Completion lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet done.
    Pending,
    /// Done; holds the instant of completion.
    Completed(DateTime<Utc>),
}

/// A task as held by the [`TaskStore`](super::TaskStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Remote-assigned identifier, or a temporary one before the first
    /// snapshot that contains the task.
    pub id: TaskId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Trimmed, non-empty title.
    pub title: String,
    /// Category.
    pub category: Category,
    /// Priority.
    pub priority: Priority,
    /// Due instant.
    pub due_date: DateTime<Utc>,
    /// Present iff the task is completed; never earlier than `created_at`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form description.
    pub description: String,
    /// Creation instant; the primary sort key (newest first).
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.completed_at
            .map_or(TaskState::Pending, TaskState::Completed)
    }

    /// Whether the task is completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// The editable fields of this task.
    #[must_use]
    pub fn draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            category: self.category,
            priority: self.priority,
            due_date: self.due_date,
            description: self.description.clone(),
        }
    }

    /// The task's owner and editable fields in wire form.
    #[must_use]
    pub fn record(&self) -> NewTaskRecord {
        NewTaskRecord {
            owner_id: self.owner_id.clone(),
            title: self.title.clone(),
            category: self.category,
            priority: self.priority,
            due_date: format_due_date(self.due_date),
            description: self.description.clone(),
        }
    }
}

/// Display order: newest `created_at` first, ties broken by `id` ascending.
#[must_use]
pub fn newest_first(a: &Task, b: &Task) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// The user-editable fields of a task, used both for new-task requests
/// and for edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Title as typed; trimmed during validation.
    pub title: String,
    /// Category.
    pub category: Category,
    /// Priority.
    pub priority: Priority,
    /// Due instant.
    pub due_date: DateTime<Utc>,
    /// Free-form description.
    pub description: String,
}

impl TaskDraft {
    /// Validates the draft, returning it with a trimmed title.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TitleEmpty`] if the trimmed title is
    /// empty, or [`ValidationError::TitleTooLong`] if it exceeds
    /// `max_title_len` UTF-16 code units.
    pub fn validated(self, max_title_len: usize) -> Result<Self, ValidationError> {
        let title = validate_title(&self.title, max_title_len)?;
        Ok(Self { title, ..self })
    }
}

/// Trims `raw` and checks it against the title rules.
///
/// # Errors
///
/// See [`TaskDraft::validated`].
pub fn validate_title(raw: &str, max_title_len: usize) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    let len = title_units(title);
    if len > max_title_len {
        return Err(ValidationError::TitleTooLong {
            len,
            max: max_title_len,
        });
    }
    Ok(title.to_string())
}

/// Formats a due instant for the wire (ISO-8601, UTC, millisecond precision).
#[must_use]
pub fn format_due_date(due: DateTime<Utc>) -> String {
    due.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a wire or user-typed due date.
///
/// Accepts RFC 3339 instants, naive `YYYY-MM-DDTHH:MM[:SS]` date-times
/// (read in `tz`), and bare `YYYY-MM-DD` dates (local midnight in `tz`).
#[must_use]
pub fn parse_due_date<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| local_midnight(tz, date))
}
