//! Completion lifecycle: Pending ⇄ Completed.
//!
//! Toggling is applied to the store immediately. Delete and edit intents
//! are only honoured on pending tasks; on a completed task they are
//! refused with [`TaskError::BlockedAction`] and the store is untouched.

use chrono::{DateTime, Utc};
use doitnow_proto::task::TaskId;

use super::model::{Task, TaskDraft};
use super::store::TaskStore;
use super::{BlockedAction, TaskError};

/// Applies completion, deletion and edit intents to a [`TaskStore`].
#[derive(Debug, Clone)]
pub struct CompletionStateMachine {
    store: TaskStore,
    max_title_len: usize,
}

impl CompletionStateMachine {
    /// Creates a state machine over `store`, validating edited titles
    /// against `max_title_len` UTF-16 code units.
    #[must_use]
    pub const fn new(store: TaskStore, max_title_len: usize) -> Self {
        Self {
            store,
            max_title_len,
        }
    }

    /// Flips the task between Pending and Completed.
    ///
    /// Completing records `now` (never earlier than the task's creation);
    /// reopening clears the completion instant.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if the task is not in the store.
    pub fn toggle(&self, id: &TaskId, now: DateTime<Utc>) -> Result<Task, TaskError> {
        let task = self.store.update(id, |task| {
            task.completed_at = match task.completed_at {
                Some(_) => None,
                None => Some(now.max(task.created_at)),
            };
            Ok(())
        })?;
        tracing::debug!(task_id = %id, completed = task.is_completed(), "task toggled");
        Ok(task)
    }

    /// Removes a pending task from the store.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::BlockedAction`] if the task is completed, or
    /// [`TaskError::NotFound`] if it is not in the store.
    pub fn delete(&self, id: &TaskId) -> Result<Task, TaskError> {
        let removed = self
            .store
            .remove_checked(id, |task| ensure_pending(task, BlockedAction::Delete))
            .inspect_err(log_blocked)?;
        tracing::info!(task_id = %id, "task deleted");
        Ok(removed)
    }

    /// Opens an edit of a pending task, returning its editable fields.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::BlockedAction`] if the task is completed, or
    /// [`TaskError::NotFound`] if it is not in the store.
    pub fn begin_edit(&self, id: &TaskId) -> Result<TaskDraft, TaskError> {
        let snapshot = self.store.snapshot();
        let task = snapshot
            .get(id)
            .ok_or_else(|| TaskError::NotFound(id.clone()))?;
        ensure_pending(task, BlockedAction::Edit).inspect_err(log_blocked)?;
        Ok(task.draft())
    }

    /// Validates `draft` and writes it over the task's editable fields.
    ///
    /// The completion state is re-checked at commit time, so a task that
    /// was completed after [`begin_edit`](Self::begin_edit) is still refused.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Validation`] if the draft is invalid,
    /// [`TaskError::BlockedAction`] if the task is completed, or
    /// [`TaskError::NotFound`] if it is not in the store.
    pub fn apply_edit(&self, id: &TaskId, draft: TaskDraft) -> Result<Task, TaskError> {
        let draft = draft.validated(self.max_title_len)?;
        let task = self
            .store
            .update(id, |task| {
                ensure_pending(task, BlockedAction::Edit)?;
                task.title = draft.title;
                task.category = draft.category;
                task.priority = draft.priority;
                task.due_date = draft.due_date;
                task.description = draft.description;
                Ok(())
            })
            .inspect_err(log_blocked)?;
        tracing::info!(task_id = %id, "task edited");
        Ok(task)
    }
}

fn ensure_pending(task: &Task, action: BlockedAction) -> Result<(), TaskError> {
    if task.is_completed() {
        return Err(TaskError::BlockedAction {
            id: task.id.clone(),
            action,
        });
    }
    Ok(())
}

fn log_blocked(err: &TaskError) {
    if let TaskError::BlockedAction { id, action } = err {
        tracing::info!(task_id = %id, %action, "intent blocked on completed task");
    }
}
