//! New-task submission.
//!
//! A submission is validated, bound to the signed-in owner, appended to the
//! remote tier and, once acknowledged, echoed into the local store under
//! the id the remote assigned. The echo is only a placeholder: the next
//! snapshot containing the record replaces it through reconciliation. A
//! failed append leaves the store untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use doitnow_proto::task::{OwnerId, TaskId};

use super::model::{Task, TaskDraft};
use super::store::TaskStore;
use super::TaskError;
use crate::remote::RemoteTasks;

/// Issues new tasks against a remote backend.
#[derive(Debug)]
pub struct TaskWriter<R> {
    remote: Arc<R>,
    store: TaskStore,
    max_title_len: usize,
}

impl<R> Clone for TaskWriter<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            store: self.store.clone(),
            max_title_len: self.max_title_len,
        }
    }
}

impl<R: RemoteTasks> TaskWriter<R> {
    /// Creates a writer appending to `remote` and echoing into `store`.
    #[must_use]
    pub const fn new(remote: Arc<R>, store: TaskStore, max_title_len: usize) -> Self {
        Self {
            remote,
            store,
            max_title_len,
        }
    }

    /// Validates and persists a new pending task for `owner`.
    ///
    /// Returns the task as echoed into the store. The echo carries the
    /// remote-assigned id and creation instant.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Validation`] if the title is empty or too long
    /// - [`TaskError::Unauthenticated`] if `owner` is `None`
    /// - [`TaskError::RemoteWriteFailure`] if the append fails; the store
    ///   is not modified
    pub async fn submit(
        &self,
        owner: Option<&OwnerId>,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<Task, TaskError> {
        let draft = draft.validated(self.max_title_len)?;
        let owner = owner.ok_or(TaskError::Unauthenticated)?;

        let mut task = Task {
            id: TaskId::temporary(),
            owner_id: owner.clone(),
            title: draft.title,
            category: draft.category,
            priority: draft.priority,
            due_date: draft.due_date,
            completed_at: None,
            description: draft.description,
            created_at: now,
        };
        let ack = self.remote.append(task.record()).await.map_err(|e| {
            tracing::warn!(error = %e, title = %task.title, "task append failed");
            TaskError::RemoteWriteFailure(e)
        })?;

        task.id = ack.id;
        task.created_at = ack.created_at;
        if let Some(existing) = self.store.snapshot().get(&task.id) {
            // A snapshot carrying the record already landed.
            tracing::debug!(task_id = %task.id, "append ack arrived after snapshot");
            return Ok(existing.clone());
        }
        self.store.upsert(task.clone());
        tracing::info!(task_id = %task.id, category = %task.category, "task created");
        Ok(task)
    }
}
