//! Task state and filtering engine.
//!
//! Holds the canonical in-memory task list ([`TaskStore`]), computes the
//! calendar windows relative to "now" ([`TimeWindows`]), derives the
//! displayed subset ([`filter`]), governs completion
//! ([`CompletionStateMachine`]) and issues new tasks ([`TaskWriter`]).

pub mod completion;
pub mod filter;
pub mod model;
pub mod store;
pub mod window;
pub mod writer;

use std::fmt;

pub use completion::CompletionStateMachine;
pub use filter::{FilterView, Selection, TimeFilter};
pub use model::{Task, TaskDraft, TaskState};
pub use store::{StoreSnapshot, TaskStore};
pub use window::{Interval, TimeWindows, WeekStart};
pub use writer::TaskWriter;

use doitnow_proto::task::TaskId;
use thiserror::Error;

use crate::remote::RemoteError;

/// Reasons a task draft is rejected before any mutation happens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Task title is empty after trimming.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Task title exceeds the maximum length.
    #[error("task title too long ({len} code units, max {max})")]
    TitleTooLong {
        /// Length of the trimmed title in UTF-16 code units.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

/// Intents that are refused on a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedAction {
    /// Removing the task.
    Delete,
    /// Editing the task's fields.
    Edit,
}

impl fmt::Display for BlockedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => write!(f, "delete"),
            Self::Edit => write!(f, "edit"),
        }
    }
}

/// Errors that can occur during task operations.
///
/// None of these are fatal; each is recoverable by a later user action or
/// by the next remote snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The draft failed validation; nothing was mutated.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No owner session exists.
    #[error("not signed in")]
    Unauthenticated,
    /// The durable append did not complete; nothing was mutated locally.
    #[error("could not save task: {0}")]
    RemoteWriteFailure(#[source] RemoteError),
    /// The subscription could not be established or reported an error.
    #[error("could not load tasks: {0}")]
    RemoteReadFailure(String),
    /// Delete or edit was attempted on a completed task.
    #[error("cannot {action} a completed task")]
    BlockedAction {
        /// The task the intent targeted.
        id: TaskId,
        /// Which intent was refused.
        action: BlockedAction,
    },
    /// Task with the given ID was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}
