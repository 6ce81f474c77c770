//! The canonical, process-local task list.
//!
//! `TaskStore` is a cheaply cloneable handle. Every mutation is applied
//! under a write lock and published as one new immutable snapshot, so
//! readers never observe a partial update. Each mutation also bumps a
//! revision number broadcast over a [`watch`] channel for downstream
//! derivations such as [`FilterView`](super::FilterView).

use std::collections::HashSet;
use std::sync::Arc;

use doitnow_proto::task::TaskId;
use parking_lot::RwLock;
use tokio::sync::watch;

use super::TaskError;
use super::model::{Task, newest_first};

/// An immutable view of the store at one revision.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    revision: u64,
    tasks: Arc<[Task]>,
}

impl StoreSnapshot {
    /// Revision this snapshot was taken at.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// The tasks, in store order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the snapshot holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

struct Inner {
    tasks: RwLock<Arc<[Task]>>,
    revision: watch::Sender<u64>,
}

/// Shared handle to the ordered task list.
///
/// Order is newest-created first (ties by id). `id` is unique at all times.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("revision", &*self.inner.revision.borrow())
            .field("len", &self.inner.tasks.read().len())
            .finish()
    }
}

impl TaskStore {
    /// Creates an empty store at revision 0.
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                tasks: RwLock::new(Arc::from(Vec::new())),
                revision,
            }),
        }
    }

    /// Returns the current contents.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let tasks = self.inner.tasks.read();
        StoreSnapshot {
            revision: *self.inner.revision.borrow(),
            tasks: Arc::clone(&tasks),
        }
    }

    /// Subscribes to revision changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Replaces the whole list, keeping the given order.
    ///
    /// If `tasks` repeats an id, only the first occurrence is kept. Returns
    /// the number of tasks now held.
    pub fn replace_all(&self, tasks: Vec<Task>) -> usize {
        let mut seen = HashSet::with_capacity(tasks.len());
        let before = tasks.len();
        let unique: Vec<Task> = tasks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        if unique.len() != before {
            tracing::warn!(
                dropped = before - unique.len(),
                "replace_all dropped duplicate task ids"
            );
        }
        let len = unique.len();
        self.commit(|_| unique);
        len
    }

    /// Inserts `task`, or replaces the task with the same id in place.
    ///
    /// New tasks are placed at their display position. Returns the
    /// replaced task, if any.
    pub fn upsert(&self, task: Task) -> Option<Task> {
        let mut previous = None;
        self.commit(|current| {
            let mut tasks = current.to_vec();
            if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
                previous = Some(std::mem::replace(slot, task));
            } else {
                let at = tasks.partition_point(|t| newest_first(t, &task).is_lt());
                tasks.insert(at, task);
            }
            tasks
        });
        previous
    }

    /// Removes the task with `id`, returning it.
    pub fn remove(&self, id: &TaskId) -> Option<Task> {
        self.remove_checked(id, |_| Ok(())).ok()
    }

    /// Removes the task with `id` only if `guard` accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has `id`, or whatever
    /// `guard` returns; in both cases the store is left untouched.
    pub fn remove_checked<F>(&self, id: &TaskId, guard: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&Task) -> Result<(), TaskError>,
    {
        let mut outcome = Err(TaskError::NotFound(id.clone()));
        self.try_commit(|current| {
            let at = current.iter().position(|t| &t.id == id)?;
            if let Err(e) = guard(&current[at]) {
                outcome = Err(e);
                return None;
            }
            let mut tasks = current.to_vec();
            outcome = Ok(tasks.remove(at));
            Some(tasks)
        });
        outcome
    }

    /// Applies `f` to a copy of the task with `id` and commits the copy
    /// only if `f` succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::NotFound`] if no task has `id`, or the error
    /// returned by `f`; in both cases the store is left untouched.
    pub fn update<F>(&self, id: &TaskId, f: F) -> Result<Task, TaskError>
    where
        F: FnOnce(&mut Task) -> Result<(), TaskError>,
    {
        let mut outcome = Err(TaskError::NotFound(id.clone()));
        self.try_commit(|current| {
            let at = current.iter().position(|t| &t.id == id)?;
            let mut edited = current[at].clone();
            if let Err(e) = f(&mut edited) {
                outcome = Err(e);
                return None;
            }
            let mut tasks = current.to_vec();
            tasks[at] = edited.clone();
            outcome = Ok(edited);
            Some(tasks)
        });
        outcome
    }

    /// Removes every task.
    pub fn clear(&self) {
        self.commit(|_| Vec::new());
    }

    fn commit<F>(&self, f: F)
    where
        F: FnOnce(&[Task]) -> Vec<Task>,
    {
        self.try_commit(|current| Some(f(current)));
    }

    /// Publishes the list returned by `f`, or leaves the store untouched if
    /// `f` returns `None`. The revision is bumped while the lock is held so
    /// a snapshot's revision always matches its contents.
    fn try_commit<F>(&self, f: F)
    where
        F: FnOnce(&[Task]) -> Option<Vec<Task>>,
    {
        let mut tasks = self.inner.tasks.write();
        if let Some(next) = f(&tasks) {
            *tasks = Arc::from(next);
            self.inner.revision.send_modify(|r| *r += 1);
        }
    }
}
