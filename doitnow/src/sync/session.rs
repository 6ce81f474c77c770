//! Owner session lifecycle.
//!
//! The remote subscription is scoped to an owner session: it is opened when
//! an owner is established and cancelled unconditionally when the session
//! ends, the owner changes, or the controller is dropped.

use std::sync::Arc;

use doitnow_proto::task::OwnerId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{SyncEvent, SyncReconciler};
use crate::remote::RemoteTasks;
use crate::tasks::{TaskError, TaskStore};

/// Owns a running reconciliation loop. Dropping the handle aborts the loop,
/// which drops its subscription.
#[derive(Debug)]
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Aborts the loop and waits until it has stopped, so no further
    /// snapshot can reach the store.
    pub async fn cancel(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }

    /// Whether the loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reacts to identity changes by (re)scoping the remote subscription and
/// the store.
#[derive(Debug)]
pub struct SessionController<R> {
    remote: Arc<R>,
    store: TaskStore,
    events: mpsc::Sender<SyncEvent>,
    capacity: usize,
    current: Option<(OwnerId, SyncHandle)>,
}

impl<R: RemoteTasks> SessionController<R> {
    /// Creates a signed-out controller.
    ///
    /// `capacity` bounds each subscription's undelivered events; loop
    /// outcomes are reported on `events`.
    #[must_use]
    pub const fn new(
        remote: Arc<R>,
        store: TaskStore,
        events: mpsc::Sender<SyncEvent>,
        capacity: usize,
    ) -> Self {
        Self {
            remote,
            store,
            events,
            capacity,
            current: None,
        }
    }

    /// The signed-in owner, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&OwnerId> {
        self.current.as_ref().map(|(owner, _)| owner)
    }

    /// Whether a reconciliation loop is running.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Applies an identity transition.
    ///
    /// `Some(owner)` ends any other session, clears the store, subscribes
    /// for `owner` and starts reconciling. `None` ends the session and
    /// clears the store. Re-asserting the current owner does nothing while
    /// its loop runs; once the loop has ended it resubscribes, keeping the
    /// last reconciled tasks until the next snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::RemoteReadFailure`] if the subscription cannot
    /// be opened; the controller is then signed out with an empty store.
    pub async fn set_owner(&mut self, owner: Option<OwnerId>) -> Result<(), TaskError> {
        let same_owner = self.owner() == owner.as_ref();
        if same_owner && (owner.is_none() || self.is_syncing()) {
            return Ok(());
        }

        if let Some((previous, handle)) = self.current.take() {
            handle.cancel().await;
            if same_owner {
                tracing::info!(owner = %previous, "resubscribing after sync loop ended");
            } else {
                tracing::info!(owner = %previous, "session ended");
            }
        }
        if !same_owner {
            self.store.clear();
        }

        let Some(owner) = owner else {
            return Ok(());
        };

        let subscription = match self.remote.subscribe(&owner, self.capacity).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(owner = %owner, error = %e, "subscribe failed");
                self.store.clear();
                return Err(TaskError::RemoteReadFailure(e.to_string()));
            }
        };

        let reconciler = SyncReconciler::new(self.store.clone(), owner.clone());
        let task = tokio::spawn(reconciler.run(subscription, self.events.clone()));
        tracing::info!(owner = %owner, "session started");
        self.current = Some((owner, SyncHandle { task }));
        Ok(())
    }
}
