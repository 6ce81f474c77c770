//! Remote persistence abstraction for `DoItNow`.
//!
//! Defines the [`RemoteTasks`] trait every backend must satisfy: a live,
//! owner-scoped subscription that delivers full snapshots, an append write
//! that assigns the record's id and creation instant, and the mirror writes
//! that follow local completion, edit and delete intents. The bundled
//! implementation is [`memory::InMemoryRemote`].

pub mod memory;

use chrono::{DateTime, Utc};
use doitnow_proto::task::{NewTaskRecord, OwnerId, RemoteDocument, TaskId};
use tokio::sync::mpsc;

/// Errors that can occur during remote operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote tier could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote tier refused the operation.
    #[error("remote rejected the request: {0}")]
    Rejected(String),

    /// No record has the given id.
    #[error("no such record: {0}")]
    NotFound(TaskId),

    /// The remote tier has shut down.
    #[error("remote closed")]
    Closed,
}

/// One delivery on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// The complete, current record set for the subscribed owner, newest
    /// first.
    Snapshot(Vec<RemoteDocument>),
    /// The subscription reported a read failure. Later snapshots may
    /// still follow.
    Error(String),
}

/// Acknowledgement of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendAck {
    /// Canonical identifier assigned to the record.
    pub id: TaskId,
    /// Server-assigned creation instant.
    pub created_at: DateTime<Utc>,
}

/// A live query handle. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::Receiver<RemoteEvent>,
}

impl Subscription {
    /// Wraps the receiving half of a backend's delivery channel.
    #[must_use]
    pub const fn new(rx: mpsc::Receiver<RemoteEvent>) -> Self {
        Self { rx }
    }

    /// Waits for the next delivery. Returns `None` once the backend has
    /// closed the subscription.
    pub async fn recv(&mut self) -> Option<RemoteEvent> {
        self.rx.recv().await
    }
}

/// Async remote tier holding every user's task records.
///
/// Implementations deliver at least one snapshot per subscription and a
/// fresh one after every change to the subscribed owner's records,
/// including changes made by other clients.
pub trait RemoteTasks: Send + Sync {
    /// Opens a live query over the records owned by `owner`.
    ///
    /// `capacity` bounds the number of undelivered events.
    fn subscribe(
        &self,
        owner: &OwnerId,
        capacity: usize,
    ) -> impl std::future::Future<Output = Result<Subscription, RemoteError>> + Send;

    /// Durably appends a new record, returning its assigned id and
    /// creation instant.
    ///
    /// A successful append is followed by a snapshot that contains the
    /// record on every subscription for its owner.
    fn append(
        &self,
        record: NewTaskRecord,
    ) -> impl std::future::Future<Output = Result<AppendAck, RemoteError>> + Send;

    /// Sets or clears the completion instant of record `id`.
    fn set_completion(
        &self,
        id: &TaskId,
        completed_at: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Overwrites the editable fields of record `id` with those of
    /// `fields`. The owner, creation instant and completion are kept.
    fn update_fields(
        &self,
        id: &TaskId,
        fields: NewTaskRecord,
    ) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;

    /// Deletes record `id`.
    fn delete(&self, id: &TaskId) -> impl std::future::Future<Output = Result<(), RemoteError>> + Send;
}
