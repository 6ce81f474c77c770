//! Full-replace reconciliation of remote snapshots into the store.
//!
//! Every snapshot is decoded document by document. Documents that do not
//! decode, belong to another owner, or carry an unreadable due date are
//! discarded with a warning; the rest replace the store contents in one
//! commit, ordered newest first.

use chrono::Local;
use doitnow_proto::codec;
use doitnow_proto::task::{OwnerId, RemoteDocument};
use tokio::sync::mpsc;

use super::SyncEvent;
use crate::remote::{RemoteEvent, Subscription};
use crate::tasks::model::{newest_first, parse_due_date};
use crate::tasks::{Task, TaskStore};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tasks now held by the store.
    pub applied: usize,
    /// Documents dropped: undecodable, foreign, undated or duplicate.
    pub discarded: usize,
}

/// Applies remote snapshots for one owner to a [`TaskStore`].
#[derive(Debug, Clone)]
pub struct SyncReconciler {
    store: TaskStore,
    owner: OwnerId,
}

impl SyncReconciler {
    /// Creates a reconciler writing `owner`'s snapshots into `store`.
    #[must_use]
    pub const fn new(store: TaskStore, owner: OwnerId) -> Self {
        Self { store, owner }
    }

    /// Replaces the store contents with the decodable part of `docs`.
    pub fn apply(&self, docs: &[RemoteDocument]) -> ReconcileReport {
        let mut tasks: Vec<Task> = docs.iter().filter_map(|doc| self.decode(doc)).collect();
        tasks.sort_by(newest_first);
        let applied = self.store.replace_all(tasks);
        let discarded = docs.len() - applied;
        tracing::debug!(owner = %self.owner, applied, discarded, "snapshot reconciled");
        ReconcileReport { applied, discarded }
    }

    fn decode(&self, doc: &RemoteDocument) -> Option<Task> {
        let record = match codec::decode_document(doc) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(task_id = %doc.id, error = %e, "discarding undecodable document");
                return None;
            }
        };
        if record.owner_id != self.owner {
            tracing::warn!(
                task_id = %doc.id,
                owner = %record.owner_id,
                "discarding document owned by another user"
            );
            return None;
        }
        let Some(due_date) = parse_due_date(&record.due_date, &Local) else {
            tracing::warn!(task_id = %doc.id, due = %record.due_date, "discarding document with unreadable due date");
            return None;
        };
        Some(Task {
            id: doc.id.clone(),
            owner_id: record.owner_id,
            title: record.title,
            category: record.category,
            priority: record.priority,
            due_date,
            completed_at: record.completed_at.map(|at| at.max(record.created_at)),
            description: record.description,
            created_at: record.created_at,
        })
    }

    /// Consumes `subscription` until it ends, reconciling each snapshot and
    /// reporting outcomes on `events`.
    ///
    /// A read error leaves the store at its last good snapshot. Events are
    /// dropped rather than awaited when `events` is full.
    pub async fn run(self, mut subscription: Subscription, events: mpsc::Sender<SyncEvent>) {
        tracing::info!(owner = %self.owner, "sync loop started");
        while let Some(event) = subscription.recv().await {
            let outcome = match event {
                RemoteEvent::Snapshot(docs) => {
                    let report = self.apply(&docs);
                    SyncEvent::Reconciled {
                        applied: report.applied,
                        discarded: report.discarded,
                    }
                }
                RemoteEvent::Error(message) => {
                    tracing::warn!(owner = %self.owner, error = %message, "subscription read failed");
                    SyncEvent::ReadFailed(message)
                }
            };
            notify(&events, outcome);
        }
        tracing::info!(owner = %self.owner, "sync loop ended");
        notify(&events, SyncEvent::Closed);
    }
}

fn notify(events: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    if let Err(e) = events.try_send(event) {
        tracing::debug!(error = %e, "sync event not delivered");
    }
}
