//! In-process remote tier.
//!
//! [`InMemoryRemote`] keeps every user's records in memory and fans out a
//! full snapshot to each of an owner's subscribers whenever that owner's
//! records change. It assigns ids and creation instants the way a hosted
//! document store would, and exposes hooks for simulating other clients
//! and failures.

use chrono::{DateTime, TimeDelta, Utc};
use doitnow_proto::codec;
use doitnow_proto::task::{NewTaskRecord, OwnerId, RemoteDocument, TaskId};
use tokio::sync::{Mutex, mpsc};

use super::{AppendAck, RemoteError, RemoteEvent, RemoteTasks, Subscription};

#[derive(Debug, Clone)]
struct Record {
    id: TaskId,
    owner: OwnerId,
    created_at: DateTime<Utc>,
    data: serde_json::Value,
}

#[derive(Debug, Default)]
struct State {
    records: Vec<Record>,
    subscribers: Vec<(OwnerId, mpsc::Sender<RemoteEvent>)>,
    last_stamp: Option<DateTime<Utc>>,
    failing_writes: usize,
    failing_subscribes: usize,
}

impl State {
    /// Server clock: wall time, forced strictly increasing.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_stamp {
            Some(last) if now <= last => last + TimeDelta::milliseconds(1),
            _ => now,
        };
        self.last_stamp = Some(at);
        at
    }

    fn snapshot_for(&self, owner: &OwnerId) -> Vec<RemoteDocument> {
        let mut records: Vec<&Record> = self.records.iter().filter(|r| &r.owner == owner).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        records
            .into_iter()
            .map(|r| RemoteDocument {
                id: r.id.clone(),
                data: r.data.clone(),
            })
            .collect()
    }

    /// Pushes `event` to each live subscriber of `owner`, pruning closed ones.
    async fn broadcast(&mut self, owner: &OwnerId, event: RemoteEvent) {
        self.subscribers.retain(|(_, tx)| !tx.is_closed());
        for (sub_owner, tx) in &self.subscribers {
            if sub_owner == owner && tx.send(event.clone()).await.is_err() {
                tracing::debug!(owner = %owner, "subscriber went away during delivery");
            }
        }
    }

    async fn publish(&mut self, owner: &OwnerId) {
        let docs = self.snapshot_for(owner);
        self.broadcast(owner, RemoteEvent::Snapshot(docs)).await;
    }

    fn take_write_failure(&mut self) -> Result<(), RemoteError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(RemoteError::Unavailable("write failed".to_string()));
        }
        Ok(())
    }

    /// Applies `f` to the body of record `id` and notifies its owner.
    async fn modify<F>(&mut self, id: &TaskId, f: F) -> Result<(), RemoteError>
    where
        F: FnOnce(&mut serde_json::Map<String, serde_json::Value>) + Send,
    {
        self.take_write_failure()?;
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        let body = record
            .data
            .as_object_mut()
            .ok_or_else(|| RemoteError::Rejected(format!("record {id} has no object body")))?;
        f(body);
        let owner = record.owner.clone();
        self.publish(&owner).await;
        Ok(())
    }

    fn insert(&mut self, id: TaskId, owner: OwnerId, data: serde_json::Value) {
        let created_at = match body_created_at(&data) {
            Some(at) => at,
            None => self.stamp(),
        };
        self.records.retain(|r| r.id != id);
        self.records.push(Record {
            id,
            owner,
            created_at,
            data,
        });
    }
}

fn body_created_at(data: &serde_json::Value) -> Option<DateTime<Utc>> {
    let raw = data.get("createdAt")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn body_owner(data: &serde_json::Value) -> Option<OwnerId> {
    data.get("ownerId")?.as_str().map(OwnerId::new)
}

/// Remote tier held entirely in process memory.
///
/// All state sits behind one async mutex that stays locked while a change
/// is fanned out, so every subscriber sees snapshots in commit order.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<State>,
}

impl InMemoryRemote {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads records from snapshot bytes (see
    /// [`codec::encode_snapshot`]). Records are stored verbatim; bodies
    /// without a string `ownerId` are skipped. Returns the number stored.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Rejected`] if `bytes` is not a snapshot.
    pub async fn seed_from_snapshot(&self, bytes: &[u8]) -> Result<usize, RemoteError> {
        let docs = codec::decode_snapshot(bytes).map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let mut state = self.state.lock().await;
        let mut stored = 0;
        for doc in docs {
            let Some(owner) = body_owner(&doc.data) else {
                tracing::warn!(task_id = %doc.id, "seed record has no owner, skipped");
                continue;
            };
            state.insert(doc.id, owner, doc.data);
            stored += 1;
        }
        tracing::info!(stored, "remote seeded from snapshot");
        Ok(stored)
    }

    /// Stores an arbitrary body under `id` for `owner`, bypassing the
    /// schema, and notifies the owner's subscribers.
    pub async fn insert_raw(&self, owner: &OwnerId, id: TaskId, data: serde_json::Value) {
        let mut state = self.state.lock().await;
        state.insert(id, owner.clone(), data);
        state.publish(owner).await;
    }

    /// Replaces the body of record `id`, as another client would. Returns
    /// `false` if no such record exists.
    pub async fn update_document(&self, id: &TaskId, data: serde_json::Value) -> bool {
        let mut state = self.state.lock().await;
        let Some(record) = state.records.iter_mut().find(|r| &r.id == id) else {
            return false;
        };
        record.data = data;
        let owner = record.owner.clone();
        state.publish(&owner).await;
        true
    }

    /// Makes the next `n` writes (appends and mirror writes) fail with
    /// [`RemoteError::Unavailable`].
    pub async fn fail_next_writes(&self, n: usize) {
        self.state.lock().await.failing_writes = n;
    }

    /// Makes the next `n` subscribe calls fail with
    /// [`RemoteError::Unavailable`].
    pub async fn fail_next_subscribes(&self, n: usize) {
        self.state.lock().await.failing_subscribes = n;
    }

    /// Reports a read failure on every subscription of `owner`.
    pub async fn emit_read_error(&self, owner: &OwnerId, message: &str) {
        let mut state = self.state.lock().await;
        state
            .broadcast(owner, RemoteEvent::Error(message.to_string()))
            .await;
    }

    /// Closes every open subscription.
    pub async fn disconnect_all(&self) {
        self.state.lock().await.subscribers.clear();
    }

    /// Number of live subscriptions for `owner`.
    pub async fn subscriber_count(&self, owner: &OwnerId) -> usize {
        let state = self.state.lock().await;
        state
            .subscribers
            .iter()
            .filter(|(o, tx)| o == owner && !tx.is_closed())
            .count()
    }

    /// Every record currently stored for `owner`, newest first.
    pub async fn documents(&self, owner: &OwnerId) -> Vec<RemoteDocument> {
        self.state.lock().await.snapshot_for(owner)
    }
}

impl RemoteTasks for InMemoryRemote {
    async fn subscribe(&self, owner: &OwnerId, capacity: usize) -> Result<Subscription, RemoteError> {
        let mut state = self.state.lock().await;
        if state.failing_subscribes > 0 {
            state.failing_subscribes -= 1;
            return Err(RemoteError::Unavailable("subscribe failed".to_string()));
        }
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let initial = RemoteEvent::Snapshot(state.snapshot_for(owner));
        // Fresh channel with room for one event.
        tx.try_send(initial).map_err(|_| RemoteError::Closed)?;
        state.subscribers.push((owner.clone(), tx));
        tracing::debug!(owner = %owner, "subscription opened");
        Ok(Subscription::new(rx))
    }

    async fn append(&self, record: NewTaskRecord) -> Result<AppendAck, RemoteError> {
        let mut state = self.state.lock().await;
        state.take_write_failure()?;
        let id = TaskId::generate();
        let created_at = state.stamp();
        let owner = record.owner_id.clone();
        let data = codec::encode_document(&record.into_document(created_at))
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        state.records.push(Record {
            id: id.clone(),
            owner: owner.clone(),
            created_at,
            data,
        });
        tracing::debug!(task_id = %id, owner = %owner, "record appended");
        state.publish(&owner).await;
        Ok(AppendAck { id, created_at })
    }

    async fn set_completion(
        &self,
        id: &TaskId,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), RemoteError> {
        let value = completed_at
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| RemoteError::Rejected(e.to_string()))?;
        let mut state = self.state.lock().await;
        state
            .modify(id, |body| match value {
                Some(at) => {
                    body.insert("completedAt".to_string(), at);
                }
                None => {
                    body.remove("completedAt");
                }
            })
            .await
    }

    async fn update_fields(&self, id: &TaskId, fields: NewTaskRecord) -> Result<(), RemoteError> {
        let serde_json::Value::Object(mut patch) =
            serde_json::to_value(fields).map_err(|e| RemoteError::Rejected(e.to_string()))?
        else {
            return Err(RemoteError::Rejected("fields are not an object".to_string()));
        };
        patch.remove("ownerId");
        let mut state = self.state.lock().await;
        state.modify(id, |body| body.extend(patch)).await
    }

    async fn delete(&self, id: &TaskId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.take_write_failure()?;
        let at = state
            .records
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        let removed = state.records.remove(at);
        tracing::debug!(task_id = %id, "record deleted");
        state.publish(&removed.owner).await;
        Ok(())
    }
}
