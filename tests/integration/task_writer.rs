//! Integration tests for new-task submission.
//!
//! Covers validation, authentication, failed appends and the hand-over
//! from the local echo to the synced snapshot.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use doitnow::remote::RemoteError;
use doitnow::remote::memory::InMemoryRemote;
use doitnow::sync::{SessionController, SyncEvent};
use doitnow::tasks::{TaskDraft, TaskError, TaskStore, TaskWriter};
use doitnow::tasks::ValidationError;
use doitnow_proto::task::{Category, OwnerId, Priority};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap()
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        category: Category::Work,
        priority: Priority::High,
        due_date: Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(),
        description: "quarterly numbers".to_string(),
    }
}

fn make_writer() -> (Arc<InMemoryRemote>, TaskStore, TaskWriter<InMemoryRemote>) {
    let remote = Arc::new(InMemoryRemote::new());
    let store = TaskStore::new();
    let writer = TaskWriter::new(Arc::clone(&remote), store.clone(), 20);
    (remote, store, writer)
}

async fn next_event(events: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for sync event")
        .expect("sync event channel closed")
}

// ===========================================================================
// Rejections
// ===========================================================================

#[tokio::test]
async fn empty_and_overlong_titles_are_rejected() {
    let (remote, store, writer) = make_writer();
    let owner = OwnerId::new("alice");

    let err = writer.submit(Some(&owner), draft("   "), now()).await.unwrap_err();
    assert_eq!(err, TaskError::Validation(ValidationError::TitleEmpty));

    let err = writer
        .submit(Some(&owner), draft("Prepare the quarterly report"), now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TaskError::Validation(ValidationError::TitleTooLong { max: 20, .. })
    ));

    assert!(store.snapshot().is_empty());
    assert!(remote.documents(&owner).await.is_empty());
}

#[tokio::test]
async fn signed_out_submission_is_refused() {
    let (_, store, writer) = make_writer();
    let err = writer.submit(None, draft("Report"), now()).await.unwrap_err();
    assert_eq!(err, TaskError::Unauthenticated);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn failed_append_reports_and_changes_nothing() {
    let (remote, store, writer) = make_writer();
    let owner = OwnerId::new("alice");
    remote.fail_next_writes(1).await;

    let err = writer.submit(Some(&owner), draft("Report"), now()).await.unwrap_err();
    assert!(matches!(
        err,
        TaskError::RemoteWriteFailure(RemoteError::Unavailable(_))
    ));
    assert!(err.to_string().starts_with("could not save task"));
    assert!(store.snapshot().is_empty());
    assert!(remote.documents(&owner).await.is_empty());

    // The failure is not sticky.
    let task = writer.submit(Some(&owner), draft("Report"), now()).await.unwrap();
    assert_eq!(store.snapshot().get(&task.id), Some(&task));
}

// ===========================================================================
// Echo and snapshot
// ===========================================================================

#[tokio::test]
async fn echo_is_superseded_by_snapshot() {
    let (remote, store, writer) = make_writer();
    let owner = OwnerId::new("alice");
    let (tx, mut events) = mpsc::channel(16);
    let mut session = SessionController::new(Arc::clone(&remote), store.clone(), tx, 16);
    session.set_owner(Some(owner.clone())).await.unwrap();
    next_event(&mut events).await;

    let task = writer
        .submit(session.owner(), draft(" Report "), now())
        .await
        .unwrap();
    assert!(!task.id.is_temporary());
    assert_eq!(task.title, "Report");
    assert_eq!(task.owner_id, owner);
    assert!(!task.is_completed());

    assert_eq!(
        next_event(&mut events).await,
        SyncEvent::Reconciled {
            applied: 1,
            discarded: 0
        }
    );
    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 1);
    let synced = snapshot.get(&task.id).expect("synced task");
    assert_eq!(synced.title, "Report");
    assert_eq!(synced.due_date, task.due_date);
    assert_eq!(synced.created_at, task.created_at);
}

#[tokio::test]
async fn submissions_are_listed_newest_first() {
    let (_, store, writer) = make_writer();
    let owner = OwnerId::new("alice");
    let first = writer.submit(Some(&owner), draft("First"), now()).await.unwrap();
    let second = writer.submit(Some(&owner), draft("Second"), now()).await.unwrap();

    assert!(second.created_at > first.created_at);
    let titles: Vec<String> = store
        .snapshot()
        .tasks()
        .iter()
        .map(|t| t.title.clone())
        .collect();
    assert_eq!(titles, ["Second", "First"]);
}
