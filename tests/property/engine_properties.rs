//! Property-based tests for the task engine.
//!
//! Uses proptest to verify:
//! 1. The store never holds two tasks with the same id.
//! 2. Reconciliation accounts for every document and yields newest-first
//!    order.
//! 3. The filter pipeline is idempotent, order-preserving and never shows
//!    a task from another category or a completion from before today.
//! 4. Toggling twice restores a task, and completion never precedes
//!    creation.
//! 5. The calendar windows nest and partition the timeline.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use doitnow::sync::SyncReconciler;
use doitnow::tasks::filter::apply;
use doitnow::tasks::model::newest_first;
use doitnow::tasks::{
    CompletionStateMachine, Selection, Task, TaskStore, TimeFilter, TimeWindows, WeekStart,
};
use doitnow_proto::task::{Category, OwnerId, Priority, RemoteDocument, TaskId};
use proptest::prelude::*;
use serde_json::json;

// --- Strategies ---

/// 2024-01-01T00:00:00Z.
const EPOCH_MS: i64 = 1_704_067_200_000;

/// Strategy for instants within roughly a month of 2024-01-01.
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0_i64..40 * 24 * 3600).prop_map(|s| Utc.timestamp_millis_opt(EPOCH_MS + s * 1000).unwrap())
}

fn arb_category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

fn arb_window() -> impl Strategy<Value = TimeFilter> {
    prop::sample::select(TimeFilter::ALL.to_vec())
}

fn arb_week_start() -> impl Strategy<Value = WeekStart> {
    prop_oneof![Just(WeekStart::Monday), Just(WeekStart::Sunday)]
}

/// Strategy for whole-hour UTC offsets from -12h to +14h.
fn arb_offset() -> impl Strategy<Value = FixedOffset> {
    (-12_i32..=14).prop_map(|h| FixedOffset::east_opt(h * 3600).unwrap())
}

/// Strategy for tasks drawn from a small id pool so collisions happen.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        0_u8..8,
        arb_category(),
        arb_instant(),
        arb_instant(),
        prop::option::of(0_i64..72),
    )
        .prop_map(|(n, category, due, created, done_after_hours)| Task {
            id: TaskId::new(format!("t{n}")),
            owner_id: OwnerId::new("alice"),
            title: format!("Task {n}"),
            category,
            priority: Priority::Medium,
            due_date: due,
            completed_at: done_after_hours.map(|h| created + TimeDelta::hours(h)),
            description: String::new(),
            created_at: created,
        })
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_task(), 0..24)
}

/// Strategy for remote documents, some of them malformed or foreign.
fn arb_remote_document() -> impl Strategy<Value = RemoteDocument> {
    (0_u8..12, arb_task(), 0_u8..6).prop_map(|(n, task, kind)| {
        let owner = if kind == 4 { "bob" } else { "alice" };
        let data = if kind == 5 {
            json!({ "ownerId": owner, "title": task.title })
        } else {
            json!({
                "ownerId": owner,
                "title": task.title,
                "category": task.category.as_str(),
                "priority": task.priority.as_str(),
                "dueDate": task.due_date.to_rfc3339(),
                "createdAt": task.created_at,
            })
        };
        RemoteDocument {
            id: TaskId::new(format!("d{n}")),
            data,
        }
    })
}

fn unique_ids(tasks: &[Task]) -> bool {
    let mut seen = HashSet::new();
    tasks.iter().all(|t| seen.insert(t.id.clone()))
}

// --- Properties ---

proptest! {
    #[test]
    fn store_ids_stay_unique(initial in arb_tasks(), upserts in arb_tasks()) {
        let store = TaskStore::new();
        store.replace_all(initial);
        prop_assert!(unique_ids(store.snapshot().tasks()));
        for task in upserts {
            store.upsert(task);
            prop_assert!(unique_ids(store.snapshot().tasks()));
        }
    }

    #[test]
    fn reconciliation_accounts_for_every_document(
        docs in prop::collection::vec(arb_remote_document(), 0..20),
    ) {
        let store = TaskStore::new();
        let reconciler = SyncReconciler::new(store.clone(), OwnerId::new("alice"));
        let report = reconciler.apply(&docs);

        let snapshot = store.snapshot();
        prop_assert_eq!(report.applied + report.discarded, docs.len());
        prop_assert_eq!(report.applied, snapshot.len());
        prop_assert!(unique_ids(snapshot.tasks()));
        prop_assert!(snapshot.tasks().iter().all(|t| t.owner_id.as_str() == "alice"));
        prop_assert!(snapshot
            .tasks()
            .windows(2)
            .all(|pair| newest_first(&pair[0], &pair[1]).is_le()));
    }

    #[test]
    fn filter_is_idempotent_and_order_preserving(
        tasks in arb_tasks(),
        category in arb_category(),
        window in arb_window(),
        now in arb_instant(),
        offset in arb_offset(),
        week_start in arb_week_start(),
    ) {
        let store = TaskStore::new();
        store.replace_all(tasks);
        let snapshot = store.snapshot();
        let windows = TimeWindows::compute(&now.with_timezone(&offset), week_start);
        let selection = Selection { category, window };

        let once = apply(snapshot.tasks(), selection, &windows);
        let twice = apply(&once, selection, &windows);
        prop_assert_eq!(&once, &twice);

        // Output is a subsequence of the store.
        let mut rest = snapshot.tasks().iter();
        for shown in &once {
            prop_assert!(rest.any(|t| t == shown));
        }

        for shown in &once {
            prop_assert_eq!(shown.category, category);
            if let Some(at) = shown.completed_at {
                prop_assert!(at >= windows.today.start);
            }
        }
    }

    #[test]
    fn toggle_twice_restores_task(
        tasks in prop::collection::vec(arb_task(), 1..12),
        pick in any::<prop::sample::Index>(),
        now in arb_instant(),
    ) {
        let store = TaskStore::new();
        store.replace_all(tasks);
        let snapshot = store.snapshot();
        let original = snapshot.tasks()[pick.index(snapshot.len())].clone();
        let machine = CompletionStateMachine::new(store.clone(), 20);

        let flipped = machine.toggle(&original.id, now);
        prop_assert!(flipped.is_ok());
        if let Ok(flipped) = flipped {
            prop_assert_ne!(flipped.is_completed(), original.is_completed());
            if let Some(at) = flipped.completed_at {
                prop_assert!(at >= flipped.created_at);
            }
        }

        let _ = machine.toggle(&original.id, now);
        let restored = store.snapshot().get(&original.id).cloned();
        prop_assert_eq!(restored.as_ref().map(Task::is_completed), Some(original.is_completed()));
        if !original.is_completed() {
            prop_assert_eq!(restored, Some(original));
        }
    }

    #[test]
    fn windows_nest_and_partition(
        now in arb_instant(),
        offset in arb_offset(),
        week_start in arb_week_start(),
        instant in arb_instant(),
    ) {
        let local_now = now.with_timezone(&offset);
        let windows = TimeWindows::compute(&local_now, week_start);

        prop_assert!(windows.today.contains(now));
        prop_assert!(windows.week.start <= windows.today.start);
        prop_assert!(windows.today.end <= windows.week.end);
        prop_assert_eq!(windows.week.end - windows.week.start, TimeDelta::days(7));

        // Before today is overdue; from this week's end on is upcoming.
        prop_assert_eq!(windows.is_overdue(instant), instant < windows.today.start);
        prop_assert_eq!(
            windows.week.contains(instant),
            instant >= windows.week.start && !windows.is_upcoming(instant)
        );
        prop_assert!(!(windows.is_overdue(instant) && windows.today.contains(instant)));
    }
}
