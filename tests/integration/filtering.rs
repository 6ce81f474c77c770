//! Integration tests for the displayed-list pipeline.
//!
//! Exercises category and window selection, the completed-task visibility
//! rule across a day boundary, and the interaction between completion and
//! the filtered view. All clocks are pinned to a fixed UTC+7 offset.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use doitnow::tasks::filter::apply;
use doitnow::tasks::{
    CompletionStateMachine, FilterView, Selection, Task, TaskStore, TimeFilter, TimeWindows,
    WeekStart,
};
use doitnow_proto::task::{Category, OwnerId, Priority, TaskId};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn tz() -> FixedOffset {
    FixedOffset::east_opt(7 * 3600).unwrap()
}

/// Wednesday 2024-01-10 15:00 local.
fn now() -> DateTime<FixedOffset> {
    tz().with_ymd_and_hms(2024, 1, 10, 15, 0, 0).unwrap()
}

fn local(day: u32, hour: u32) -> DateTime<Utc> {
    tz().with_ymd_and_hms(2024, 1, day, hour, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn make_task(id: &str, category: Category, due: DateTime<Utc>, created: DateTime<Utc>) -> Task {
    Task {
        id: TaskId::new(id),
        owner_id: OwnerId::new("alice"),
        title: id.to_string(),
        category,
        priority: Priority::Medium,
        due_date: due,
        completed_at: None,
        description: String::new(),
        created_at: created,
    }
}

/// A store with one Work task per window, newest first.
fn seeded_store() -> TaskStore {
    let created = local(1, 9);
    let store = TaskStore::new();
    store.replace_all(vec![
        make_task("today", Category::Work, local(10, 18), created + TimeDelta::hours(5)),
        make_task("later-this-week", Category::Work, local(13, 9), created + TimeDelta::hours(4)),
        make_task("next-week", Category::Work, local(15, 0), created + TimeDelta::hours(3)),
        make_task("last-week", Category::Work, local(5, 12), created + TimeDelta::hours(2)),
        make_task("gym", Category::Health, local(10, 7), created + TimeDelta::hours(1)),
    ]);
    store
}

fn ids(tasks: &[Task]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

fn select(category: Category, window: TimeFilter) -> Selection {
    Selection { category, window }
}

// ===========================================================================
// Windows
// ===========================================================================

#[test]
fn each_window_selects_its_tasks() {
    let store = seeded_store();
    let snapshot = store.snapshot();
    let windows = TimeWindows::compute(&now(), WeekStart::Monday);

    let shown = |window| apply(snapshot.tasks(), select(Category::Work, window), &windows);
    assert_eq!(ids(&shown(TimeFilter::Today)), ["today"]);
    assert_eq!(ids(&shown(TimeFilter::Week)), ["today", "later-this-week"]);
    assert_eq!(ids(&shown(TimeFilter::Upcoming)), ["next-week"]);
    assert_eq!(ids(&shown(TimeFilter::Overdue)), ["last-week"]);
}

#[test]
fn sunday_week_start_moves_the_boundary() {
    let store = TaskStore::new();
    let created = local(1, 9);
    // Sunday 14 January, 10:00 local.
    store.replace_all(vec![make_task("sunday", Category::Work, local(14, 10), created)]);
    let snapshot = store.snapshot();

    let monday = TimeWindows::compute(&now(), WeekStart::Monday);
    let sunday = TimeWindows::compute(&now(), WeekStart::Sunday);
    let week = select(Category::Work, TimeFilter::Week);
    let upcoming = select(Category::Work, TimeFilter::Upcoming);

    assert_eq!(ids(&apply(snapshot.tasks(), week, &monday)), ["sunday"]);
    assert!(apply(snapshot.tasks(), week, &sunday).is_empty());
    assert_eq!(ids(&apply(snapshot.tasks(), upcoming, &sunday)), ["sunday"]);
}

#[test]
fn category_filter_is_exclusive() {
    let store = seeded_store();
    let windows = TimeWindows::compute(&now(), WeekStart::Monday);
    let shown = apply(
        store.snapshot().tasks(),
        select(Category::Health, TimeFilter::Today),
        &windows,
    );
    assert_eq!(ids(&shown), ["gym"]);
    assert!(
        apply(
            store.snapshot().tasks(),
            select(Category::MeTime, TimeFilter::Week),
            &windows
        )
        .is_empty()
    );
}

// ===========================================================================
// Completion and visibility
// ===========================================================================

#[test]
fn completed_task_passes_any_window_until_the_day_ends() {
    let store = seeded_store();
    let machine = CompletionStateMachine::new(store.clone(), 20);
    let overdue = TaskId::new("last-week");
    machine.toggle(&overdue, local(10, 1)).unwrap();

    let at_three = TimeWindows::compute(&now(), WeekStart::Monday);
    for window in TimeFilter::ALL {
        let shown = apply(store.snapshot().tasks(), select(Category::Work, window), &at_three);
        assert!(
            shown.iter().any(|t| t.id == overdue),
            "completed task missing from {window}"
        );
    }

    let tomorrow = TimeWindows::compute(&(now() + TimeDelta::hours(10)), WeekStart::Monday);
    for window in TimeFilter::ALL {
        let shown = apply(store.snapshot().tasks(), select(Category::Work, window), &tomorrow);
        assert!(shown.iter().all(|t| t.id != overdue));
    }
    // Hidden, not removed.
    assert!(store.snapshot().get(&overdue).is_some());
}

#[test]
fn completion_just_before_midnight_expires_at_midnight() {
    let store = seeded_store();
    let machine = CompletionStateMachine::new(store.clone(), 20);
    let id = TaskId::new("today");
    machine
        .toggle(&id, local(10, 23) + TimeDelta::minutes(59))
        .unwrap();

    let selection = select(Category::Work, TimeFilter::Today);
    let before = TimeWindows::compute(&(now() + TimeDelta::hours(8)), WeekStart::Monday);
    let after = TimeWindows::compute(&(now() + TimeDelta::hours(9)), WeekStart::Monday);
    assert_eq!(ids(&apply(store.snapshot().tasks(), selection, &before)), ["today"]);
    assert!(apply(store.snapshot().tasks(), selection, &after).is_empty());
}

#[test]
fn reopened_task_returns_to_window_rules() {
    let store = seeded_store();
    let machine = CompletionStateMachine::new(store.clone(), 20);
    let id = TaskId::new("next-week");
    let windows = TimeWindows::compute(&now(), WeekStart::Monday);
    let today = select(Category::Work, TimeFilter::Today);

    machine.toggle(&id, now().with_timezone(&Utc)).unwrap();
    assert!(ids(&apply(store.snapshot().tasks(), today, &windows)).contains(&"next-week"));

    machine.toggle(&id, now().with_timezone(&Utc)).unwrap();
    assert!(!ids(&apply(store.snapshot().tasks(), today, &windows)).contains(&"next-week"));
}

// ===========================================================================
// FilterView
// ===========================================================================

#[test]
fn view_is_stable_until_something_changes() {
    let store = seeded_store();
    let mut view = FilterView::new(store.clone(), Category::Work);
    let windows = TimeWindows::compute(&now(), WeekStart::Monday);

    let first = view.displayed(&windows);
    let second = view.displayed(&windows);
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    view.select_window(TimeFilter::Week);
    let third = view.displayed(&windows);
    assert_eq!(ids(&third), ["today", "later-this-week"]);

    store.remove(&TaskId::new("today"));
    assert_eq!(ids(&view.displayed(&windows)), ["later-this-week"]);
}

#[test]
fn switching_category_resets_window() {
    let store = seeded_store();
    let mut view = FilterView::new(store, Category::Work);
    view.select_window(TimeFilter::Overdue);
    view.select_category(Category::Health);
    assert_eq!(
        view.selection(),
        select(Category::Health, TimeFilter::Today)
    );

    let windows = TimeWindows::compute(&now(), WeekStart::Monday);
    assert_eq!(ids(&view.displayed(&windows)), ["gym"]);
}

#[tokio::test]
async fn view_wakes_on_store_mutation() {
    let store = seeded_store();
    let mut view = FilterView::new(store.clone(), Category::Work);
    let windows = TimeWindows::compute(&now(), WeekStart::Monday);
    view.displayed(&windows);

    let writer = store.clone();
    tokio::spawn(async move {
        writer.remove(&TaskId::new("today"));
    });
    tokio::time::timeout(std::time::Duration::from_secs(2), view.changed())
        .await
        .expect("view was not notified");
    assert!(view.displayed(&windows).is_empty());
}
