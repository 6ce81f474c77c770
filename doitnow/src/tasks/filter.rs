//! Derivation of the displayed task list.
//!
//! The pipeline composes three stages over a store snapshot:
//!
//! 1. category: keep tasks in the active category;
//! 2. window: pending tasks must fall in the active time window, completed
//!    tasks pass unconditionally so a task does not vanish the moment it
//!    is ticked off;
//! 3. visibility: completed tasks stay only while their completion instant
//!    is within today.
//!
//! Output keeps store order. [`apply`] is pure; [`FilterView`] memoizes it
//! against the store revision, the selection and the current day.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use doitnow_proto::task::Category;
use tokio::sync::watch;

use super::model::Task;
use super::store::TaskStore;
use super::window::TimeWindows;

/// The time-window selector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeFilter {
    /// Due today.
    #[default]
    Today,
    /// Due this week.
    Week,
    /// Due after this week.
    Upcoming,
    /// Due before today and still pending.
    Overdue,
}

impl TimeFilter {
    /// Every window, in selector order.
    pub const ALL: [Self; 4] = [Self::Today, Self::Week, Self::Upcoming, Self::Overdue];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Week => "This Week",
            Self::Upcoming => "Upcoming",
            Self::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" | "this week" | "this-week" => Ok(Self::Week),
            "upcoming" => Ok(Self::Upcoming),
            "overdue" => Ok(Self::Overdue),
            other => Err(format!("unknown window: {other:?}")),
        }
    }
}

/// The user's current selector state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    /// Active category.
    pub category: Category,
    /// Active time window.
    pub window: TimeFilter,
}

/// Runs the pipeline over `tasks`.
#[must_use]
pub fn apply(tasks: &[Task], selection: Selection, windows: &TimeWindows) -> Vec<Task> {
    tasks
        .iter()
        .filter(|t| t.category == selection.category)
        .filter(|t| t.is_completed() || in_window(t, selection.window, windows))
        .filter(|t| still_visible(t, windows))
        .cloned()
        .collect()
}

fn in_window(task: &Task, window: TimeFilter, windows: &TimeWindows) -> bool {
    match window {
        TimeFilter::Today => windows.today.contains(task.due_date),
        TimeFilter::Week => windows.week.contains(task.due_date),
        TimeFilter::Upcoming => windows.is_upcoming(task.due_date),
        TimeFilter::Overdue => windows.is_overdue(task.due_date) && !task.is_completed(),
    }
}

fn still_visible(task: &Task, windows: &TimeWindows) -> bool {
    task.completed_at
        .is_none_or(|at| at >= windows.today.start)
}

#[derive(Debug)]
struct Cached {
    revision: u64,
    selection: Selection,
    windows: TimeWindows,
    tasks: Arc<[Task]>,
}

/// A memoized, selection-aware view over a [`TaskStore`].
#[derive(Debug)]
pub struct FilterView {
    store: TaskStore,
    changes: watch::Receiver<u64>,
    selection: Selection,
    cache: Option<Cached>,
}

impl FilterView {
    /// Creates a view showing `category` with the Today window.
    #[must_use]
    pub fn new(store: TaskStore, category: Category) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            changes,
            selection: Selection {
                category,
                window: TimeFilter::Today,
            },
            cache: None,
        }
    }

    /// Current selector state.
    #[must_use]
    pub const fn selection(&self) -> Selection {
        self.selection
    }

    /// Switches category. The window resets to Today.
    pub const fn select_category(&mut self, category: Category) {
        self.selection = Selection {
            category,
            window: TimeFilter::Today,
        };
    }

    /// Switches time window, keeping the category.
    pub const fn select_window(&mut self, window: TimeFilter) {
        self.selection.window = window;
    }

    /// Returns the displayed list, recomputing only if the store, the
    /// selection or the windows changed since the last call.
    pub fn displayed(&mut self, windows: &TimeWindows) -> Arc<[Task]> {
        let snapshot = self.store.snapshot();
        if let Some(cached) = &self.cache
            && cached.revision == snapshot.revision()
            && cached.selection == self.selection
            && cached.windows == *windows
        {
            return Arc::clone(&cached.tasks);
        }

        let tasks: Arc<[Task]> = apply(snapshot.tasks(), self.selection, windows).into();
        tracing::trace!(
            revision = snapshot.revision(),
            category = %self.selection.category,
            window = %self.selection.window,
            shown = tasks.len(),
            "filter recomputed"
        );
        self.changes.mark_unchanged();
        self.cache = Some(Cached {
            revision: snapshot.revision(),
            selection: self.selection,
            windows: *windows,
            tasks: Arc::clone(&tasks),
        });
        tasks
    }

    /// Waits until the store mutates after the last [`displayed`](Self::displayed).
    pub async fn changed(&mut self) {
        // The view holds a store handle, so the sender outlives this receiver.
        let _ = self.changes.changed().await;
    }
}
