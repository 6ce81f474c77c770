//! Keeps the local [`TaskStore`](crate::tasks::TaskStore) mirroring the
//! remote tier.
//!
//! # Architecture
//!
//! ```text
//! RemoteTasks ── Subscription ──> SyncReconciler::run ── replace_all ──> TaskStore
//!                                        │
//!                                        └── SyncEvent ──> front end
//! ```
//!
//! [`SessionController`] owns the lifetime of that loop: one loop per owner
//! session, cancelled on logout or owner change.

pub mod reconcile;
pub mod session;

pub use reconcile::{ReconcileReport, SyncReconciler};
pub use session::{SessionController, SyncHandle};

/// Outcomes reported by a reconciliation loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A snapshot replaced the store contents.
    Reconciled {
        /// Documents now in the store.
        applied: usize,
        /// Documents dropped because they failed to decode.
        discarded: usize,
    },
    /// The subscription reported a read error; the store was kept.
    ReadFailed(String),
    /// The subscription ended.
    Closed,
}
