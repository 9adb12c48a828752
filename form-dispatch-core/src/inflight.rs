//! Registry of submissions currently in flight, keyed by action identity
//!
//! The registry is process-wide shared state, but never ambient: it is
//! owned by an explicit [`Coordinator`](crate::context::Coordinator) (or by
//! a test) and handed to dispatchers at construction. Observers take
//! point-in-time snapshots and re-snapshot whenever the registry publishes
//! an [`InflightChanged`] event on its bus.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::trace;

use crate::action::{ActionId, Submission};
use crate::bus::{lock, Bus, Subscription};

/// Published whenever an action's in-flight submission set changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InflightChanged {
    /// The action whose set changed.
    pub action: ActionId,
}

/// Tracks, per action, the submissions that have started but not settled.
///
/// Entries are created on the first [`add`](Self::add) for an action and
/// deleted as soon as the last submission is removed; an empty set is never
/// retained. All operations are infallible.
#[derive(Default)]
pub struct InflightRegistry {
    entries: Mutex<HashMap<ActionId, Vec<Submission>>>,
    changes: Bus<InflightChanged>,
}

impl InflightRegistry {
    /// Create an empty registry with its own change bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a submission into the set for `action` and publish a change
    /// event. Inserting a submission that is already present is a no-op
    /// apart from the event.
    pub fn add(&self, action: ActionId, submission: Submission) {
        {
            let mut entries = lock(&self.entries);
            let set = entries.entry(action).or_default();
            if !set.contains(&submission) {
                set.push(submission);
            }
            trace!(?action, pending = set.len(), "submission added");
        }
        self.changes.publish(&InflightChanged { action });
    }

    /// Remove a submission from the set for `action`, deleting the entry if
    /// it empties. Publishes a change event whether or not the submission
    /// was present, so cancellation cleanup can run unconditionally.
    pub fn remove(&self, action: ActionId, submission: &Submission) {
        {
            let mut entries = lock(&self.entries);
            if let Some(set) = entries.get_mut(&action) {
                set.retain(|s| s != submission);
                if set.is_empty() {
                    entries.remove(&action);
                }
            }
            trace!(?action, "submission removed");
        }
        self.changes.publish(&InflightChanged { action });
    }

    /// A snapshot of the pending submissions for `action`, in insertion
    /// order. Empty if none. The snapshot does not track later changes;
    /// observers resubscribe via [`subscribe`](Self::subscribe).
    pub fn snapshot(&self, action: ActionId) -> Vec<Submission> {
        lock(&self.entries)
            .get(&action)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any submission is pending for `action`.
    pub fn is_pending(&self, action: ActionId) -> bool {
        lock(&self.entries).contains_key(&action)
    }

    /// Subscribe to change events for all actions.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&InflightChanged) + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }

    /// The underlying change bus.
    pub fn changes(&self) -> &Bus<InflightChanged> {
        &self.changes
    }
}

impl std::fmt::Debug for InflightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InflightRegistry")
            .field("actions", &lock(&self.entries).len())
            .finish()
    }
}
