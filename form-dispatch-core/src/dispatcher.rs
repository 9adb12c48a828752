//! Per-call-site action dispatch with cancellation and optimistic state
//!
//! An [`ActionDispatcher`] wraps one [`FormAction`] for one call site. Each
//! [`submit`](ActionDispatcher::submit) cancels the previous submission on
//! the same dispatcher (cooperatively: the superseded future keeps running,
//! its outcome is discarded), registers the new one in the shared
//! [`InflightRegistry`], and exposes optimistic state while the action runs.
//!
//! State is split across two channels (both `tokio::sync::watch`):
//!
//! - the *optimistic* channel carries the pending submission and the early
//!   result, updated the moment they are computed;
//! - the *settled* channel carries the last final result.
//!
//! [`display_result`](ActionDispatcher::display_result) merges them with
//! optimistic priority, so a just-completed action shows its result even if
//! a surrounding render batch has not settled yet.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::action::{ActionId, FormAction, Outcome, Submission};
use crate::bus::lock;
use crate::inflight::InflightRegistry;
use crate::targets::{TargetCache, TargetKey};

/// The immediately visible half of a dispatcher's state.
pub struct OptimisticState<In, T, E> {
    /// The input of the submission currently in flight, or `None`.
    pub pending: Option<Arc<In>>,
    /// The outcome of the just-settled submission, ahead of the settled
    /// channel. Cleared when the next submission starts.
    pub early: Option<Outcome<T, E>>,
}

impl<In, T, E> Clone for OptimisticState<In, T, E> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
            early: self.early.clone(),
        }
    }
}

impl<In, T, E> Default for OptimisticState<In, T, E> {
    fn default() -> Self {
        Self {
            pending: None,
            early: None,
        }
    }
}

impl<In, T, E> std::fmt::Debug for OptimisticState<In, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticState")
            .field("pending", &self.pending.is_some())
            .field("early", &self.early.is_some())
            .finish()
    }
}

struct LiveSubmission {
    token: CancellationToken,
    submission: Submission,
}

/// Dispatches one action from one call site.
///
/// Create one dispatcher per place an action is submitted from (one per
/// form, not one per action): each dispatcher instance enforces at most one
/// live submission at a time, while all dispatchers sharing a [`FormAction`]
/// identity share one in-flight set in the registry.
pub struct ActionDispatcher<In, T, E> {
    action: FormAction<In, T, E>,
    registry: Arc<InflightRegistry>,
    targets: Arc<TargetCache>,
    revalidates: Option<Vec<TargetKey>>,
    live: Arc<Mutex<Option<LiveSubmission>>>,
    optimistic: watch::Sender<OptimisticState<In, T, E>>,
    settled: watch::Sender<Option<Outcome<T, E>>>,
}

impl<In, T, E> ActionDispatcher<In, T, E>
where
    In: Send + Sync + 'static,
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a dispatcher for `action`, optionally revalidating `targets`
    /// after every successful submission.
    pub fn new(
        action: FormAction<In, T, E>,
        registry: Arc<InflightRegistry>,
        targets: Arc<TargetCache>,
        revalidates: Option<Vec<TargetKey>>,
    ) -> Self {
        let (optimistic, _) = watch::channel(OptimisticState::default());
        let (settled, _) = watch::channel(None);
        Self {
            action,
            registry,
            targets,
            revalidates,
            live: Arc::new(Mutex::new(None)),
            optimistic,
            settled,
        }
    }

    /// The identity of the dispatched action.
    pub fn action_id(&self) -> ActionId {
        self.action.id()
    }

    /// Submit one input to the action.
    ///
    /// Cancels any outstanding submission on this dispatcher first, then
    /// runs the action to completion on a background task, so bookkeeping
    /// (optimistic state, registry membership, revalidation) happens even
    /// if the returned future is dropped.
    ///
    /// The returned outcome is the action's real result, success or error,
    /// even when this submission was superseded before it settled.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the action itself.
    pub async fn submit(&self, input: In) -> Outcome<T, E> {
        let input = Arc::new(input);
        let submission = Submission::from_arc(Arc::clone(&input));
        let token = CancellationToken::new();
        let action_id = self.action.id();

        // Lazy: does not run until spawned below.
        let fut = self.action.invoke(Arc::clone(&input));

        {
            let mut live = lock(&self.live);
            if let Some(previous) = live.replace(LiveSubmission {
                token: token.clone(),
                submission: submission.clone(),
            }) {
                // Once cancelled under this lock, the previous submission's
                // completion task will not publish any state. Its registry
                // entry is cleaned up here, at the cancellation point.
                previous.token.cancel();
                trace!(action = ?action_id, "superseded previous submission");
                self.registry.remove(action_id, &previous.submission);
            }

            // The optimistic pending value goes out before the registry's
            // change event, so observers woken by that event already see it.
            self.optimistic.send_replace(OptimisticState {
                pending: Some(Arc::clone(&input)),
                early: None,
            });
            self.registry.add(action_id, submission.clone());
        }

        let live = Arc::clone(&self.live);
        let registry = Arc::clone(&self.registry);
        let targets = Arc::clone(&self.targets);
        let revalidates = self.revalidates.clone();
        let optimistic = self.optimistic.clone();
        let settled = self.settled.clone();

        let worker = tokio::spawn(async move {
            let outcome: Outcome<T, E> = match fut.await {
                Ok(value) => Ok(Arc::new(value)),
                Err(err) => Err(Arc::new(err)),
            };

            {
                let guard = lock(&live);
                if token.is_cancelled() {
                    // The superseding submit already removed this entry.
                    trace!(action = ?action_id, "discarding cancelled outcome");
                    return outcome;
                }
                // Still the live submission: publish while holding the lock
                // so a concurrent submit cannot interleave its own updates.
                optimistic.send_replace(OptimisticState {
                    pending: None,
                    early: Some(outcome.clone()),
                });
                settled.send_replace(Some(outcome.clone()));
                drop(guard);
            }
            registry.remove(action_id, &submission);

            if outcome.is_ok() {
                if let Some(stale) = &revalidates {
                    debug!(action = ?action_id, targets = ?stale, "revalidating targets");
                    targets.revalidate(Some(stale));
                }
            }
            outcome
        });

        match worker.await {
            Ok(outcome) => outcome,
            Err(err) => match err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                // Submission tasks are never aborted; the only other join
                // failure is runtime shutdown.
                Err(err) => panic!("submission task did not complete: {err}"),
            },
        }
    }

    /// The optimistic pending submission's input, or `None` when idle.
    pub fn pending_submission(&self) -> Option<Arc<In>> {
        self.optimistic.borrow().pending.clone()
    }

    /// The displayable result: the early optimistic result if present, else
    /// the last settled result, else `None`.
    pub fn display_result(&self) -> Option<Outcome<T, E>> {
        let optimistic = self.optimistic.borrow();
        if optimistic.early.is_some() {
            return optimistic.early.clone();
        }
        drop(optimistic);
        self.settled.borrow().clone()
    }

    /// The last settled result, ignoring the optimistic channel.
    pub fn settled_result(&self) -> Option<Outcome<T, E>> {
        self.settled.borrow().clone()
    }

    /// Watch the optimistic channel for change-driven rendering.
    pub fn watch_optimistic(&self) -> watch::Receiver<OptimisticState<In, T, E>> {
        self.optimistic.subscribe()
    }

    /// Watch the settled channel.
    pub fn watch_settled(&self) -> watch::Receiver<Option<Outcome<T, E>>> {
        self.settled.subscribe()
    }
}

impl<In, T, E> std::fmt::Debug for ActionDispatcher<In, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("action", &self.action.id())
            .field("revalidates", &self.revalidates)
            .finish()
    }
}
