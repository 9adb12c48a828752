//! Memoized async reads keyed by target, refetched on revalidation
//!
//! A *target* names one cached read (`"cart"`, `"products"`). The first
//! [`read`](TargetCache::read) of a fresh target invokes the supplied fetch
//! and suspends every reader on the same pending operation; once resolved,
//! the value is served from the cache until an action revalidates the
//! target. Revalidation travels over the cache's own [`Bus`] so that the
//! rendering layer can observe the same events the cache reacts to.
//!
//! Fetch failures are cached: every reader of a failed target gets the same
//! error until the target is revalidated (or [`retry`](TargetCache::retry)
//! discards it). Recovery is explicit, never automatic.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::bus::{lock, Bus, Subscription};

/// Names one cached read.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetKey(String);

impl TargetKey {
    /// Create a new target key.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the key name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for TargetKey {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TargetKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Published when targets go stale.
///
/// `targets: None` invalidates every cached target; `Some(keys)` only the
/// named ones. Carries no data beyond the keys: consumers refetch, they are
/// not pushed fresh values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revalidation {
    /// The stale targets, or `None` for all of them.
    pub targets: Option<Vec<TargetKey>>,
}

impl Revalidation {
    /// Invalidate every target.
    pub fn all() -> Self {
        Self { targets: None }
    }

    /// Invalidate the named targets.
    pub fn of<I, K>(targets: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<TargetKey>,
    {
        Self {
            targets: Some(targets.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether this event invalidates `key`.
    pub fn matches(&self, key: &TargetKey) -> bool {
        match &self.targets {
            None => true,
            Some(targets) => targets.contains(key),
        }
    }
}

/// Error returned by [`TargetCache::read`].
#[derive(Debug, Clone, Error)]
pub enum TargetError {
    /// The underlying fetch failed. The same error is shared by every
    /// reader of the failed target until it is revalidated or retried.
    #[error("target fetch failed: {0}")]
    Fetch(Arc<dyn StdError + Send + Sync>),
    /// The target resolved to a value of a different type than the read
    /// requested.
    #[error("target {key} holds a value of a different type")]
    TypeMismatch {
        /// The key whose cached value did not downcast.
        key: TargetKey,
    },
}

type CachedValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<CachedValue, Arc<dyn StdError + Send + Sync>>;

struct TargetEntry {
    /// The current fetch generation: pending until the first reader's fetch
    /// settles, then holds the settled result (value or error) until the
    /// target is invalidated.
    cell: Arc<OnceCell<FetchResult>>,
    /// Last resolved value, kept across invalidation so dependents can show
    /// a stable view while the refetch is pending.
    last: Option<CachedValue>,
}

impl TargetEntry {
    fn fresh() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
            last: None,
        }
    }

    fn invalidate(&mut self) {
        if let Some(Ok(value)) = self.cell.get() {
            self.last = Some(Arc::clone(value));
        }
        self.cell = Arc::new(OnceCell::new());
    }
}

/// Per-target memoized async values with staleness-driven invalidation.
///
/// The cache exclusively owns the cached values; callers observe them
/// through `Arc`s and never mutate them in place.
///
/// # Example
/// ```
/// use form_dispatch_core::targets::TargetCache;
/// use std::convert::Infallible;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = TargetCache::new();
///
/// let value = cache
///     .read("greeting", || async { Ok::<_, Infallible>("hello") })
///     .await
///     .unwrap();
/// assert_eq!(*value, "hello");
///
/// // Cached: this fetch is never invoked.
/// let again = cache
///     .read("greeting", || async { Ok::<_, Infallible>("other") })
///     .await
///     .unwrap();
/// assert_eq!(*again, "hello");
/// # }
/// ```
pub struct TargetCache {
    entries: Arc<Mutex<HashMap<TargetKey, TargetEntry>>>,
    revalidations: Bus<Revalidation>,
    _subscription: Subscription,
}

impl TargetCache {
    /// Create an empty cache subscribed to its own revalidation bus.
    pub fn new() -> Self {
        let entries = Arc::new(Mutex::new(HashMap::<TargetKey, TargetEntry>::new()));
        let revalidations = Bus::new();

        let store = Arc::clone(&entries);
        let subscription = revalidations.subscribe(move |event: &Revalidation| {
            let mut entries = lock(&store);
            for (key, entry) in entries.iter_mut() {
                if event.matches(key) {
                    trace!(target = %key, "target invalidated");
                    entry.invalidate();
                }
            }
        });

        Self {
            entries,
            revalidations,
            _subscription: subscription,
        }
    }

    /// Suspending read of one target.
    ///
    /// The first read of a fresh target invokes `fetch` and stores the
    /// pending operation; concurrent readers coalesce onto it and all
    /// suspend until it settles. Later reads return the cached value
    /// without invoking their fetch. Whichever fetch closure is supplied at
    /// the moment a fresh fetch is triggered is the one that runs; the
    /// cache does not retain fetch functions.
    pub async fn read<T, F, Fut, Ferr>(
        &self,
        key: impl Into<TargetKey>,
        fetch: F,
    ) -> Result<Arc<T>, TargetError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Ferr>> + Send,
        Ferr: StdError + Send + Sync + 'static,
    {
        let key = key.into();
        let cell = {
            let mut entries = lock(&self.entries);
            let entry = entries.entry(key.clone()).or_insert_with(TargetEntry::fresh);
            Arc::clone(&entry.cell)
        };

        let log_key = key.clone();
        let result = cell
            .get_or_init(move || async move {
                debug!(target = %log_key, "fetching target");
                match fetch().await {
                    Ok(value) => Ok(Arc::new(value) as CachedValue),
                    Err(err) => Err(Arc::new(err) as Arc<dyn StdError + Send + Sync>),
                }
            })
            .await
            .clone();

        match result {
            Ok(value) => {
                let mut entries = lock(&self.entries);
                if let Some(entry) = entries.get_mut(&key) {
                    // Only record the stable view if this resolution still
                    // belongs to the current fetch generation.
                    if Arc::ptr_eq(&entry.cell, &cell) {
                        entry.last = Some(Arc::clone(&value));
                    }
                }
                drop(entries);
                value
                    .downcast::<T>()
                    .map_err(|_| TargetError::TypeMismatch { key })
            }
            Err(err) => Err(TargetError::Fetch(err)),
        }
    }

    /// Non-suspending stable view: the last resolved value for `key`, even
    /// while a refetch triggered by invalidation is still pending. `None`
    /// if the target never resolved (or resolved at a different type).
    ///
    /// Unlike [`read`](Self::read), the value type cannot be inferred from
    /// a fetch, so this usually needs a turbofish: `peek::<Cart, _>("cart")`.
    pub fn peek<T, K>(&self, key: K) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
        K: Into<TargetKey>,
    {
        let key = key.into();
        let entries = lock(&self.entries);
        let entry = entries.get(&key)?;
        let value = match entry.cell.get() {
            Some(Ok(value)) => Arc::clone(value),
            _ => Arc::clone(entry.last.as_ref()?),
        };
        value.downcast::<T>().ok()
    }

    /// Mark targets stale. `None` invalidates every cached target.
    ///
    /// Publishes a [`Revalidation`] on the cache's bus; the cache's own
    /// subscriber discards matching entries (keeping the stable view for
    /// [`peek`](Self::peek)), and external subscribers are notified to
    /// refetch.
    pub fn revalidate(&self, targets: Option<&[TargetKey]>) {
        self.revalidations.publish(&Revalidation {
            targets: targets.map(<[TargetKey]>::to_vec),
        });
    }

    /// Discard one target's current fetch so the next read starts fresh,
    /// without publishing a revalidation event. This is the explicit
    /// recovery path after a cached fetch failure.
    pub fn retry(&self, key: &TargetKey) {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(key) {
            trace!(target = %key, "target retry requested");
            entry.invalidate();
        }
    }

    /// Subscribe to revalidation events.
    pub fn subscribe_revalidations<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Revalidation) + Send + Sync + 'static,
    {
        self.revalidations.subscribe(listener)
    }

    /// The underlying revalidation bus.
    pub fn revalidations(&self) -> &Bus<Revalidation> {
        &self.revalidations
    }
}

impl Default for TargetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TargetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetCache")
            .field("targets", &lock(&self.entries).len())
            .finish()
    }
}
