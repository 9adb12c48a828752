//! Typed event bus connecting the coordination components
//!
//! [`Bus`] is a minimal synchronous publish/subscribe primitive. Listeners
//! are invoked in registration order, on the publishing thread, against the
//! set of listeners subscribed at the moment of publish. There is no queue
//! and no replay: a listener subscribed after a publish never sees it.
//!
//! Two independent bus instances run in a typical application: one carrying
//! [`InflightChanged`](crate::inflight::InflightChanged) events and one
//! carrying [`Revalidation`](crate::targets::Revalidation) events. Their
//! payload semantics differ, so they are never merged into a single bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registrations<E> {
    listeners: Mutex<Vec<(u64, Listener<E>)>>,
    next_id: AtomicU64,
}

/// Synchronous publish/subscribe channel for one event type.
///
/// Cloning a `Bus` yields another handle to the same channel; publishing on
/// either handle reaches all subscribers.
///
/// # Example
/// ```
/// use form_dispatch_core::bus::Bus;
/// use std::sync::{Arc, Mutex};
///
/// let bus: Bus<u32> = Bus::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// let sub = bus.subscribe(move |n: &u32| sink.lock().unwrap().push(*n));
///
/// bus.publish(&7);
/// sub.unsubscribe();
/// bus.publish(&8);
///
/// assert_eq!(*seen.lock().unwrap(), vec![7]);
/// ```
pub struct Bus<E> {
    registrations: Arc<Registrations<E>>,
}

impl<E> Bus<E> {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(Registrations {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe a listener, returning a guard that detaches it on drop.
    ///
    /// Listeners are called synchronously from [`publish`](Self::publish),
    /// in the order they were subscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        let id = self.registrations.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.registrations.listeners).push((id, Arc::new(listener)));

        let registrations = Arc::downgrade(&self.registrations);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(registrations) = Weak::upgrade(&registrations) {
                    lock(&registrations.listeners).retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Publish an event to every listener currently subscribed.
    ///
    /// The subscriber set is snapshotted before dispatch: listeners added or
    /// removed by a listener during this publish do not affect it.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = lock(&self.registrations.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of currently subscribed listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.registrations.listeners).len()
    }
}

impl<E> Clone for Bus<E> {
    fn clone(&self) -> Self {
        Self {
            registrations: Arc::clone(&self.registrations),
        }
    }
}

impl<E> Default for Bus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Bus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Guard for a bus subscription.
///
/// The listener stays attached for as long as this guard is alive. Dropping
/// it (or calling [`unsubscribe`](Self::unsubscribe)) detaches the listener.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Detach the listener now.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_bus() -> (Bus<u32>, Arc<Mutex<Vec<u32>>>, Subscription) {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |n: &u32| lock(&sink).push(*n));
        (bus, seen, sub)
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let (bus, seen, _sub) = recording_bus();

        bus.publish(&1);
        bus.publish(&2);

        assert_eq!(*lock(&seen), vec![1, 2]);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let (bus, seen, sub) = recording_bus();

        bus.publish(&1);
        sub.unsubscribe();
        bus.publish(&2);

        assert_eq!(*lock(&seen), vec![1]);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_drop_detaches() {
        let (bus, seen, sub) = recording_bus();

        drop(sub);
        bus.publish(&1);

        assert!(lock(&seen).is_empty());
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let bus: Bus<()> = Bus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..4)
            .map(|i| {
                let sink = Arc::clone(&order);
                bus.subscribe(move |_| lock(&sink).push(i))
            })
            .collect();

        bus.publish(&());

        assert_eq!(*lock(&order), vec![0, 1, 2, 3]);
        drop(subs);
    }

    #[test]
    fn test_subscribe_during_dispatch_misses_current_publish() {
        let bus: Bus<u32> = Bus::new();
        let late_seen = Arc::new(Mutex::new(Vec::new()));
        let late_subs = Arc::new(Mutex::new(Vec::new()));

        let inner_bus = bus.clone();
        let sink = Arc::clone(&late_seen);
        let holder = Arc::clone(&late_subs);
        let _sub = bus.subscribe(move |n: &u32| {
            let inner_sink = Arc::clone(&sink);
            let sub = inner_bus.subscribe(move |m: &u32| lock(&inner_sink).push(*m));
            lock(&holder).push(sub);
        });

        bus.publish(&1);
        assert!(lock(&late_seen).is_empty());

        // The listener registered during the first publish sees the next one.
        bus.publish(&2);
        assert_eq!(lock(&late_seen).first(), Some(&2));
    }

    #[test]
    fn test_unsubscribe_during_dispatch_keeps_current_publish() {
        let bus: Bus<u32> = Bus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        // First listener drops the second one's guard mid-dispatch; the
        // second listener still receives the in-progress publish.
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&victim);
        let _dropper = bus.subscribe(move |_: &u32| {
            lock(&slot).take();
        });

        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |n: &u32| lock(&sink).push(*n));
        *lock(&victim) = Some(sub);

        bus.publish(&1);
        assert_eq!(*lock(&seen), vec![1]);

        bus.publish(&2);
        assert_eq!(*lock(&seen), vec![1]);
    }

    #[test]
    fn test_cloned_handle_shares_channel() {
        let (bus, seen, _sub) = recording_bus();

        bus.clone().publish(&9);

        assert_eq!(*lock(&seen), vec![9]);
    }
}
