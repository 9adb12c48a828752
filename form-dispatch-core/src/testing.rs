//! Test utilities for form-dispatch applications
//!
//! Small helpers used by the crate's own tests and exported for downstream
//! test suites.
//!
//! # Example
//!
//! ```
//! use form_dispatch_core::bus::Bus;
//! use form_dispatch_core::testing::EventLog;
//!
//! let bus: Bus<u32> = Bus::new();
//! let log = EventLog::attach(&bus);
//!
//! bus.publish(&1);
//! bus.publish(&2);
//!
//! assert_eq!(log.events(), vec![1, 2]);
//! ```

use std::sync::{Arc, Mutex};

use crate::bus::{lock, Bus, Subscription};

/// Records every event published on a bus, in order, for later assertion.
///
/// The listener stays attached for the lifetime of the log.
pub struct EventLog<E> {
    events: Arc<Mutex<Vec<E>>>,
    _subscription: Subscription,
}

impl<E> EventLog<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// Subscribe a recording listener to `bus`.
    pub fn attach(bus: &Bus<E>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let subscription = bus.subscribe(move |event: &E| lock(&sink).push(event.clone()));
        Self {
            events,
            _subscription: subscription,
        }
    }

    /// All events recorded so far.
    pub fn events(&self) -> Vec<E> {
        lock(&self.events).clone()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_records_in_order() {
        let bus: Bus<u32> = Bus::new();
        let log = EventLog::attach(&bus);

        bus.publish(&3);
        bus.publish(&1);

        assert_eq!(log.events(), vec![3, 1]);
        assert_eq!(log.len(), 2);
        assert!(!log.is_empty());
    }

    #[test]
    fn test_event_log_clear() {
        let bus: Bus<u32> = Bus::new();
        let log = EventLog::attach(&bus);

        bus.publish(&3);
        log.clear();

        assert!(log.is_empty());
    }

    #[test]
    fn test_event_log_detaches_on_drop() {
        let bus: Bus<u32> = Bus::new();
        let log = EventLog::attach(&bus);
        drop(log);

        assert_eq!(bus.listener_count(), 0);
    }
}
