//! Shared coordination context
//!
//! The registry and cache are process-wide shared state, but modeled as an
//! explicitly owned [`Coordinator`] rather than ambient globals, so tests
//! and embedded uses can run isolated instances side by side.

use std::sync::Arc;

use crate::action::FormAction;
use crate::dispatcher::ActionDispatcher;
use crate::inflight::InflightRegistry;
use crate::targets::{TargetCache, TargetKey};

/// Owns one [`InflightRegistry`] and one [`TargetCache`] and wires
/// dispatchers to them.
///
/// # Example
/// ```
/// use form_dispatch_core::context::Coordinator;
/// use form_dispatch_core::action::FormAction;
/// use std::convert::Infallible;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let coordinator = Coordinator::new();
///
/// let action: FormAction<String, usize, Infallible> =
///     FormAction::new(|name: std::sync::Arc<String>| async move { Ok(name.len()) });
/// let dispatcher = coordinator.dispatcher(action, Some(vec!["cart".into()]));
///
/// let outcome = dispatcher.submit(String::from("beef")).await.unwrap();
/// assert_eq!(*outcome, 4);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Coordinator {
    inflight: Arc<InflightRegistry>,
    targets: Arc<TargetCache>,
}

impl Coordinator {
    /// Create a coordinator with a fresh registry and cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared inflight registry.
    pub fn inflight(&self) -> &Arc<InflightRegistry> {
        &self.inflight
    }

    /// The shared target cache.
    pub fn targets(&self) -> &Arc<TargetCache> {
        &self.targets
    }

    /// Build a dispatcher for one call site of `action`, revalidating
    /// `targets` after each successful submission.
    pub fn dispatcher<In, T, E>(
        &self,
        action: FormAction<In, T, E>,
        revalidates: Option<Vec<TargetKey>>,
    ) -> ActionDispatcher<In, T, E>
    where
        In: Send + Sync + 'static,
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        ActionDispatcher::new(
            action,
            Arc::clone(&self.inflight),
            Arc::clone(&self.targets),
            revalidates,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_dispatcher_shares_the_coordinator_registry() {
        let coordinator = Coordinator::new();
        let action: FormAction<u32, u32, Infallible> =
            FormAction::new(|n| async move { Ok(*n) });
        let dispatcher = coordinator.dispatcher(action, None);

        dispatcher.submit(1).await.unwrap();

        assert!(!coordinator.inflight().is_pending(dispatcher.action_id()));
    }

    #[test]
    fn test_coordinators_are_isolated() {
        let a = Coordinator::new();
        let b = Coordinator::new();

        assert!(!Arc::ptr_eq(a.inflight(), b.inflight()));
        assert!(!Arc::ptr_eq(a.targets(), b.targets()));
    }
}
