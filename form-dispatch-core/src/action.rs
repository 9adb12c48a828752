//! Action identity, submissions, and settled outcomes
//!
//! An action is a caller-supplied async function invoked with one input
//! (a submission) and producing a result. The coordination layer imposes no
//! schema on inputs or results; it only needs a stable identity per action
//! (to group in-flight submissions) and an identity per submission (to track
//! one invocation through the registry).

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of a caller-supplied action.
///
/// Stands in for function-reference equality: every identity minted by
/// [`ActionId::fresh`] is distinct, and [`FormAction`] clones share the
/// identity of the original. Used as the key into the
/// [`InflightRegistry`](crate::inflight::InflightRegistry).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

impl ActionId {
    /// Mint a new, process-unique identity.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A settled action result, shared between the direct `submit` caller and
/// the dispatcher's displayed state.
pub type Outcome<T, E> = Result<Arc<T>, Arc<E>>;

type BoxedActionFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;
type ActionFn<In, T, E> = dyn Fn(Arc<In>) -> BoxedActionFuture<T, E> + Send + Sync;

/// A caller-supplied async action paired with a stable [`ActionId`].
///
/// Cloning shares the identity: two dispatchers built from clones of the
/// same `FormAction` contribute to one in-flight submission set.
///
/// # Example
/// ```
/// use form_dispatch_core::action::FormAction;
///
/// let action: FormAction<String, usize, std::convert::Infallible> =
///     FormAction::new(|name: std::sync::Arc<String>| async move { Ok(name.len()) });
///
/// let other = action.clone();
/// assert_eq!(action.id(), other.id());
/// ```
pub struct FormAction<In, T, E> {
    id: ActionId,
    run: Arc<ActionFn<In, T, E>>,
}

impl<In, T, E> FormAction<In, T, E> {
    /// Wrap an async function as an action with a fresh identity.
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: Fn(Arc<In>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            id: ActionId::fresh(),
            run: Arc::new(move |input| -> BoxedActionFuture<T, E> {
                Box::pin(action(input))
            }),
        }
    }

    /// The action's identity.
    pub fn id(&self) -> ActionId {
        self.id
    }

    /// Build the (lazy) future for one invocation. It does no work until
    /// polled.
    pub(crate) fn invoke(&self, input: Arc<In>) -> BoxedActionFuture<T, E> {
        (self.run)(input)
    }
}

impl<In, T, E> Clone for FormAction<In, T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            run: Arc::clone(&self.run),
        }
    }
}

impl<In, T, E> std::fmt::Debug for FormAction<In, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormAction").field("id", &self.id).finish()
    }
}

/// One invocation's input, as tracked by the registry.
///
/// A `Submission` is a cheap, type-erased handle around the caller's input
/// value. Equality is identity of the underlying allocation, not value
/// equality: submitting two structurally equal inputs produces two distinct
/// submissions. Observers recover the typed value with
/// [`downcast_ref`](Self::downcast_ref) for display.
#[derive(Clone)]
pub struct Submission {
    value: Arc<dyn Any + Send + Sync>,
}

impl Submission {
    /// Wrap an input value.
    pub fn new<In>(value: In) -> Self
    where
        In: Send + Sync + 'static,
    {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an already shared input value without another allocation.
    pub fn from_arc<In>(value: Arc<In>) -> Self
    where
        In: Send + Sync + 'static,
    {
        Self { value }
    }

    /// The typed input, if `In` is the type this submission was built from.
    pub fn downcast_ref<In: 'static>(&self) -> Option<&In> {
        self.value.downcast_ref()
    }

    fn data_ptr(&self) -> *const () {
        Arc::as_ptr(&self.value) as *const ()
    }
}

impl PartialEq for Submission {
    fn eq(&self, other: &Self) -> bool {
        self.data_ptr() == other.data_ptr()
    }
}

impl Eq for Submission {}

impl std::fmt::Debug for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Submission({:p})", self.data_ptr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ids_are_unique() {
        let a = ActionId::fresh();
        let b = ActionId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn test_clone_shares_identity() {
        let action: FormAction<u32, u32, std::convert::Infallible> =
            FormAction::new(|n| async move { Ok(*n + 1) });
        let clone = action.clone();

        assert_eq!(action.id(), clone.id());

        let fresh: FormAction<u32, u32, std::convert::Infallible> =
            FormAction::new(|n| async move { Ok(*n + 1) });
        assert_ne!(action.id(), fresh.id());
    }

    #[tokio::test]
    async fn test_invoke_runs_the_wrapped_function() {
        let action: FormAction<u32, u32, std::convert::Infallible> =
            FormAction::new(|n| async move { Ok(*n * 2) });

        let out = action.invoke(Arc::new(21)).await;
        assert_eq!(out, Ok(42));
    }

    #[test]
    fn test_submission_identity_not_value_equality() {
        let a = Submission::new(String::from("beef"));
        let b = Submission::new(String::from("beef"));

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_submission_shares_identity_with_source_arc() {
        let input = Arc::new(5_u32);
        let a = Submission::from_arc(Arc::clone(&input));
        let b = Submission::from_arc(input);

        assert_eq!(a, b);
    }

    #[test]
    fn test_submission_downcast() {
        let sub = Submission::new(vec![1_u8, 2, 3]);

        assert_eq!(sub.downcast_ref::<Vec<u8>>(), Some(&vec![1, 2, 3]));
        assert!(sub.downcast_ref::<String>().is_none());
    }
}
