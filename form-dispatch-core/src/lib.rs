//! Core traits and types for form-dispatch
//!
//! This crate provides the coordination layer between UI call sites and
//! their async work: submitting actions with optimistic state and
//! cancellation, tracking in-flight submissions globally, and revalidating
//! cached reads when an action changes the data behind them.
//!
//! # Core Concepts
//!
//! - **FormAction**: a caller-supplied async function with a stable identity
//! - **ActionDispatcher**: per-call-site submission with cancellation and
//!   optimistic pending/early/settled state
//! - **InflightRegistry**: the global set of pending submissions per action
//! - **TargetCache**: memoized async reads, refetched after revalidation
//! - **Bus**: synchronous typed pub/sub wiring the pieces together
//!
//! # Basic Example
//!
//! ```ignore
//! use form_dispatch_core::prelude::*;
//!
//! let coordinator = Coordinator::new();
//!
//! // A cached read, keyed by target.
//! let cart = coordinator
//!     .targets()
//!     .read("cart", || backend.fetch_cart())
//!     .await?;
//!
//! // An action that makes the "cart" target stale on success.
//! let add_to_cart = FormAction::new(|item| backend.add_to_cart(item));
//! let dispatcher = coordinator.dispatcher(add_to_cart, Some(vec!["cart".into()]));
//!
//! // While this runs, `dispatcher.pending_submission()` exposes the input
//! // for optimistic rendering; afterwards the next read of "cart" refetches.
//! dispatcher.submit(item).await?;
//! ```
//!
//! # Cancellation
//!
//! Resubmitting on the same dispatcher cancels the previous submission
//! cooperatively: the superseded future keeps running in the background,
//! but its outcome never reaches dispatcher state, and its registry entry
//! is cleaned up immediately. The direct caller of the superseded
//! [`submit`](dispatcher::ActionDispatcher::submit) still receives the real
//! outcome.

pub mod action;
pub mod bus;
pub mod context;
pub mod dispatcher;
pub mod inflight;
pub mod targets;
pub mod testing;

// Action exports
pub use action::{ActionId, FormAction, Outcome, Submission};

// Bus exports
pub use bus::{Bus, Subscription};

// Context exports
pub use context::Coordinator;

// Dispatcher exports
pub use dispatcher::{ActionDispatcher, OptimisticState};

// Inflight exports
pub use inflight::{InflightChanged, InflightRegistry};

// Target exports
pub use targets::{Revalidation, TargetCache, TargetError, TargetKey};

// Testing exports
pub use testing::EventLog;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{ActionId, FormAction, Outcome, Submission};
    pub use crate::bus::{Bus, Subscription};
    pub use crate::context::Coordinator;
    pub use crate::dispatcher::{ActionDispatcher, OptimisticState};
    pub use crate::inflight::{InflightChanged, InflightRegistry};
    pub use crate::targets::{Revalidation, TargetCache, TargetError, TargetKey};
}
