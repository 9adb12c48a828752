//! form-dispatch: optimistic action dispatch and cache revalidation
//!
//! A small coordination layer for UI code that submits async actions (form
//! submissions) and reads cached async data: optimistic pending state while
//! the work runs, cancellation of superseded submissions, and
//! staleness-driven refetch of the reads an action affects.
//!
//! # Example
//! ```ignore
//! use form_dispatch::prelude::*;
//!
//! let coordinator = Coordinator::new();
//! let save = FormAction::new(|draft| backend.save(draft));
//! let dispatcher = coordinator.dispatcher(save, Some(vec!["drafts".into()]));
//!
//! dispatcher.submit(draft).await?;
//! ```

// Re-export everything from core
pub use form_dispatch_core::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use form_dispatch_core::prelude::*;
}
