//! Serialized immutable state container for Strata.
//!
//! A [`StateContainer`] holds one immutable snapshot and serializes all
//! concurrent mutation requests against it: each update drafts a mutable
//! copy, freezes a new snapshot with structural sharing, notifies the
//! change listener and presentation bridge, and resolves a promise-style
//! [`Completion`] signal. The guarantees with real invariants live here:
//!
//! - **FIFO ordering**: steps apply strictly in enqueue order; batches
//!   never interleave internally with reentrant callers.
//! - **At most one drain**: an explicit `Idle`/`Draining` state machine,
//!   never recursion, so reentrant updates from listeners or mutators are
//!   safe and stack depth stays bounded.
//! - **Exactly-once resolution**: one completion signal per update call,
//!   resolved with the state after its last step, or rejected if that step
//!   failed.
//!
//! The model is single-threaded cooperative (the container is `!Send`);
//! the only async boundary is awaiting a [`Completion`].

pub mod engine;

mod completion;
mod container;
mod scheduler;

pub use completion::Completion;
pub use container::{ContainerBuilder, StateContainer, StoreHandle};
pub use scheduler::{ChangeListener, Mutator};

pub use strata_types::{
    ChangeEvent, MutateError, PATCH_ENV_VAR, Patch, PatchMode, PatchOp, StoreError, UpdateError,
};
