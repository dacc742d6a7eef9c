//! Core domain types for Strata.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer:
//!
//! - **`patch`**: structural diff operations between two immutable snapshots
//! - **`event`**: the per-step change notification handed to listeners
//! - **`errors`**: the error surface of the container and its updates

mod errors;
mod event;
mod patch;

pub use errors::{MutateError, StoreError, UpdateError};
pub use event::ChangeEvent;
pub use patch::{PATCH_ENV_VAR, Patch, PatchMode, PatchOp, diff};
