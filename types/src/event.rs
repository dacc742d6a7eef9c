//! Per-step change notification.

use std::sync::Arc;

use crate::patch::Patch;

/// Everything a change listener sees about one applied mutation step.
///
/// Delivered exactly once per step (not once per batched update call),
/// after the snapshot engine produced `next` and before the step's
/// completion signal resolves. Listeners that want to retain a snapshot
/// clone the `Arc`; the event itself borrows from the drain loop.
#[derive(Debug)]
pub struct ChangeEvent<'a, S> {
    prior: &'a Arc<S>,
    next: &'a Arc<S>,
    patches: &'a [Patch],
}

impl<'a, S> ChangeEvent<'a, S> {
    #[must_use]
    pub fn new(prior: &'a Arc<S>, next: &'a Arc<S>, patches: &'a [Patch]) -> Self {
        Self {
            prior,
            next,
            patches,
        }
    }

    /// The state immediately before this step.
    #[must_use]
    pub fn prior(&self) -> &Arc<S> {
        self.prior
    }

    /// The state this step produced.
    #[must_use]
    pub fn next(&self) -> &Arc<S> {
        self.next
    }

    /// Structural diff for this step; empty unless patch tracking is on.
    #[must_use]
    pub fn patches(&self) -> &[Patch] {
        self.patches
    }
}
