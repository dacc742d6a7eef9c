//! State container: the public surface over one scheduler instance.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;

use strata_types::{ChangeEvent, MutateError, PatchMode, StoreError};

use crate::completion::Completion;
use crate::scheduler::{ChangeListener, MutationStep, Mutator, Scheduler};

/// Holds the current immutable snapshot and serializes all mutations to it.
///
/// Every container owns its own scheduler instance; containers are fully
/// independent of each other. Updates are applied in strict FIFO order:
/// for two calls A then B issued before either drains, all of A's steps are
/// applied and observed before any of B's. An update issued outside an
/// active drain is applied synchronously on the caller's stack; the
/// returned [`Completion`] is then already resolved.
pub struct StateContainer<S> {
    scheduler: Rc<Scheduler<S>>,
}

// The scheduler holds `dyn Fn` listener/bridge fields, so Debug is manual.
impl<S> fmt::Debug for StateContainer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateContainer").finish_non_exhaustive()
    }
}

/// Builder for a [`StateContainer`].
pub struct ContainerBuilder<S> {
    produce: Box<dyn FnOnce() -> S>,
    listener: Option<ChangeListener<S>>,
    patch_mode: PatchMode,
}

impl<S> ContainerBuilder<S> {
    /// Observer called once per applied step with the exact before/after
    /// states and that step's patches. The listener must treat the event as
    /// read-only; it may enqueue further updates, which join the running
    /// drain.
    pub fn on_change(mut self, listener: impl Fn(&ChangeEvent<'_, S>) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Whether the snapshot engine computes patches per step.
    pub fn patch_mode(mut self, mode: PatchMode) -> Self {
        self.patch_mode = mode;
        self
    }

    /// Build the container, evaluating the initial-state producer exactly
    /// once, here.
    #[must_use]
    pub fn build(self) -> StateContainer<S> {
        let initial = (self.produce)();
        StateContainer {
            scheduler: Rc::new(Scheduler::new(initial, self.listener, self.patch_mode)),
        }
    }
}

impl<S: 'static> StateContainer<S> {
    /// Container over a literal initial value, no listener, patches off.
    #[must_use]
    pub fn new(initial: S) -> Self {
        Self::builder(initial).build()
    }

    /// Start configuring a container from a literal initial value.
    #[must_use]
    pub fn builder(initial: S) -> ContainerBuilder<S> {
        Self::builder_with(move || initial)
    }

    /// Start configuring a container from a zero-argument producer; the
    /// producer runs exactly once, at [`ContainerBuilder::build`].
    #[must_use]
    pub fn builder_with(produce: impl FnOnce() -> S + 'static) -> ContainerBuilder<S> {
        ContainerBuilder {
            produce: Box::new(produce),
            listener: None,
            patch_mode: PatchMode::default(),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn read(&self) -> Arc<S> {
        self.scheduler.current()
    }

    /// Attach the presentation bridge: called with each new state after
    /// every applied step. The core does not know what the bridge does with
    /// it. Gates [`Self::handle`].
    pub fn on_state(&self, bridge: impl Fn(Arc<S>) + 'static) {
        self.scheduler.set_bridge(Rc::new(bridge));
    }

    /// Hand out a read/update capability.
    ///
    /// Fails with [`StoreError::BridgeMissing`] until a presentation bridge
    /// has been attached via [`Self::on_state`]; requesting the capability
    /// before the view layer wrapped the container is an
    /// initialization-order error, raised loudly and synchronously.
    pub fn handle(&self) -> Result<StoreHandle<S>, StoreError> {
        if self.scheduler.has_bridge() {
            Ok(StoreHandle {
                scheduler: Rc::clone(&self.scheduler),
            })
        } else {
            Err(StoreError::BridgeMissing)
        }
    }
}

impl<S: Clone + Serialize + 'static> StateContainer<S> {
    /// Apply one infallible mutation.
    pub fn update(&self, mutate: impl FnOnce(&mut S, &S) + 'static) -> Completion<S> {
        self.try_update(infallible(mutate))
    }

    /// Apply one fallible mutation; an `Err` rejects the returned signal
    /// and leaves the state untouched.
    pub fn try_update(
        &self,
        mutate: impl FnOnce(&mut S, &S) -> Result<(), MutateError> + 'static,
    ) -> Completion<S> {
        enqueue_batch(&self.scheduler, vec![Box::new(mutate)])
    }

    /// Apply several mutations as one logical update call.
    ///
    /// Each mutator becomes one queued step, enqueued in the order given;
    /// the returned signal resolves with the state produced by the *last*
    /// mutator only. Intermediate states are observable solely through the
    /// change listener. Errors with [`StoreError::EmptyUpdate`] when no
    /// mutators are given.
    pub fn update_batch(&self, mutators: Vec<Mutator<S>>) -> Result<Completion<S>, StoreError> {
        if mutators.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        Ok(enqueue_batch(&self.scheduler, mutators))
    }
}

/// Cheap cloneable read/update capability over a container.
///
/// Obtained from [`StateContainer::handle`] once the presentation bridge is
/// attached; shares the container's scheduler, so updates through any
/// handle and through the container itself are serialized together.
pub struct StoreHandle<S> {
    scheduler: Rc<Scheduler<S>>,
}

impl<S> fmt::Debug for StoreHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}

impl<S> Clone for StoreHandle<S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Rc::clone(&self.scheduler),
        }
    }
}

impl<S> StoreHandle<S> {
    /// The current snapshot.
    #[must_use]
    pub fn read(&self) -> Arc<S> {
        self.scheduler.current()
    }
}

impl<S: Clone + Serialize + 'static> StoreHandle<S> {
    /// See [`StateContainer::update`].
    pub fn update(&self, mutate: impl FnOnce(&mut S, &S) + 'static) -> Completion<S> {
        self.try_update(infallible(mutate))
    }

    /// See [`StateContainer::try_update`].
    pub fn try_update(
        &self,
        mutate: impl FnOnce(&mut S, &S) -> Result<(), MutateError> + 'static,
    ) -> Completion<S> {
        enqueue_batch(&self.scheduler, vec![Box::new(mutate)])
    }

    /// See [`StateContainer::update_batch`].
    pub fn update_batch(&self, mutators: Vec<Mutator<S>>) -> Result<Completion<S>, StoreError> {
        if mutators.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        Ok(enqueue_batch(&self.scheduler, mutators))
    }
}

fn infallible<S>(
    mutate: impl FnOnce(&mut S, &S) + 'static,
) -> impl FnOnce(&mut S, &S) -> Result<(), MutateError> + 'static {
    move |draft, prior| {
        mutate(draft, prior);
        Ok(())
    }
}

/// One oneshot channel per update call, sender attached only to the last
/// step; all steps join the queue in a single append so a reentrant caller
/// can never interleave inside the batch.
fn enqueue_batch<S: Clone + Serialize + 'static>(
    scheduler: &Scheduler<S>,
    mutators: Vec<Mutator<S>>,
) -> Completion<S> {
    debug_assert!(!mutators.is_empty());
    let (sender, receiver) = oneshot::channel();
    let last = mutators.len() - 1;
    let mut sender = Some(sender);
    let steps: Vec<MutationStep<S>> = mutators
        .into_iter()
        .enumerate()
        .map(|(index, mutate)| MutationStep {
            mutate,
            completion: if index == last { sender.take() } else { None },
        })
        .collect();
    scheduler.enqueue_all(steps);
    Completion::new(receiver)
}
