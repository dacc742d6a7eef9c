//! Mutation queue and flush scheduler.
//!
//! One scheduler instance exists per container; all of its fields are owned
//! here, never in module-level state, so independent containers cannot
//! observe each other. The model is single-threaded cooperative: whichever
//! call stack flips the phase from `Idle` to `Draining` runs the whole drain
//! synchronously. Reentrant enqueues (from a change listener or a mutator)
//! append to the queue and are picked up by the already-running drain, which
//! re-checks the queue every iteration.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use strata_types::{ChangeEvent, MutateError, PatchMode, UpdateError};

use crate::engine;

/// One queued mutation: a draft-mutating closure receiving the state that
/// immediately precedes this step.
pub type Mutator<S> = Box<dyn FnOnce(&mut S, &S) -> Result<(), MutateError>>;

/// Observer invoked once per applied step with the exact before/after pair.
pub type ChangeListener<S> = Box<dyn Fn(&ChangeEvent<'_, S>)>;

pub(crate) type CompletionSender<S> = oneshot::Sender<Result<Arc<S>, UpdateError>>;

/// Queue entry: the mutator plus, for the last step of a batched update
/// call, the sender half of that call's completion signal.
pub(crate) struct MutationStep<S> {
    pub(crate) mutate: Mutator<S>,
    pub(crate) completion: Option<CompletionSender<S>>,
}

/// Flush scheduler state machine.
///
/// ```text
/// ┌────────┐        enqueue while idle        ┌──────────┐
/// │  Idle  │ ───────────────────────────────> │ Draining │
/// └────────┘ <─────────────────────────────── └──────────┘
///                    queue exhausted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Draining,
}

/// Restores `Idle` when the drain unwinds, so a panicking mutator can never
/// leave the scheduler permanently draining and wedge later updates.
struct DrainGuard<'a>(&'a Cell<Phase>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(Phase::Idle);
    }
}

pub(crate) struct Scheduler<S> {
    state: RefCell<Arc<S>>,
    queue: RefCell<VecDeque<MutationStep<S>>>,
    phase: Cell<Phase>,
    patch_mode: PatchMode,
    listener: Option<ChangeListener<S>>,
    bridge: RefCell<Option<Rc<dyn Fn(Arc<S>)>>>,
}

impl<S> Scheduler<S> {
    pub(crate) fn new(
        initial: S,
        listener: Option<ChangeListener<S>>,
        patch_mode: PatchMode,
    ) -> Self {
        Self {
            state: RefCell::new(Arc::new(initial)),
            queue: RefCell::new(VecDeque::new()),
            phase: Cell::new(Phase::Idle),
            patch_mode,
            listener,
            bridge: RefCell::new(None),
        }
    }

    /// Current snapshot. Mutated only by the drain loop.
    pub(crate) fn current(&self) -> Arc<S> {
        Arc::clone(&self.state.borrow())
    }

    pub(crate) fn set_bridge(&self, bridge: Rc<dyn Fn(Arc<S>)>) {
        *self.bridge.borrow_mut() = Some(bridge);
    }

    pub(crate) fn has_bridge(&self) -> bool {
        self.bridge.borrow().is_some()
    }
}

impl<S: Clone + Serialize + 'static> Scheduler<S> {
    /// Append a whole batch to the queue tail, then drain if idle.
    ///
    /// The batch is appended atomically (single queue borrow) so steps from
    /// one update call can never interleave with a reentrant caller's steps;
    /// interleaving happens only at call granularity. When a drain is
    /// already active this returns immediately, the running drain picks the
    /// new steps up.
    pub(crate) fn enqueue_all(&self, steps: impl IntoIterator<Item = MutationStep<S>>) {
        self.queue.borrow_mut().extend(steps);
        match self.phase.get() {
            Phase::Idle => {
                self.phase.set(Phase::Draining);
                self.drain();
            }
            Phase::Draining => {
                trace!("enqueued during active drain");
            }
        }
    }

    /// Drain the queue to exhaustion, one step at a time.
    ///
    /// Per step, in order: snapshot engine, change listener, state write,
    /// presentation bridge, completion signal. Every borrow is released
    /// before user code runs, so listeners and mutators may enqueue freely.
    /// A failing step is dropped without touching state, its completion
    /// signal is rejected, and the drain continues with the rest.
    fn drain(&self) {
        debug_assert_eq!(self.phase.get(), Phase::Draining);
        let _guard = DrainGuard(&self.phase);
        debug!(queued = self.queue.borrow().len(), "drain started");

        loop {
            let step = self.queue.borrow_mut().pop_front();
            let Some(step) = step else { break };

            let prior = self.current();
            match engine::apply(&prior, step.mutate, self.patch_mode) {
                Ok((next, patches)) => {
                    trace!(patches = patches.len(), "step applied");
                    if let Some(listener) = &self.listener {
                        listener(&ChangeEvent::new(&prior, &next, &patches));
                    }
                    *self.state.borrow_mut() = Arc::clone(&next);
                    let bridge = self.bridge.borrow().clone();
                    if let Some(bridge) = bridge {
                        bridge(Arc::clone(&next));
                    }
                    if let Some(sender) = step.completion
                        && sender.send(Ok(next)).is_err()
                    {
                        trace!("completion receiver dropped before resolution");
                    }
                }
                Err(err) => {
                    warn!(%err, "mutation step failed; state unchanged, continuing drain");
                    if let Some(sender) = step.completion {
                        let _ = sender.send(Err(UpdateError::Failed(err)));
                    }
                }
            }
        }

        debug!("drain finished");
    }
}
