//! Single-resolution completion signal for a batched update call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use strata_types::UpdateError;

/// Future resolving exactly once with the state produced by the last
/// mutator of its update call.
///
/// Resolution happens only after the change listener for that step ran and
/// the container's state was updated. Intermediate mutators of the same
/// call are observable solely through the change listener. If the step's
/// mutator failed the future resolves to [`UpdateError::Failed`]; if the
/// container was dropped with the step still queued, to
/// [`UpdateError::Abandoned`]. Dropping the future does not withdraw the
/// step: once enqueued, a mutation is always applied.
#[derive(Debug)]
pub struct Completion<S> {
    receiver: oneshot::Receiver<Result<Arc<S>, UpdateError>>,
}

impl<S> Completion<S> {
    pub(crate) fn new(receiver: oneshot::Receiver<Result<Arc<S>, UpdateError>>) -> Self {
        Self { receiver }
    }

    /// Non-blocking check for a drain that already ran.
    ///
    /// In the cooperative model an `update` issued outside any drain is
    /// applied before the call returns, so the signal is typically already
    /// resolved; this reads it without an executor. Returns `None` while
    /// the step is still queued.
    pub fn try_resolved(&mut self) -> Option<Result<Arc<S>, UpdateError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(UpdateError::Abandoned)),
        }
    }
}

impl<S> Future for Completion<S> {
    type Output = Result<Arc<S>, UpdateError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(UpdateError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}
