use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;

use async_io::Timer;
use pin_project::pin_project;
use tokio_util::sync::CancellationToken;

use crate::batch::{Task, UnitFuture};
use crate::error::BatchError;

/// A future which drives every unit of a batch to completion.
///
/// This `struct` is created by the [`run`] method on [`Batch`]. See its
/// documentation for more.
///
/// All units are polled within this single future; nothing is spawned. On
/// the first unit failure the group token is cancelled, and the remaining
/// units report cancellation once their operation returns — they are
/// drained, not dropped, so in-flight operations always run to completion.
///
/// [`run`]: crate::Batch::run
/// [`Batch`]: crate::Batch
#[must_use = "futures do nothing unless you `.await` or poll them"]
#[pin_project]
pub struct Run<'a, E> {
    /// Units still in flight; finished units are removed as they resolve.
    units: Vec<UnitFuture<'a, E>>,
    /// The first failure observed across all units.
    first_error: Option<BatchError<E>>,
    /// The token governing this execution; a child of the caller's token.
    group: CancellationToken,
    deadline: Deadline,
    /// Whether the future has completed.
    done: bool,
}

/// The batch deadline. Armed lazily on the first poll so the clock does not
/// run while the future sits unpolled; the timer is owned here and released
/// when the `Run` future goes away, whatever the outcome.
enum Deadline {
    None,
    Unarmed(Duration),
    Armed(Duration, Timer),
    Expired(Duration),
}

impl Deadline {
    /// Polls the deadline, arming the timer on first use. Returns the
    /// configured timeout on the poll in which it expires.
    fn poll_expired(&mut self, cx: &mut Context<'_>) -> Option<Duration> {
        if let Deadline::Unarmed(timeout) = *self {
            *self = Deadline::Armed(timeout, Timer::after(timeout));
        }
        match self {
            Deadline::Armed(timeout, timer) => match Pin::new(timer).poll(cx) {
                Poll::Ready(_) => {
                    let timeout = *timeout;
                    *self = Deadline::Expired(timeout);
                    Some(timeout)
                }
                Poll::Pending => None,
            },
            _ => None,
        }
    }

    fn expired(&self) -> Option<Duration> {
        match *self {
            Deadline::Expired(timeout) => Some(timeout),
            _ => None,
        }
    }
}

impl<'a, E: 'a> Run<'a, E> {
    pub(crate) fn new(
        tasks: Vec<Task<'a, E>>,
        timeout: Option<Duration>,
        group: CancellationToken,
    ) -> Self {
        let units = tasks
            .into_iter()
            .map(|task| task.into_unit(group.clone()))
            .collect();
        Self {
            units,
            first_error: None,
            group,
            deadline: match timeout {
                Some(timeout) => Deadline::Unarmed(timeout),
                None => Deadline::None,
            },
            done: false,
        }
    }
}

impl<'a, E: 'a> Future for Run<'a, E> {
    type Output = Result<(), BatchError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        assert!(!*this.done, "future polled after completing");

        // An empty batch resolves before any timer or token machinery runs.
        if this.units.is_empty() {
            *this.done = true;
            return Poll::Ready(Ok(()));
        }

        // Expire the deadline before polling units, so a unit completing in
        // the same wake observes the cancellation.
        if this.deadline.poll_expired(cx).is_some() {
            this.group.cancel();
        }

        // Poll every unit still in flight. A shared waker across all units
        // means any wake re-polls the whole set; fine for the small batches
        // this crate targets.
        let mut i = 0;
        while i < this.units.len() {
            match this.units[i].as_mut().poll(cx) {
                Poll::Ready(res) => {
                    this.units.swap_remove(i);
                    if let Err(err) = res {
                        if this.first_error.is_none() {
                            // A cancellation caused by our own deadline is a
                            // timeout from the caller's point of view.
                            let err = match (err, this.deadline.expired()) {
                                (BatchError::Cancelled, Some(timeout)) => {
                                    BatchError::TimedOut(timeout)
                                }
                                (err, _) => err,
                            };
                            *this.first_error = Some(err);
                            // Signal the remaining units; they report
                            // cancellation once their operation returns.
                            this.group.cancel();
                        }
                    }
                }
                Poll::Pending => i += 1,
            }
        }

        if this.units.is_empty() {
            *this.done = true;
            match this.first_error.take() {
                Some(err) => Poll::Ready(Err(err)),
                None => Poll::Ready(Ok(())),
            }
        } else {
            Poll::Pending
        }
    }
}

impl<E> fmt::Debug for Run<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("pending", &self.units.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
