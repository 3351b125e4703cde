use core::any::Any;
use core::fmt;
use core::future::{Future, IntoFuture};
use core::pin::Pin;
use core::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::BatchError;
use crate::run::Run;
use crate::slot::Slot;

/// A boxed operation. `Ok(None)` means "success, nothing produced": the
/// destination slot keeps its prior value.
type OpFuture<'a, E> =
    Pin<Box<dyn Future<Output = Result<Option<Box<dyn Any + Send>>, E>> + Send + 'a>>;

/// One unit of work: an operation plus its binder step, bound to the group
/// token governing the execution.
pub(crate) type UnitFuture<'a, E> =
    Pin<Box<dyn Future<Output = Result<(), BatchError<E>>> + Send + 'a>>;

/// One registered operation paired with the slot its result lands in.
///
/// Pure data; constructed once per registration and consumed once at
/// execution time. A task registered through [`Batch::effect`] has no slot
/// and discards whatever its operation produces.
pub(crate) struct Task<'a, E> {
    op: OpFuture<'a, E>,
    slot: Option<Slot<'a>>,
}

impl<'a, E: 'a> Task<'a, E> {
    /// Converts the task into its unit of work.
    ///
    /// The unit awaits the operation, then checks the group token before
    /// touching the result: a unit that finishes while the group is already
    /// cancelled reports the cancellation, not a stale success.
    pub(crate) fn into_unit(self, group: CancellationToken) -> UnitFuture<'a, E> {
        let Self { op, slot } = self;
        Box::pin(async move {
            let res = op.await;

            if group.is_cancelled() {
                return Err(BatchError::Cancelled);
            }

            match res {
                Ok(Some(value)) => match slot {
                    Some(slot) => slot.fill(value).map_err(BatchError::Bind),
                    None => Ok(()),
                },
                Ok(None) => Ok(()),
                Err(err) => Err(BatchError::Op(err)),
            }
        })
    }
}

/// A batch of async operations to run concurrently.
///
/// Starts empty, accumulates `(slot, operation)` pairs in registration
/// order, and is consumed by [`run`][Batch::run]. Registration performs no
/// validation and never blocks; all the work happens when the returned
/// [`Run`] future is awaited. Use a fresh batch per execution.
///
/// The builder is single-writer: it is meant to be chained in one place, not
/// shared across threads during registration.
#[must_use = "a batch does nothing unless you `run` it"]
pub struct Batch<'a, E> {
    tasks: Vec<Task<'a, E>>,
    timeout: Option<Duration>,
}

impl<'a, E: 'a> Batch<'a, E> {
    /// Creates an empty batch with no timeout.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            timeout: None,
        }
    }

    /// Registers an operation whose result is written into `slot`.
    ///
    /// The slot and the operation share the type parameter `T`, so a
    /// produced value is assignable to its destination by construction.
    /// Producing `Ok(None)` is success without a value: the slot keeps
    /// whatever it held before.
    pub fn task<T, F>(mut self, slot: &'a mut T, op: F) -> Self
    where
        T: Send + 'static,
        F: IntoFuture<Output = Result<Option<T>, E>>,
        F::IntoFuture: Send + 'a,
    {
        let op = op.into_future();
        let op: OpFuture<'a, E> = Box::pin(async move {
            let value = op.await?;
            Ok(value.map(|value| Box::new(value) as Box<dyn Any + Send>))
        });
        self.tasks.push(Task {
            op,
            slot: Some(Slot::new(slot)),
        });
        self
    }

    /// Registers an operation producing a dynamically-typed value.
    ///
    /// Unlike [`task`][Batch::task], the produced `Box<dyn Any + Send>` is
    /// only checked against the slot's type when the result is bound; an
    /// incompatible value fails the unit with [`BatchError::Bind`] and
    /// leaves the slot unmodified.
    pub fn task_any<T, F>(mut self, slot: &'a mut T, op: F) -> Self
    where
        T: Send + 'static,
        F: IntoFuture<Output = Result<Option<Box<dyn Any + Send>>, E>>,
        F::IntoFuture: Send + 'a,
    {
        self.tasks.push(Task {
            op: Box::pin(op.into_future()),
            slot: Some(Slot::new(slot)),
        });
        self
    }

    /// Registers an operation run purely for its side effects, with no
    /// result slot.
    pub fn effect<F>(mut self, op: F) -> Self
    where
        F: IntoFuture<Output = Result<(), E>>,
        F::IntoFuture: Send + 'a,
    {
        let op = op.into_future();
        let op: OpFuture<'a, E> = Box::pin(async move {
            op.await?;
            Ok(None::<Box<dyn Any + Send>>)
        });
        self.tasks.push(Task { op, slot: None });
        self
    }

    /// Bounds the whole batch with `timeout`, measured from the first poll
    /// of the [`Run`] future. Setting it again overwrites the previous
    /// value; only one timeout is active per batch.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no tasks have been registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Consumes the batch and returns the future driving its execution.
    ///
    /// A child token is derived from `parent`, so cancelling the group on a
    /// unit failure never cancels the caller's token; cancelling `parent`
    /// cancels the batch.
    pub fn run(self, parent: &CancellationToken) -> Run<'a, E> {
        Run::new(self.tasks, self.timeout, parent.child_token())
    }
}

impl<'a, E: 'a> Default for Batch<'a, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Batch<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("tasks", &self.tasks.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chained_registration_accumulates_tasks() {
        let (mut a, mut b, mut c) = (0u8, 0u16, 0u32);
        let batch = Batch::<&str>::new()
            .task(&mut a, async { Ok(Some(1)) })
            .task(&mut b, async { Ok(Some(2)) })
            .task(&mut c, async { Ok(Some(3)) });
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
    }

    #[test]
    fn last_timeout_wins() {
        let batch = Batch::<&str>::new()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_millis(5));
        assert_eq!(batch.timeout, Some(Duration::from_millis(5)));
    }

    #[test]
    fn debug_reports_shape_not_contents() {
        let mut x = 0u8;
        let batch = Batch::<&str>::new()
            .task(&mut x, async { Ok(Some(1)) })
            .with_timeout(Duration::from_millis(10));
        assert_eq!(format!("{batch:?}"), "Batch { tasks: 1, timeout: Some(10ms) }");
    }
}
