use core::fmt;
use core::time::Duration;
use std::error::Error;

/// An error produced while writing a task's result into its slot.
///
/// Only the dynamically-typed registration path ([`task_any`]) can produce
/// this error: the value the operation produced failed to downcast to the
/// concrete type of its destination slot. Registrations made through
/// [`task`] share a single type parameter between the slot and the
/// operation, so they are checked at compile time and never fail to bind.
///
/// [`task`]: crate::Batch::task
/// [`task_any`]: crate::Batch::task_any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    expected: &'static str,
}

impl BindError {
    pub(crate) fn new(expected: &'static str) -> Self {
        Self { expected }
    }

    /// The type name of the slot the produced value could not be assigned to.
    pub fn expected(&self) -> &'static str {
        self.expected
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type mismatch: produced value is not assignable to a slot of type `{}`",
            self.expected
        )
    }
}

impl Error for BindError {}

/// The error a batch resolves to when any of its units fails.
///
/// Exactly one `BatchError` is reported per execution: the first failure
/// observed across all units. `E` is the error type shared by the batch's
/// operations.
#[derive(Debug)]
pub enum BatchError<E> {
    /// An operation returned an error. Carried verbatim.
    Op(E),
    /// An operation succeeded but its produced value could not be written
    /// into its result slot.
    Bind(BindError),
    /// The batch was cancelled — by the caller's token or by a sibling's
    /// failure — before this unit's result could be processed.
    Cancelled,
    /// The batch-wide timeout expired. Carries the configured timeout.
    TimedOut(Duration),
}

impl<E> BatchError<E> {
    /// Returns `true` if the batch failed because its deadline expired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Returns `true` if the batch was cancelled from the outside, as
    /// opposed to timing out or failing on its own.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the operation error, if an operation failure is what failed
    /// the batch.
    pub fn into_op(self) -> Option<E> {
        match self {
            Self::Op(err) => Some(err),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for BatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(err) => write!(f, "{err}"),
            Self::Bind(err) => write!(f, "failed to assign task result: {err}"),
            Self::Cancelled => write!(f, "batch was cancelled"),
            Self::TimedOut(timeout) => write!(f, "batch timed out after {timeout:?}"),
        }
    }
}

impl<E: Error + 'static> Error for BatchError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Op(err) => Some(err),
            Self::Bind(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    #[test]
    fn op_error_displays_verbatim() {
        let err: BatchError<io::Error> =
            BatchError::Op(io::Error::new(io::ErrorKind::Other, "oh no"));
        assert_eq!(err.to_string(), "oh no");
        assert!(!err.is_timeout());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn bind_error_names_the_slot_type() {
        let err: BatchError<io::Error> = BatchError::Bind(BindError::new("alloc::string::String"));
        assert_eq!(
            err.to_string(),
            "failed to assign task result: type mismatch: produced value is \
             not assignable to a slot of type `alloc::string::String`"
        );
    }

    #[test]
    fn timeout_is_distinguishable() {
        let err: BatchError<io::Error> = BatchError::TimedOut(Duration::from_millis(50));
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert_eq!(err.to_string(), "batch timed out after 50ms");
    }

    #[test]
    fn into_op_unwraps_only_operation_failures() {
        let err: BatchError<&str> = BatchError::Op("boom");
        assert_eq!(err.into_op(), Some("boom"));

        let err: BatchError<&str> = BatchError::Cancelled;
        assert_eq!(err.into_op(), None);
    }
}
