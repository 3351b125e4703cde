use core::any::{type_name, Any};
use core::fmt;

use crate::error::BindError;

type Writer<'a> = Box<dyn FnOnce(Box<dyn Any + Send>) -> Result<(), BindError> + Send + 'a>;

/// A single-use, type-erased writer over a caller-provided `&mut T`.
///
/// The destination is captured at registration time, when its concrete type
/// is still known; filling the slot later only needs the erased value. A
/// `&mut` can be neither null nor a non-reference, so the only failure left
/// to check at run time is type compatibility of the produced value.
///
/// The write goes straight through the captured reference, unsynchronized.
/// Exclusivity is the borrow checker's job: two tasks cannot alias the same
/// slot because each registration takes its own `&mut` borrow.
pub(crate) struct Slot<'a> {
    write: Writer<'a>,
    expected: &'static str,
}

impl<'a> Slot<'a> {
    pub(crate) fn new<T: Send + 'static>(dest: &'a mut T) -> Self {
        Self {
            write: Box::new(move |value| match value.downcast::<T>() {
                Ok(value) => {
                    *dest = *value;
                    Ok(())
                }
                Err(_) => Err(BindError::new(type_name::<T>())),
            }),
            expected: type_name::<T>(),
        }
    }

    /// Writes `value` through the captured reference.
    ///
    /// Fails without modifying the destination when `value` is not a `T`.
    pub(crate) fn fill(self, value: Box<dyn Any + Send>) -> Result<(), BindError> {
        (self.write)(value)
    }
}

impl fmt::Debug for Slot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("expected", &self.expected).finish()
    }
}
