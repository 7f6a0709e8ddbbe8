use std::{
    fmt,
    mem::ManuallyDrop,
    thread::{self, ThreadId},
};

use crate::runtime::leak_detector;

/// A value that may be moved between threads but only touched on the thread
/// that created it.
///
/// Dropping it on the owning thread releases the value. Dropping it anywhere
/// else leaks the value and logs an error, since running the value's
/// destructor there would break the owning-thread invariant.
pub struct ThreadBound<T> {
    value: ManuallyDrop<T>,
    owner: ThreadId,
}

// SAFETY: the wrapped value is reachable only through `get`, which checks the
// calling thread, and `Drop` never runs the value's destructor off the owner.
unsafe impl<T> Send for ThreadBound<T> {}
// SAFETY: as above; shared access from other threads observes only `owner`.
unsafe impl<T> Sync for ThreadBound<T> {}

impl<T> ThreadBound<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            owner: thread::current().id(),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn is_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// The value, or `None` when called from a thread other than the owner.
    pub fn get(&self) -> Option<&T> {
        if self.is_owner_thread() {
            Some(&self.value)
        } else {
            None
        }
    }
}

impl<T> Drop for ThreadBound<T> {
    fn drop(&mut self) {
        if self.is_owner_thread() {
            // SAFETY: on the owning thread, and `value` is never used again.
            unsafe { ManuallyDrop::drop(&mut self.value) };
            leak_detector::record_release();
        } else {
            leak_detector::record_leak();
            tracing::error!(
                owner = ?self.owner,
                current = ?thread::current().id(),
                "thread-bound value dropped off its owning thread; leaking it"
            );
        }
    }
}

impl<T> fmt::Debug for ThreadBound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadBound")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
