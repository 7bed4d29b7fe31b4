use parking_lot::Mutex;

use crate::snapshot::Snapshot;

/// Mutex-guarded holder of a screen's last-known snapshot.
///
/// Every operation holds the lock only for an `Arc` assignment, and
/// [`AtomicSnapshot::swap`] is the single way to obtain the "old" side of a diff,
/// which totally orders writes even when recomputations race.
#[derive(Debug)]
pub struct AtomicSnapshot<E> {
    current: Mutex<Snapshot<E>>,
}

impl<E> Default for AtomicSnapshot<E> {
    fn default() -> Self {
        Self::new(Snapshot::empty())
    }
}

impl<E> AtomicSnapshot<E> {
    pub fn new(initial: Snapshot<E>) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    /// Current value.
    pub fn read(&self) -> Snapshot<E> {
        self.current.lock().clone()
    }

    /// Replace the stored value and return the one it replaced.
    pub fn swap(&self, next: Snapshot<E>) -> Snapshot<E> {
        std::mem::replace(&mut *self.current.lock(), next)
    }

    /// Apply a pure transform under the lock and return the new value.
    pub fn modify(&self, f: impl FnOnce(&Snapshot<E>) -> Snapshot<E>) -> Snapshot<E> {
        let mut current = self.current.lock();
        let next = f(&current);
        *current = next.clone();
        next
    }

    /// Drop the stored entries, returning what was held.
    pub fn reset(&self) -> Snapshot<E> {
        self.swap(Snapshot::empty())
    }
}
