//! In-order release of out-of-order completions.
//!
//! Tasks finish in whatever order the worker pool gets through them. The
//! [`FrameSequencer`] parks finished tasks until every earlier sequence
//! number has been emitted, so the host always sees frames in submission
//! order.

use parking_lot::Mutex;
use tracing::trace;

/// Anything carrying a submission sequence number.
pub trait Sequenced {
    fn sequence(&self) -> u64;
}

/// Parking area for finished tasks awaiting their turn.
///
/// The pending list has its own lock, held only for a scan of at most the
/// admission limit's worth of entries. Emission takes a second lock for the
/// whole drain, so two threads draining at once can never interleave.
pub struct FrameSequencer<T> {
    pending: Mutex<Vec<T>>,
    last_emitted: Mutex<u64>,
}

impl<T: Sequenced> FrameSequencer<T> {
    /// Creates a sequencer whose first emitted task carries `first_sequence`.
    pub fn new(first_sequence: u64) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            last_emitted: Mutex::new(first_sequence.wrapping_sub(1)),
        }
    }

    /// Parks a finished task.
    pub fn enqueue_finished(&self, task: T) {
        trace!(sequence = task.sequence(), "Task finished");
        self.pending.lock().push(task);
    }

    /// Removes the task that directly follows `last_emitted`, if it is here.
    pub fn dequeue_next_in_order(&self, last_emitted: u64) -> Option<T> {
        let wanted = last_emitted.wrapping_add(1);
        let mut pending = self.pending.lock();
        let pos = pending.iter().position(|t| t.sequence() == wanted)?;
        Some(pending.swap_remove(pos))
    }

    /// Emits every task that is next in order, returning how many were
    /// emitted.
    pub fn drain<F>(&self, mut emit: F) -> usize
    where
        F: FnMut(T),
    {
        let mut last = self.last_emitted.lock();
        let mut emitted = 0;
        while let Some(task) = self.dequeue_next_in_order(*last) {
            *last = task.sequence();
            emit(task);
            emitted += 1;
        }
        emitted
    }

    /// Finished tasks still waiting for an earlier one.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn last_emitted(&self) -> u64 {
        *self.last_emitted.lock()
    }
}
