//! Work queue with completion tracking.
//!
//! A channel plus a pending-item count. Producers [`put`](WorkQueue::put),
//! workers [`claim`](WorkQueue::claim) and acknowledge with
//! [`task_done`](WorkQueue::task_done), and the orchestrator blocks in
//! [`join`](WorkQueue::join) until every item put has been acknowledged.
//!
//! Closing the queue disconnects the channel: claims keep returning the items
//! still buffered, then `None`. That is the workers' exit signal.

use crate::{Error, Result};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};

pub struct WorkQueue<T> {
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    pending: Mutex<usize>,
    drained: Condvar,
}

impl<T> WorkQueue<T> {
    /// A queue holding at most `capacity` unclaimed items; `put` blocks when
    /// it is full.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        Self::from_channel(sender, receiver)
    }

    pub fn unbounded() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self::from_channel(sender, receiver)
    }

    fn from_channel(sender: Sender<T>, receiver: Receiver<T>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            pending: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Enqueue an item, counting it as pending until acknowledged.
    pub fn put(&self, item: T) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or(Error::QueueClosed)?;

        *self.pending.lock() += 1;
        if sender.send(item).is_err() {
            self.task_done();
            return Err(Error::QueueClosed);
        }
        Ok(())
    }

    /// Block until an item is available. `None` once the queue is closed
    /// and empty.
    pub fn claim(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Acknowledge one claimed item as fully processed.
    pub fn task_done(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until every item put has been acknowledged.
    pub fn join(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.drained.wait(&mut pending);
        }
    }

    /// Refuse further puts and let workers drain the remaining items.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Items put but not yet acknowledged.
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }
}
