use crate::error::QueueError;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Shared<T> {
    name: String,
    capacity: Option<usize>,
    /// `None` once the queue has been closed
    sender: Mutex<Option<Sender<T>>>,
    receiver: Receiver<T>,
    sent_count: AtomicU64,
    received_count: AtomicU64,
    block_count: AtomicU64,
}

/// A closable FIFO hand-off between two concurrent tasks.
///
/// Handles are cheap to clone and all clones refer to the same channel.
/// Closing is one-way and one-time: after [`Queue::close`] readers drain
/// whatever is still buffered and then observe end-of-stream. Writing to a
/// closed queue, or closing it twice, violates the single-writer contract
/// and panics with the queue's name.
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Queue<T> {
    /// Create a bounded queue. A capacity of 0 makes every send a
    /// synchronous hand-off that waits for a reader.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self::from_channel(name.into(), Some(capacity), channel::bounded(capacity))
    }

    /// Create a queue that never blocks writers
    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::from_channel(name.into(), None, channel::unbounded())
    }

    fn from_channel(
        name: String,
        capacity: Option<usize>,
        (sender, receiver): (Sender<T>, Receiver<T>),
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                capacity,
                sender: Mutex::new(Some(sender)),
                receiver,
                sent_count: AtomicU64::new(0),
                received_count: AtomicU64::new(0),
                block_count: AtomicU64::new(0),
            }),
        }
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Buffer capacity, `None` for unbounded queues
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }

    /// Blocking write. Waits while the queue is full.
    ///
    /// # Panics
    ///
    /// Panics if the queue has already been closed.
    pub fn send(&self, item: T) {
        let sender = match &*self.shared.sender.lock() {
            Some(sender) => sender.clone(),
            None => panic!("send on closed queue '{}'", self.name()),
        };

        let result = match sender.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(item)) => {
                self.shared.block_count.fetch_add(1, Ordering::Relaxed);
                sender.send(item).map_err(|_| ())
            }
            Err(TrySendError::Disconnected(_)) => Err(()),
        };
        if result.is_err() {
            // The queue owns a receiver, so the channel cannot disconnect while a handle lives
            panic!("queue '{}' lost its receiver", self.name());
        }
        self.shared.sent_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Non-blocking write. The item is handed back when the queue is full or closed.
    pub fn try_send(&self, item: T) -> Result<(), QueueError<T>> {
        let guard = self.shared.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(QueueError::Closed(item));
        };
        match sender.try_send(item) {
            Ok(()) => {
                self.shared.sent_count.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(item)) => Err(QueueError::Full(item)),
            Err(TrySendError::Disconnected(item)) => Err(QueueError::Closed(item)),
        }
    }

    /// Blocking read. Returns `None` once the queue is closed and drained.
    pub fn recv(&self) -> Option<T> {
        let item = self.shared.receiver.recv().ok();
        self.record_received(item.is_some());
        item
    }

    /// Read with a deadline. Returns `None` if nothing arrived in time or the
    /// queue is closed and drained. An item arriving after the deadline stays
    /// queued for the next reader.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let item = match self.shared.receiver.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        };
        self.record_received(item.is_some());
        item
    }

    /// Non-blocking read
    pub fn try_recv(&self) -> Option<T> {
        let item = self.shared.receiver.try_recv().ok();
        self.record_received(item.is_some());
        item
    }

    /// Iterate over items until the queue is closed and drained
    pub fn iter(&self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    fn record_received(&self, received: bool) {
        if received {
            self.shared.received_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Signal that no further items will be written.
    ///
    /// # Panics
    ///
    /// Panics if the queue was already closed.
    pub fn close(&self) {
        if !self.close_if_open() {
            panic!("close of closed queue '{}'", self.name());
        }
    }

    /// Close the queue unless it is already closed. Returns whether this call closed it.
    pub(crate) fn close_if_open(&self) -> bool {
        self.shared.sender.lock().take().is_some()
    }

    /// Whether [`Queue::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.shared.sender.lock().is_none()
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Whether no items are buffered
    pub fn is_empty(&self) -> bool {
        self.shared.receiver.is_empty()
    }

    /// Whether both handles refer to the same channel
    pub fn same_queue(&self, other: &Queue<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Total number of items written
    pub fn sent_count(&self) -> u64 {
        self.shared.sent_count.load(Ordering::Relaxed)
    }

    /// Total number of items read
    pub fn received_count(&self) -> u64 {
        self.shared.received_count.load(Ordering::Relaxed)
    }

    /// Number of writes that found the queue full and had to wait
    pub fn block_count(&self) -> u64 {
        self.shared.block_count.load(Ordering::Relaxed)
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name())
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Blocking iterator returned by [`Queue::iter`]
pub struct Drain<'a, T> {
    queue: &'a Queue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.queue.recv()
    }
}

impl<'a, T> IntoIterator for &'a Queue<T> {
    type Item = T;
    type IntoIter = Drain<'a, T>;

    fn into_iter(self) -> Drain<'a, T> {
        self.iter()
    }
}
