//! Bounded durable FIFO queue for messages that failed transmission.
//!
//! The queue owns its backing store exclusively and treats entries as
//! opaque byte sequences — it never parses or re-serializes a message, so
//! the persistence framing and the message schema cannot grow accidental
//! coupling.
//!
//! Capacity policy is drop-newest: when the queue is full the incoming
//! message is rejected and the stored entries are kept. The oldest
//! readings survive a long outage; the newest are the bounded data loss.

use thiserror::Error;
use tracing::debug;

use super::{
    message::Message,
    store::{RecordStore, StoreError},
};

/// Errors from queue mutations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue already holds `capacity` entries; the new message was
    /// not stored.
    #[error("offline queue is full ({capacity} entries)")]
    Full { capacity: usize },

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bounded, order-preserving, durable message queue.
pub struct OfflineQueue<S: RecordStore> {
    store: S,
    capacity: usize,
}

impl<S: RecordStore> OfflineQueue<S> {
    pub fn new(store: S, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Appends a message at the tail.
    ///
    /// Returns [`QueueError::Full`] without storing anything when the
    /// queue is at capacity. Once this returns `Ok` the entry is durable.
    pub fn enqueue(&mut self, message: &Message) -> Result<(), QueueError> {
        let count = self.count();
        if count >= self.capacity {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }

        self.store.append(message.as_bytes())?;
        debug!("stored reading offline ({}/{})", count + 1, self.capacity);
        Ok(())
    }

    /// Current number of stored entries.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// All entries oldest-first, without removing them.
    ///
    /// Flush is all-or-retry-next-cycle: the caller publishes these and
    /// only calls [`clear`](OfflineQueue::clear) once every one of them
    /// was delivered.
    pub fn drain_all(&self) -> Vec<Vec<u8>> {
        self.store.list()
    }

    /// Removes every entry. Only call after confirming full delivery;
    /// partial removal is deliberately not supported.
    pub fn clear(&mut self) -> Result<(), QueueError> {
        self.store.clear()?;
        debug!("offline queue cleared");
        Ok(())
    }
}
