//! Single-slot last-value mailbox
//!
//! The writer side belongs to the broker adapter and overwrites the slot on
//! every delivery; the reader side belongs to consumer code and takes the
//! slot. Whatever was waiting when a new value arrives is discarded.
//!
//! The slot lock only ever guards a `Bytes` swap. Decoding happens in the
//! reader after the lock is released.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

struct Shared {
    slot: Mutex<Option<Bytes>>,
    notify: Notify,
    writers: AtomicUsize,
    closed: AtomicBool,
    received: AtomicU64,
    overwritten: AtomicU64,
    expired: AtomicU64,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<Bytes>> {
        // A panic elsewhere cannot leave an Option<Bytes> half-written
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark closed under the slot lock, optionally discarding the value
    fn close(&self, discard: bool) {
        let newly_closed = {
            let mut slot = self.slot();
            if discard {
                slot.take();
            }
            !self.closed.swap(true, Ordering::AcqRel)
        };
        if newly_closed {
            // Wake every parked reader, and leave a permit for one that is
            // between its closed check and parking
            self.notify.notify_waiters();
            self.notify.notify_one();
        }
    }
}

/// Counters kept by a mailbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxCounters {
    /// Values written into the slot
    pub received: u64,
    /// Values discarded unread because a newer one arrived
    pub overwritten: u64,
    /// Deliveries dropped by the transport for exceeding the queue TTL
    pub expired: u64,
}

/// Create a connected writer/reader pair
pub fn mailbox() -> (MailboxWriter, MailboxReader) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        notify: Notify::new(),
        writers: AtomicUsize::new(1),
        closed: AtomicBool::new(false),
        received: AtomicU64::new(0),
        overwritten: AtomicU64::new(0),
        expired: AtomicU64::new(0),
    });
    (
        MailboxWriter {
            shared: Arc::clone(&shared),
        },
        MailboxReader { shared },
    )
}

/// Delivery side of a mailbox
///
/// Cloneable so a broker callback can hold its own copy. The mailbox
/// closes when the last writer is dropped.
pub struct MailboxWriter {
    shared: Arc<Shared>,
}

impl MailboxWriter {
    /// Overwrite the slot
    ///
    /// Returns `true` when an unread value was discarded. Writes after the
    /// reader closed the mailbox are ignored.
    pub fn put(&self, payload: Bytes) -> bool {
        let previous = {
            // Checked under the slot lock so a concurrent close cannot be
            // followed by a stored value
            let mut slot = self.shared.slot();
            if self.shared.closed.load(Ordering::Acquire) {
                return false;
            }
            slot.replace(payload)
        };
        self.shared.received.fetch_add(1, Ordering::Relaxed);
        self.shared.notify.notify_one();

        let overwritten = previous.is_some();
        if overwritten {
            self.shared.overwritten.fetch_add(1, Ordering::Relaxed);
        }
        overwritten
    }

    /// Count a delivery dropped for age before reaching the slot
    pub fn record_expired(&self) {
        self.shared.expired.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether the reader closed the mailbox
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Clone for MailboxWriter {
    fn clone(&self) -> Self {
        self.shared.writers.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for MailboxWriter {
    fn drop(&mut self) {
        if self.shared.writers.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.close(false);
        }
    }
}

/// Consumer side of a mailbox
pub struct MailboxReader {
    shared: Arc<Shared>,
}

impl MailboxReader {
    /// Take and clear the slot without waiting
    pub fn take(&self) -> Option<Bytes> {
        self.shared.slot().take()
    }

    /// Whether a value is waiting
    pub fn has_value(&self) -> bool {
        self.shared.slot().is_some()
    }

    /// Wait for the next value
    ///
    /// Returns `None` once the mailbox is closed and the slot is empty.
    /// Cancel safe: dropping the future loses no value.
    pub async fn recv(&self) -> Option<Bytes> {
        loop {
            if let Some(value) = self.take() {
                return Some(value);
            }
            if self.is_closed() {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Whether the mailbox is closed (writers gone or reader closed it)
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Stop accepting values and drop whatever is waiting
    pub fn close(&self) {
        self.shared.close(true);
    }

    pub fn counters(&self) -> MailboxCounters {
        MailboxCounters {
            received: self.shared.received.load(Ordering::Relaxed),
            overwritten: self.shared.overwritten.load(Ordering::Relaxed),
            expired: self.shared.expired.load(Ordering::Relaxed),
        }
    }
}
