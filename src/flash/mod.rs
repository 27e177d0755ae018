//! Flash message queue.
//!
//! Messages keep insertion order. Each one owns its own expiry timer and is
//! removed by id, either when that timer fires or when the user dismisses it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::models::FlashMessage;

/// Stable handle for one queued message.
pub type FlashId = u64;

/// A queued message as seen by renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashEntry {
    pub id: FlashId,
    pub message: FlashMessage,
}

struct Slot {
    entry: FlashEntry,
    expiry: Option<AbortHandle>,
}

#[derive(Default)]
struct Inner {
    next_id: FlashId,
    slots: Vec<Slot>,
}

impl Inner {
    fn remove(&mut self, id: FlashId) -> Option<Slot> {
        let pos = self.slots.iter().position(|s| s.entry.id == id)?;
        Some(self.slots.remove(pos))
    }
}

/// Ordered, auto-expiring set of user-facing notices.
#[derive(Clone)]
pub struct FlashQueue {
    inner: Arc<Mutex<Inner>>,
    display_timeout: Duration,
}

impl FlashQueue {
    pub fn new(display_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            display_timeout,
        }
    }

    pub fn display_timeout(&self) -> Duration {
        self.display_timeout
    }

    /// Append a message and schedule its removal.
    ///
    /// Outside a Tokio runtime the message stays until dismissed.
    pub fn push(&self, message: FlashMessage) -> FlashId {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.slots.push(Slot {
                entry: FlashEntry { id, message },
                expiry: None,
            });
            id
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak = Arc::downgrade(&self.inner);
                let timeout = self.display_timeout;
                let task = handle.spawn(async move {
                    tokio::time::sleep(timeout).await;
                    expire(weak, id);
                });
                if let Some(slot) = self.lock().slots.iter_mut().find(|s| s.entry.id == id) {
                    slot.expiry = Some(task.abort_handle());
                }
            }
            Err(_) => tracing::debug!("No runtime; flash {} will not expire", id),
        }

        id
    }

    pub fn extend<I>(&self, messages: I) -> Vec<FlashId>
    where
        I: IntoIterator<Item = FlashMessage>,
    {
        messages.into_iter().map(|m| self.push(m)).collect()
    }

    /// Remove one message early. Other messages and their timers are untouched.
    pub fn dismiss(&self, id: FlashId) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(slot) => {
                if let Some(expiry) = slot.expiry {
                    expiry.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Current messages in insertion order.
    pub fn snapshot(&self) -> Vec<FlashEntry> {
        self.lock().slots.iter().map(|s| s.entry.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn expire(queue: Weak<Mutex<Inner>>, id: FlashId) {
    if let Some(inner) = queue.upgrade() {
        let removed = inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            tracing::trace!("Flash {} expired", id);
        }
    }
}
