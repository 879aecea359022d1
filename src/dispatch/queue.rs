//! Outbound message queue
//!
//! Components enqueue chat output through a cloneable [`Dispatcher`] handle;
//! the dispatch loop drains it at a paced rate.

use crate::types::{DispatchEntry, Nick};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Handle to the shared FIFO of outbound chat messages
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    queue: Arc<Mutex<VecDeque<DispatchEntry>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<DispatchEntry>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry to the back of the queue
    pub fn enqueue(&self, entry: DispatchEntry) {
        debug!("Queueing {} for {}", if entry.notice { "notice" } else { "message" }, entry.to);
        self.lock().push_back(entry);
    }

    /// Public message to the channel
    pub fn message(&self, body: impl Into<String>) {
        self.enqueue(DispatchEntry::channel(body));
    }

    /// Private notice to a player
    pub fn notice(&self, nick: impl Into<Nick>, body: impl Into<String>) {
        self.enqueue(DispatchEntry::notice(nick, body));
    }

    /// Private message to a player
    pub fn private(&self, nick: impl Into<Nick>, body: impl Into<String>) {
        self.enqueue(DispatchEntry::private(nick, body));
    }

    /// Remove the entry at the front of the queue
    pub fn pop(&self) -> Option<DispatchEntry> {
        self.lock().pop_front()
    }

    /// Remove and return everything queued, oldest first
    pub fn drain(&self) -> Vec<DispatchEntry> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
