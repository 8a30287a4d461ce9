//! Bounded, keyed pending-request queue.
//!
//! Grounded on `neu_async_queue` (`include/neuron/utils/async_queue.h`): a small mutex-protected
//! collection keyed by an arbitrary `u64`, supporting push, pop-by-key, expiry sweeps and a
//! filtered bulk removal. The original's "async" refers to matching requests to out-of-order
//! responses, not to `Future`s — a plain `Mutex<VecDeque<_>>` is the natural Rust shape.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A queue of pending items keyed by an identifier (typically a Modbus sequence number), with a
/// fixed capacity past which the oldest entry is dropped.
pub struct PendingQueue<T> {
    items: Mutex<VecDeque<(u64, T)>>,
    max_size: usize,
}

impl<T> PendingQueue<T> {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            max_size,
        }
    }

    /// Push `item` under `key`, evicting the oldest entry if the queue is at capacity.
    pub fn push(&self, key: u64, item: T) {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.max_size {
            items.pop_front();
        }
        items.push_back((key, item));
    }

    /// Remove and return the first item matching `key`, if any.
    pub fn pop(&self, key: u64) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        let pos = items.iter().position(|(k, _)| *k == key)?;
        items.remove(pos).map(|(_, v)| v)
    }

    /// Drop every item for which `expire` returns `true`.
    pub fn sweep_expired(&self, mut expire: impl FnMut(&T) -> bool) {
        let mut items = self.items.lock().unwrap();
        items.retain(|(_, v)| !expire(v));
    }

    /// Remove every item matching `filter`, returning how many were removed.
    pub fn remove_matching(&self, mut filter: impl FnMut(&T) -> bool) -> usize {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|(_, v)| !filter(v));
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
