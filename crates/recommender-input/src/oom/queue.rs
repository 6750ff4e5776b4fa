//! Bounded queue of pending OOM events
//!
//! The watcher produces into the queue from its background task; the
//! metrics ingestion pass drains it without blocking. The queue is bounded
//! with a drop-oldest overflow policy and a loss counter, so a paused or
//! slow consumer can never grow it without bound.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::model::OomEvent;

/// Default maximum number of pending events (5,000 entries).
pub const DEFAULT_QUEUE_CAPACITY: usize = 5_000;

/// Bounded drop-oldest queue of OOM events.
#[derive(Debug)]
pub struct OomQueue {
    events: Mutex<VecDeque<OomEvent>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl Default for OomQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl OomQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an event. When the queue is full the oldest pending event is
    /// evicted to make room; returns `true` when that happened so the caller
    /// can account for the loss.
    pub fn push(&self, event: OomEvent) -> bool {
        let mut events = self.events.lock().expect("OOM queue lock poisoned");
        let mut dropped_oldest = false;
        while events.len() >= self.capacity {
            events.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
            dropped_oldest = true;
        }
        events.push_back(event);
        dropped_oldest
    }

    /// Take the oldest pending event, never waiting for a producer.
    pub fn try_pop(&self) -> Option<OomEvent> {
        self.events
            .lock()
            .expect("OOM queue lock poisoned")
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("OOM queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of events evicted since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
