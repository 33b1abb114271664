//! Bounded multi-producer/multi-consumer slot queue.
//!
//! A lock-free [`ArrayQueue`] paired with a [`Notify`] so consumers can
//! either take an item without waiting or park until one is pushed. Both
//! the ready sessions and the reserved slots of a pool live in one of
//! these.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;
use tokio::sync::Notify;

pub(crate) struct SlotQueue<T> {
    items: ArrayQueue<T>,
    available: Notify,
    closed: AtomicBool,
}

impl<T> SlotQueue<T> {
    /// Create a queue holding at most `capacity` items (must be non-zero).
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            items: ArrayQueue::new(capacity),
            available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Take an item if one is queued.
    pub(crate) fn try_pop(&self) -> Option<T> {
        self.items.pop()
    }

    /// Queue an item without waiting. Hands it back if the queue is full or closed.
    pub(crate) fn try_push(&self, item: T) -> Result<(), T> {
        if self.is_closed() {
            return Err(item);
        }
        self.items.push(item)?;
        self.available.notify_one();
        Ok(())
    }

    /// Wait until an item can be taken. Returns `None` once the queue is closed.
    ///
    /// Cancel-safe: an item is only removed in the poll that returns it.
    pub(crate) async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent push cannot slip between.
            notified.as_mut().enable();

            if self.is_closed() {
                return None;
            }
            if let Some(item) = self.items.pop() {
                return Some(item);
            }

            notified.await;
        }
    }

    /// Reject further pushes and wake every waiting consumer.
    ///
    /// Items still queued stay reachable through [`try_pop`](Self::try_pop).
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.available.notify_waiters();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
