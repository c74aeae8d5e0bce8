//! Blocking FIFO handed from the scanner to one resolver.
//!
//! The scanner pushes lookups and closes the queue once scanning ends; the
//! resolver keeps popping until the queue is closed and empty. Cancellation
//! is checked under the same lock as the dequeue, so a shutdown is never
//! missed by a waiting resolver.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Eq, PartialEq)]
pub enum Dequeue<T> {
    Item(T),
    Closed,
    Cancelled,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    cancelled: bool,
    pushed: u64,
    popped: u64,
}

#[derive(Debug)]
pub struct LookupQueue<T> {
    state: Mutex<QueueState<T>>,
    cv: Condvar,
}

impl<T> Default for LookupQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LookupQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
                cancelled: false,
                pushed: 0,
                popped: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Returns `false` when the queue no longer accepts work.
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.cancelled {
            return false;
        }
        state.items.push_back(item);
        state.pushed += 1;
        drop(state);
        self.cv.notify_one();
        true
    }

    pub fn pop_blocking(&self) -> Dequeue<T> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return Dequeue::Cancelled;
            }
            if let Some(item) = state.items.pop_front() {
                state.popped += 1;
                return Dequeue::Item(item);
            }
            if state.closed {
                return Dequeue::Closed;
            }
            self.cv.wait(&mut state);
        }
    }

    /// No more pushes; items already queued are still handed out.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.cv.notify_all();
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        state.items.clear();
        drop(state);
        self.cv.notify_all();
    }

    pub fn pending(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn pushed(&self) -> u64 {
        self.state.lock().pushed
    }

    pub fn popped(&self) -> u64 {
        self.state.lock().popped
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn hands_out_items_in_insertion_order() {
        let queue = LookupQueue::new();
        for value in 0..5 {
            assert!(queue.push(value));
        }
        queue.close();

        let mut seen = Vec::new();
        while let Dequeue::Item(value) = queue.pop_blocking() {
            seen.push(value);
        }
        assert_eq!(seen, [0, 1, 2, 3, 4]);
        assert_eq!(queue.pushed(), queue.popped());
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn close_wakes_blocked_consumer() {
        let queue = Arc::new(LookupQueue::<u32>::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(consumer.join().expect("join"), Dequeue::Closed);
    }

    #[test]
    fn cancel_wins_over_pending_items() {
        let queue = LookupQueue::new();
        queue.push("a");
        queue.cancel();
        assert_eq!(queue.pop_blocking(), Dequeue::Cancelled);
        assert!(!queue.push("b"));
    }

    #[test]
    fn pending_tracks_pushes_minus_pops() {
        let queue = LookupQueue::new();
        queue.push(1);
        queue.push(2);
        assert_eq!(queue.pending(), 2);
        assert_eq!(queue.pop_blocking(), Dequeue::Item(1));
        assert_eq!(queue.pending() as u64, queue.pushed() - queue.popped());
        assert!(!queue.is_closed());
    }
}
