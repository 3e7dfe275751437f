//! Bounded MPMC queue with condvar wait/signal and a shutdown flag.
//!
//! Grounded on `original_source/code/logsys/blockqueue.h`'s
//! `BlockQueue<T>`: one mutex, a producer condvar and a consumer
//! condvar, capacity-bounded `push`, blocking/timed `pop`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

struct Inner<T> {
    queue: VecDeque<T>,
    closed: bool,
}

pub struct BlockingQueue<T> {
    capacity: usize,
    state: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        BlockingQueue {
            capacity,
            state: Mutex::new(Inner {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.state.lock().unwrap().queue.len() >= self.capacity
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().queue.clear();
    }

    /// Blocks while the queue is full. Returns immediately (without
    /// enqueuing) if the queue has been closed.
    pub fn push(&self, item: T) {
        let mut guard = self.state.lock().unwrap();
        while guard.queue.len() >= self.capacity && !guard.closed {
            guard = self.not_full.wait(guard).unwrap();
        }
        if guard.closed {
            return;
        }
        guard.queue.push_back(item);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Blocks while empty; returns `None` once the queue is closed and
    /// drained.
    pub fn pop(&self) -> Option<T> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(item) = guard.queue.pop_front() {
                drop(guard);
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            guard = self.not_empty.wait(guard).unwrap();
        }
    }

    /// Non-blocking variant of [`push`](Self::push): hands the item
    /// back instead of waiting if the queue is full or closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut guard = self.state.lock().unwrap();
        if guard.closed || guard.queue.len() >= self.capacity {
            return Err(item);
        }
        guard.queue.push_back(item);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// As [`pop`](Self::pop), but gives up after `timeout` with `None`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut guard = self.state.lock().unwrap();
        loop {
            if let Some(item) = guard.queue.pop_front() {
                drop(guard);
                self.not_full.notify_one();
                return Some(item);
            }
            if guard.closed {
                return None;
            }
            let (next_guard, result) = self.not_empty.wait_timeout(guard, timeout).unwrap();
            guard = next_guard;
            if result.timed_out() {
                return None;
            }
        }
    }

    /// Wakes every waiter and marks the queue closed; subsequent
    /// `pop` calls return `None` once drained, and `push` becomes a
    /// no-op.
    pub fn close(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.closed = true;
        drop(guard);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }
}
