//! Vector-backed binary min-heap of per-fd expiry deadlines.
//!
//! A straight translation of `original_source/code/timer/heaptimer.{h,cpp}`
//! (`HeapTimer`) into safe Rust: a `Vec<TimerNode>` ordered by
//! `expires_at`, plus a `fd -> index` map kept consistent on every
//! swap so `heap[ref[fd]].fd == fd` holds after every mutation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub type TimeoutCallback = Box<dyn FnOnce() + Send>;

pub struct TimerNode {
    pub fd: usize,
    pub expires_at: Instant,
    pub on_expire: TimeoutCallback,
}

impl std::fmt::Debug for TimerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerNode")
            .field("fd", &self.fd)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Indexed min-heap of [`TimerNode`]s ordered by `expires_at`.
#[derive(Default)]
pub struct HeapTimer {
    heap: Vec<TimerNode>,
    index: HashMap<usize, usize>,
}

impl HeapTimer {
    pub fn new() -> Self {
        HeapTimer {
            heap: Vec::with_capacity(64),
            index: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.index.insert(self.heap[i].fd, i);
        self.index.insert(self.heap[j].fd, j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[parent].expires_at <= self.heap[i].expires_at {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    /// Returns true if the node ended up strictly lower in the heap
    /// than `index` (mirrors the C++ `siftdown_` bool return, used by
    /// `add`/`adjust` to decide whether a sift-up is also needed).
    fn sift_down(&mut self, index: usize, n: usize) -> bool {
        let mut i = index;
        loop {
            let mut j = i * 2 + 1;
            if j >= n {
                break;
            }
            if j + 1 < n && self.heap[j + 1].expires_at < self.heap[j].expires_at {
                j += 1;
            }
            if self.heap[i].expires_at <= self.heap[j].expires_at {
                break;
            }
            self.swap(i, j);
            i = j;
        }
        i > index
    }

    fn del(&mut self, index: usize) -> TimerNode {
        let last = self.heap.len() - 1;
        if index < last {
            self.swap(index, last);
            if !self.sift_down(index, last) {
                self.sift_up(index);
            }
        }
        let removed = self.heap.pop().expect("heap non-empty on del");
        self.index.remove(&removed.fd);
        removed
    }

    /// Inserts a new timer for `fd`, or resets an existing one's
    /// expiry, to `now + timeout`.
    pub fn add(&mut self, fd: usize, timeout: Duration, on_expire: TimeoutCallback) {
        let expires_at = Instant::now() + timeout;
        match self.index.get(&fd).copied() {
            None => {
                let i = self.heap.len();
                self.index.insert(fd, i);
                self.heap.push(TimerNode {
                    fd,
                    expires_at,
                    on_expire,
                });
                self.sift_up(i);
            }
            Some(i) => {
                self.heap[i].expires_at = expires_at;
                self.heap[i].on_expire = on_expire;
                let n = self.heap.len();
                if !self.sift_down(i, n) {
                    self.sift_up(i);
                }
            }
        }
    }

    /// Resets `fd`'s expiry to `now + timeout` without touching its
    /// callback. No-op if `fd` has no active timer.
    pub fn adjust(&mut self, fd: usize, timeout: Duration) {
        let Some(&i) = self.index.get(&fd) else {
            return;
        };
        self.heap[i].expires_at = Instant::now() + timeout;
        let n = self.heap.len();
        self.sift_down(i, n);
    }

    /// Removes the heap root.
    pub fn pop(&mut self) {
        if !self.heap.is_empty() {
            self.del(0);
        }
    }

    /// Runs `fd`'s callback immediately and removes it, regardless of
    /// whether it has expired.
    pub fn do_work(&mut self, fd: usize) {
        let Some(&i) = self.index.get(&fd) else {
            return;
        };
        let node = self.del(i);
        (node.on_expire)();
    }

    /// Pops and fires every expired root in non-decreasing
    /// `expires_at` order.
    pub fn tick(&mut self) {
        let now = Instant::now();
        while let Some(node) = self.heap.first() {
            if node.expires_at > now {
                break;
            }
            let node = self.del(0);
            (node.on_expire)();
        }
    }

    /// Fires all expired callbacks, then returns milliseconds until
    /// the next expiry (0 if already due, `None` if the heap is
    /// empty).
    pub fn get_next_tick(&mut self) -> Option<u64> {
        self.tick();
        let node = self.heap.first()?;
        let now = Instant::now();
        if node.expires_at <= now {
            Some(0)
        } else {
            Some((node.expires_at - now).as_millis() as u64)
        }
    }
}
