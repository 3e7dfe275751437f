//! Idle-timeout glue (component K's timer usage), grounded on the
//! teacher's `src/timeouts.rs` `HashMap::retain` sweep but rebuilt
//! over `timer::HeapTimer`'s O(log n) heap rather than an O(n) scan
//! over every live connection.
//!
//! Per spec.md's Design Notes §9, timer callbacks close over the fd
//! and a shared pending-close list rather than a pointer into the
//! connection: `Server::run` drains the list after every
//! `get_next_tick` and closes each fd through its own connection
//! table, so a connection already torn down by an I/O error path
//! can't be double-closed through a dangling reference.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use timer::HeapTimer;

pub type PendingClose = Arc<Mutex<Vec<usize>>>;

/// Installs (or resets, if one already exists for `fd`) an
/// idle-expiry entry that appends `fd` to `pending_close` when it
/// fires.
pub fn arm(timer: &mut HeapTimer, fd: usize, timeout: Duration, pending_close: PendingClose) {
    timer.add(
        fd,
        timeout,
        Box::new(move || {
            pending_close.lock().unwrap().push(fd);
        }),
    );
}

/// Resets `fd`'s expiry to `now + timeout` after observed activity,
/// without touching its callback.
pub fn extend(timer: &mut HeapTimer, fd: usize, timeout: Duration) {
    timer.adjust(fd, timeout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_timer_appends_fd_to_pending_close() {
        let mut timer = HeapTimer::new();
        let pending: PendingClose = Arc::new(Mutex::new(Vec::new()));
        arm(&mut timer, 7, Duration::from_millis(0), pending.clone());
        std::thread::sleep(Duration::from_millis(5));
        timer.tick();
        assert_eq!(*pending.lock().unwrap(), vec![7]);
    }

    #[test]
    fn extend_postpones_expiry() {
        let mut timer = HeapTimer::new();
        let pending: PendingClose = Arc::new(Mutex::new(Vec::new()));
        arm(&mut timer, 1, Duration::from_millis(10), pending.clone());
        extend(&mut timer, 1, Duration::from_secs(60));
        assert!(timer.get_next_tick().unwrap() > 1000);
        assert!(pending.lock().unwrap().is_empty());
    }
}
