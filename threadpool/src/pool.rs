//! Fixed worker set draining a shared task queue.
//!
//! Grounded on `original_source/code/pool/threadpool.h`'s `ThreadPool`:
//! a mutex/condvar-guarded `VecDeque` of boxed closures, workers that
//! take the front task under the lock, release it, run the task, then
//! re-acquire. Shutdown here is drain-then-exit (Design Notes §9
//! prefers it so enqueued log-flush tasks complete); an
//! immediate-exit-after-notify policy would also satisfy the spec.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    tasks: Mutex<VecDeque<Task>>,
    condvar: Condvar,
    closed: Mutex<bool>,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0);
        let shared = Arc::new(Shared {
            tasks: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            closed: Mutex::new(false),
        });

        let workers = (0..worker_count)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || worker_loop(shared))
            })
            .collect();

        ThreadPool { shared, workers }
    }

    /// Enqueues a task and wakes one worker.
    pub fn add_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.tasks.lock().unwrap().push_back(Box::new(task));
        self.shared.condvar.notify_one();
    }

    pub fn pending(&self) -> usize {
        self.shared.tasks.lock().unwrap().len()
    }

    /// Signals shutdown and joins every worker once its remaining
    /// tasks drain.
    pub fn shutdown(mut self) {
        self.close_and_join();
    }

    fn close_and_join(&mut self) {
        *self.shared.closed.lock().unwrap() = true;
        self.shared.condvar.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.close_and_join();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let mut guard = shared.tasks.lock().unwrap();
        loop {
            if let Some(task) = guard.pop_front() {
                drop(guard);
                task();
                break;
            }
            if *shared.closed.lock().unwrap() {
                return;
            }
            guard = shared.condvar.wait(guard).unwrap();
        }
    }
}
