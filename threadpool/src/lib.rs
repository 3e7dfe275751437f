mod blocking_queue;
mod pool;

pub use blocking_queue::BlockingQueue;
pub use pool::ThreadPool;
