//! The concurrency substrate (§3, §5): a worker pool with sequence classes
//! and a single-threaded periodic-task scheduler. Grounded on
//! `include/util/thread_pool.hpp`/`.cpp` and `include/util/scheduler.hpp`.

pub mod pool;
pub mod scheduler;

pub use pool::{Pool, SeqClass};
pub use scheduler::Scheduler;
