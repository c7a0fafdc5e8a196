//! Worker pool with sequence classes (§3, §4.5, §4.8, §5), grounded directly
//! on `include/util/thread_pool.hpp`/`src/util/thread_pool.cpp`'s
//! `job`/`seq_class`/`seq_wrapper` trio, rebuilt around
//! `crossbeam_channel` the way `bb_common::util::pool::ThreadPool` dispatches
//! work rather than a raw condvar/queue pair.
//!
//! **Reference counting.** The original pairs every job with an optional
//! `ref_counter*` that is incremented on enqueue and decremented on
//! completion, keeping a player alive while background work still
//! references it. A job closure here that needs to do the same simply
//! captures an `Arc<Player>` by move: the clone taken to build the closure
//! *is* the increment, and the closure's own drop after running *is* the
//! decrement. No separate counter is needed (see `DESIGN.md`).

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc, thread};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads draining one shared job queue.
pub struct Pool {
  tx: Sender<Job>,
}

impl Pool {
  /// Spawns `workers` threads, each looping on the shared job channel until
  /// the pool (and thus every clone of `tx`) is dropped.
  pub fn new(workers: usize) -> Self {
    assert!(workers > 0, "cannot create a pool with no workers");
    let (tx, rx) = crossbeam_channel::unbounded::<Job>();
    for i in 0..workers {
      let rx = rx.clone();
      thread::Builder::new()
        .name(format!("worker-{i}"))
        .spawn(move || {
          while let Ok(job) = rx.recv() {
            job();
          }
        })
        .expect("failed to spawn worker thread");
    }
    Pool { tx }
  }

  /// Queues `job` for any free worker thread. Always succeeds as long as the
  /// pool's workers are still alive.
  pub fn enqueue<F: FnOnce() + Send + 'static>(&self, job: F) {
    let _ = self.tx.send(Box::new(job));
  }

  /// Creates a new sequence class bound to this pool.
  pub fn create_seq(&self) -> SeqClass { SeqClass::new(self.tx.clone()) }
}

struct SeqState {
  free: bool,
  accepting: bool,
  jobs: VecDeque<Job>,
}

/// A handle guaranteeing at-most-one in-flight job at a time across every
/// `enqueue` call made through it (§3, §8). Cloning shares the same
/// underlying queue; dropping the last clone simply drops any still-queued
/// jobs (their captured resources are freed by ordinary `Drop`, which stands
/// in for the original's explicit per-job finalizer callback).
#[derive(Clone)]
pub struct SeqClass {
  tx:    Sender<Job>,
  state: Arc<Mutex<SeqState>>,
}

impl SeqClass {
  fn new(tx: Sender<Job>) -> Self {
    SeqClass { tx, state: Arc::new(Mutex::new(SeqState { free: true, accepting: true, jobs: VecDeque::new() })) }
  }

  /// Queues `job` to run in this sequence. Returns `false` if the class has
  /// been disabled. If no job from this class is currently in flight, `job`
  /// is submitted to the pool immediately; otherwise it waits behind the
  /// ones already queued.
  pub fn enqueue<F: FnOnce() + Send + 'static>(&self, job: F) -> bool {
    let mut state = self.state.lock();
    if !state.accepting {
      return false;
    }
    if state.free {
      state.free = false;
      drop(state);
      self.submit(Box::new(job));
    } else {
      state.jobs.push_back(Box::new(job));
    }
    true
  }

  fn submit(&self, job: Job) {
    let tx = self.tx.clone();
    let state = self.state.clone();
    let _ = self.tx.send(Box::new(move || Self::run_and_advance(tx, state, job)));
  }

  /// Runs one job, then either hands the next queued job straight back to
  /// the pool or marks the class free, all under the sequence lock — the
  /// same atomic dequeue-or-free step `seq_wrapper` performs in the original
  /// (§3's sequence-class invariant).
  fn run_and_advance(tx: Sender<Job>, state: Arc<Mutex<SeqState>>, job: Job) {
    job();
    let mut guard = state.lock();
    match guard.jobs.pop_front() {
      Some(next) => {
        drop(guard);
        let tx2 = tx.clone();
        let state2 = state.clone();
        let _ = tx.send(Box::new(move || Self::run_and_advance(tx2, state2, next)));
      }
      None => guard.free = true,
    }
  }

  /// Stops accepting new jobs and drops everything still queued, without
  /// waiting for a job already in flight to finish (§4.5's disconnect
  /// teardown step 2).
  pub fn disable(&self) {
    let mut state = self.state.lock();
    state.accepting = false;
    state.free = true;
    state.jobs.clear();
  }

  pub fn is_accepting(&self) -> bool { self.state.lock().accepting }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Barrier,
  };

  #[test]
  fn enqueue_runs_job() {
    let pool = Pool::new(2);
    let (tx, rx) = crossbeam_channel::bounded(1);
    pool.enqueue(move || tx.send(()).unwrap());
    rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
  }

  #[test]
  fn sequence_class_runs_jobs_in_order() {
    let pool = Pool::new(4);
    let seq = pool.create_seq();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(4);
    for i in 0..4 {
      let order = order.clone();
      let done_tx = done_tx.clone();
      seq.enqueue(move || {
        // a tiny sleep widens the window in which a bug would let two jobs
        // from this sequence run concurrently.
        std::thread::sleep(std::time::Duration::from_millis(5));
        order.lock().push(i);
        done_tx.send(()).unwrap();
      });
    }
    for _ in 0..4 {
      done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
  }

  #[test]
  fn at_most_one_job_in_flight_per_sequence() {
    let pool = Pool::new(8);
    let seq = pool.create_seq();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let barrier_done = Arc::new(Barrier::new(1));
    let _ = barrier_done;
    let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(6);
    for _ in 0..6 {
      let in_flight = in_flight.clone();
      let max_seen = max_seen.clone();
      let done_tx = done_tx.clone();
      seq.enqueue(move || {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_seen.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(2));
        in_flight.fetch_sub(1, Ordering::SeqCst);
        done_tx.send(()).unwrap();
      });
    }
    for _ in 0..6 {
      done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
    }
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn disabled_sequence_rejects_new_jobs() {
    let pool = Pool::new(2);
    let seq = pool.create_seq();
    seq.disable();
    assert!(!seq.enqueue(|| {}));
  }
}
