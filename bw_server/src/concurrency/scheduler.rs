//! Single-threaded periodic/timed task runner (§3, §4.11, §5), grounded on
//! `include/util/scheduler.hpp`'s `task`/`scheduler` pair. The original's
//! `task&` handles returned from `create()` and mutated in place become
//! plain owned `Task` values living in the scheduler's own deque, since
//! nothing outside the scheduler thread needs to reach back into a task
//! after scheduling it here.

use parking_lot::Mutex;
use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  thread,
  time::{Duration, Instant},
};

type TaskFn = Box<dyn FnMut() + Send + 'static>;

struct Task {
  fn_:      TaskFn,
  next_due: Instant,
  interval: Duration,
  once:     bool,
  active:   bool,
}

/// Runs tasks on a single dedicated thread, polling every 20 ms (§4.5's tick
/// granularity doubles as the scheduler's own resolution).
pub struct Scheduler {
  tasks:   Arc<Mutex<VecDeque<Task>>>,
  running: Arc<AtomicBool>,
  handle:  Mutex<Option<thread::JoinHandle<()>>>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

impl Scheduler {
  pub fn new() -> Self {
    Scheduler { tasks: Arc::new(Mutex::new(VecDeque::new())), running: Arc::new(AtomicBool::new(false)), handle: Mutex::new(None) }
  }

  /// Registers a one-shot task, due after `delay_ms`.
  pub fn run_once<F: FnMut() + Send + 'static>(&self, delay_ms: u64, f: F) {
    self.tasks.lock().push_back(Task {
      fn_:      Box::new(f),
      next_due: Instant::now() + Duration::from_millis(delay_ms),
      interval: Duration::ZERO,
      once:     true,
      active:   true,
    });
  }

  /// Registers a periodic task, first due after `delay_ms` and then every
  /// `interval_ms` thereafter. Re-queued at the tail after each firing (§3).
  pub fn run_periodic<F: FnMut() + Send + 'static>(&self, interval_ms: u64, delay_ms: u64, f: F) {
    self.tasks.lock().push_back(Task {
      fn_:      Box::new(f),
      next_due: Instant::now() + Duration::from_millis(delay_ms),
      interval: Duration::from_millis(interval_ms),
      once:     false,
      active:   true,
    });
  }

  /// Starts the scheduler thread. Idempotent: calling `start` twice without
  /// an intervening `stop` has no effect on the already-running thread.
  pub fn start(&self) {
    if self.running.swap(true, Ordering::SeqCst) {
      return;
    }
    let tasks = self.tasks.clone();
    let running = self.running.clone();
    let handle = thread::Builder::new()
      .name("scheduler".into())
      .spawn(move || {
        while running.load(Ordering::SeqCst) {
          let now = Instant::now();
          let due: Vec<Task> = {
            let mut guard = tasks.lock();
            let mut due = Vec::new();
            let remaining = guard.len();
            for _ in 0..remaining {
              if let Some(task) = guard.pop_front() {
                if task.active && task.next_due <= now {
                  due.push(task);
                } else {
                  guard.push_back(task);
                }
              }
            }
            due
          };
          for mut task in due {
            (task.fn_)();
            if !task.once && task.active {
              task.next_due = Instant::now() + task.interval;
              tasks.lock().push_back(task);
            }
          }
          thread::sleep(POLL_INTERVAL);
        }
      })
      .expect("failed to spawn scheduler thread");
    *self.handle.lock() = Some(handle);
  }

  /// Stops the scheduler thread, waiting for it to observe the stop flag on
  /// its next poll.
  pub fn stop(&self) {
    if !self.running.swap(false, Ordering::SeqCst) {
      return;
    }
    if let Some(handle) = self.handle.lock().take() {
      let _ = handle.join();
    }
  }
}

impl Default for Scheduler {
  fn default() -> Self { Scheduler::new() }
}

impl Drop for Scheduler {
  fn drop(&mut self) { self.stop(); }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::mpsc;

  #[test]
  fn one_shot_fires_once() {
    let sch = Scheduler::new();
    let (tx, rx) = mpsc::channel();
    sch.run_once(0, move || tx.send(()).unwrap());
    sch.start();
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    sch.stop();
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
  }

  #[test]
  fn periodic_fires_more_than_once() {
    let sch = Scheduler::new();
    let (tx, rx) = mpsc::channel();
    sch.run_periodic(10, 0, move || {
      let _ = tx.send(());
    });
    sch.start();
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    sch.stop();
  }
}
