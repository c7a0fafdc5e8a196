//! Asynchronous chunk generation (§3, §4.8), grounded on
//! `include/world/async_generator.hpp`'s `token`/`async_generator` pair. The
//! original's `ref_counter&` parameter on `generate` is dropped here: the
//! caller's `callback` closure is itself an owned `FnOnce`, so whatever it
//! captures (typically an `Arc<Player>`) is kept alive for exactly as long as
//! the enqueued job needs it, the same way [`crate::concurrency::pool`]
//! replaces the original's manual reference counting.

use super::World;
use crate::concurrency::{Pool, SeqClass};
use parking_lot::Mutex;
use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
  },
};

/// A handle a caller holds to cancel its own in-flight generation requests
/// without affecting anyone else's (§4.8). Dropping the handle does not
/// cancel anything by itself — call [`AsyncGenerator::release_token`].
#[derive(Clone, Copy)]
pub struct Token {
  id: u64,
}

/// Drives chunk generation on the world's own sequence class, so at most one
/// chunk is ever being generated for a given world at a time, matching the
/// original's `async_generator` binding one `seq_class` per world.
pub struct AsyncGenerator {
  seq:     SeqClass,
  tokens:  Mutex<HashMap<u64, Arc<AtomicBool>>>,
  next_id: AtomicU64,
}

impl AsyncGenerator {
  pub fn new(pool: &Pool) -> Self { AsyncGenerator { seq: pool.create_seq(), tokens: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) } }

  /// Mints a token that stays enabled until [`release_token`](Self::release_token)
  /// is called (§4.8's "token invalidated on release; in-flight jobs check it
  /// before running").
  pub fn acquire_token(&self) -> Token {
    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    self.tokens.lock().insert(id, Arc::new(AtomicBool::new(true)));
    Token { id }
  }

  /// Disables `token`. Any job already queued under it becomes a no-op when
  /// it is eventually dequeued.
  pub fn release_token(&self, token: &Token) {
    if let Some(flag) = self.tokens.lock().remove(&token.id) {
      flag.store(false, Ordering::SeqCst);
    }
  }

  /// Requests chunk `(cx, cz)`. If it is already loaded, `callback` runs
  /// immediately on the calling thread; otherwise generation is submitted to
  /// the world's sequence class and `callback` runs after it completes,
  /// unless `token` was released first.
  pub fn generate<F>(&self, world: Arc<World>, token: &Token, cx: i32, cz: i32, callback: F)
  where F: FnOnce() + Send + 'static {
    if world.has_chunk_loaded(cx, cz) {
      callback();
      return;
    }
    let Some(enabled) = self.tokens.lock().get(&token.id).cloned() else { return };
    self.seq.enqueue(move || {
      if !enabled.load(Ordering::SeqCst) {
        return;
      }
      world.load_chunk(cx, cz);
      callback();
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::world::generator::FlatGenerator;
  use std::time::Duration;

  fn test_world() -> Arc<World> {
    let pool = Pool::new(2);
    Arc::new(World::new_for_tests("test".into(), Box::new(FlatGenerator), &pool))
  }

  #[test]
  fn generating_an_already_loaded_chunk_calls_back_synchronously() {
    let world = test_world();
    world.load_chunk(0, 0);
    let pool = Pool::new(2);
    let gen = AsyncGenerator::new(&pool);
    let token = gen.acquire_token();
    let (tx, rx) = crossbeam_channel::bounded(1);
    gen.generate(world, &token, 0, 0, move || tx.send(()).unwrap());
    rx.recv_timeout(Duration::from_millis(50)).unwrap();
  }

  #[test]
  fn generating_a_missing_chunk_submits_a_job() {
    let world = test_world();
    let pool = Pool::new(2);
    let gen = AsyncGenerator::new(&pool);
    let token = gen.acquire_token();
    let (tx, rx) = crossbeam_channel::bounded(1);
    gen.generate(world.clone(), &token, 3, 4, move || tx.send(()).unwrap());
    rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(world.has_chunk_loaded(3, 4));
  }

  #[test]
  fn releasing_a_token_drops_its_callback() {
    let world = test_world();
    let pool = Pool::new(2);
    let gen = AsyncGenerator::new(&pool);
    let token = gen.acquire_token();
    gen.release_token(&token);
    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    gen.generate(world, &token, 5, 5, move || tx.send(()).unwrap());
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
  }
}
