//! Queue-driven sky-light propagation (§3, §4.9), grounded on
//! `include/world/lighting.hpp`'s `lighting_manager`: one dedicated worker
//! thread draining a FIFO of `(world, x, y, z)` items in batches, rather
//! than the original's configurable worker count (§5 pins this crate to a
//! single lighting thread).

use super::World;
use crossbeam_channel::{Receiver, Sender};
use std::{
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  thread,
  time::Duration,
};

const BATCH_SIZE: usize = 1000;
const CYCLE_SLEEP: Duration = Duration::from_millis(2);

/// Neighbour enqueue order mandated by §5: +x, −x, +z, −z, −y, +y.
const NEIGHBOURS: [(i32, i32, i32); 6] = [(1, 0, 0), (-1, 0, 0), (0, 0, 1), (0, 0, -1), (0, -1, 0), (0, 1, 0)];

struct WorkItem {
  world: Arc<World>,
  x: i32,
  y: i32,
  z: i32,
}

/// A cloneable handle for submitting sky-light recompute requests. Held by
/// every [`World`] so block mutators and fresh-chunk initial passes can
/// enqueue without reaching back into the engine that drains them.
#[derive(Clone)]
pub struct LightQueue {
  tx: Sender<WorkItem>,
}

impl LightQueue {
  pub fn enqueue(&self, world: Arc<World>, x: i32, y: i32, z: i32) { let _ = self.tx.send(WorkItem { world, x, y, z }); }

  /// A queue with no worker draining it, for tests that only care whether
  /// block mutators enqueue the right coordinates, not whether they get
  /// processed.
  #[cfg(test)]
  pub fn for_tests(tx: Sender<WorkItem>) -> Self { LightQueue { tx } }
}

pub struct LightingEngine {
  queue:   LightQueue,
  running: Arc<AtomicBool>,
  handle:  parking_lot::Mutex<Option<thread::JoinHandle<()>>>,
}

impl LightingEngine {
  pub fn start() -> Self {
    let (tx, rx) = crossbeam_channel::unbounded();
    let queue = LightQueue { tx };
    let running = Arc::new(AtomicBool::new(true));
    let running2 = running.clone();
    let worker_rx: Receiver<WorkItem> = rx;
    let worker_tx = queue.tx.clone();
    let handle = thread::Builder::new()
      .name("lighting".into())
      .spawn(move || {
        while running2.load(Ordering::SeqCst) {
          let mut processed = 0;
          while processed < BATCH_SIZE {
            match worker_rx.try_recv() {
              Ok(item) => {
                process(item, &worker_tx);
                processed += 1;
              }
              Err(_) => break,
            }
          }
          thread::sleep(CYCLE_SLEEP);
        }
      })
      .expect("failed to spawn lighting thread");
    LightingEngine { queue, running, handle: parking_lot::Mutex::new(Some(handle)) }
  }

  pub fn queue(&self) -> LightQueue { self.queue.clone() }

  pub fn stop(&self) {
    self.running.store(false, Ordering::SeqCst);
    if let Some(handle) = self.handle.lock().take() {
      let _ = handle.join();
    }
  }
}

impl Drop for LightingEngine {
  fn drop(&mut self) { self.stop(); }
}

/// Per-item recompute (§4.9): target is 15 above the heightmap, otherwise
/// one less than the brightest neighbour (0 if none is lit), clamped at 0.
/// Off-chunk neighbours resolve through the world's own chunk map (finite
/// worlds via the edge chunk); an unloaded neighbour reads as dark.
fn process(item: WorkItem, tx: &Sender<WorkItem>) {
  let WorkItem { world, x, y, z } = item;
  if !(0..256).contains(&y) {
    return;
  }
  let cx = x.div_euclid(16);
  let cz = z.div_euclid(16);
  let lx = x.rem_euclid(16) as usize;
  let lz = z.rem_euclid(16) as usize;

  let (changed, new_value) = {
    let mut chunks = world.chunks_mut();
    let Some(chunk) = world.resolve_chunk_mut(&mut chunks, cx, cz) else { return };
    let target: u8 = if y >= chunk.height(lx, lz) {
      15
    } else {
      let mut best = 0u8;
      for (dx, dy, dz) in NEIGHBOURS {
        let (nx, ny, nz) = (x + dx, y + dy, z + dz);
        if !(0..256).contains(&ny) {
          continue;
        }
        let l = world.sky_light_at_locked(&chunks, nx, ny, nz);
        best = best.max(l);
      }
      best.saturating_sub(1)
    };
    let current = chunk.get_sky_light(lx, y as usize, lz);
    if target == current {
      (false, target)
    } else {
      chunk.set_sky_light(lx, y as usize, lz, target);
      (true, target)
    }
  };
  let _ = new_value;
  if changed {
    for (dx, dy, dz) in NEIGHBOURS {
      let (nx, ny, nz) = (x + dx, y + dy, z + dz);
      if (0..256).contains(&ny) {
        let _ = tx.send(WorkItem { world: world.clone(), x: nx, y: ny, z: nz });
      }
    }
  }
}

/// Computes the per-column initial pass for a freshly created chunk (§4.9):
/// above the heightmap sky light is 15, between height and the floor it
/// decays by each block's opacity, and at or below the floor it is 0. Run
/// without neighbour interaction, unlike [`process`].
pub fn light_chunk_initial(chunk: &mut super::chunk::Chunk) {
  for x in 0..16 {
    for z in 0..16 {
      let height = chunk.height(x, z);
      let mut level: i32 = 15;
      for y in (0..256).rev() {
        if y as i32 >= height {
          chunk.set_sky_light(x, y, z, 15);
          continue;
        }
        let id = chunk.get_id(x, y, z);
        level = (level - super::block_info::opacity(id) as i32).max(0);
        chunk.set_sky_light(x, y, z, level as u8);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::world::chunk::Chunk;
  use pretty_assertions::assert_eq;

  #[test]
  fn initial_pass_is_bright_above_heightmap() {
    let mut chunk = Chunk::new(0, 0);
    chunk.set_id(0, 10, 0, 1); // stone, height becomes 11
    light_chunk_initial(&mut chunk);
    assert_eq!(chunk.get_sky_light(0, 20, 0), 15);
  }

  #[test]
  fn initial_pass_decays_at_and_below_the_top_block() {
    let mut chunk = Chunk::new(0, 0);
    chunk.set_id(0, 10, 0, 1); // opaque stone, height 11
    light_chunk_initial(&mut chunk);
    assert_eq!(chunk.get_sky_light(0, 10, 0), 0);
  }
}
