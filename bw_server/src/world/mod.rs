//! A named block-world: its loaded chunks, generator, optional disk
//! persistence, async generation driver, sky-light queue, and player list
//! (§3, §4.7–§4.11), grounded on `include/world/world.hpp`'s `world` class.
//!
//! The chunk table lives behind one mutex for the whole map rather than a
//! lock per chunk (§5: "World chunk map: protected by a per-world mutex"),
//! which is also why chunk mutation and sky-light recomputation both take a
//! `MutexGuard` rather than grabbing their own locks — see
//! [`chunks_mut`](World::chunks_mut) and [`light::process`].

pub mod async_gen;
pub mod block_info;
pub mod chunk;
pub mod generator;
pub mod light;
pub mod region;

use crate::{
  concurrency::Pool,
  entity::Position,
  player::Player,
};
use chunk::Chunk;
use generator::WorldGenerator;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

/// Static, rarely-changing facts about a world (§6's `level.dat` payload).
pub struct WorldData {
  pub name:           String,
  pub seed:           i64,
  pub generator_name: String,
  pub spawn:          Position,
  /// `Some(radius)` for a finite world: valid chunk coordinates satisfy
  /// `|cx| <= radius && |cz| <= radius`; everything further out resolves to
  /// the shared immutable edge chunk (§4.10, Open Question resolved in
  /// `DESIGN.md`: width/depth are an inclusive chunk-coordinate radius).
  pub bounds:         Option<i32>,
}

/// Disk persistence capability (§6, §9 Design Notes), implemented by
/// [`region::AnvilProvider`]. A world with no provider never touches disk:
/// every chunk request beyond the in-memory map falls straight through to
/// the generator.
pub trait WorldProvider: Send + Sync {
  fn load_chunk(&self, cx: i32, cz: i32) -> Option<Chunk>;
  fn save_chunk(&self, chunk: &Chunk);
  fn load_data(&self) -> Option<WorldData>;
  fn save_data(&self, data: &WorldData);
}

pub struct World {
  data:      RwLock<WorldData>,
  chunks:    Mutex<HashMap<(i32, i32), Chunk>>,
  edge:      Chunk,
  generator: Box<dyn WorldGenerator>,
  provider:  Option<Box<dyn WorldProvider>>,
  light:     light::LightQueue,
  async_gen: async_gen::AsyncGenerator,
  players:   Mutex<HashMap<Uuid, Arc<Player>>>,
}

impl World {
  pub fn new(data: WorldData, generator: Box<dyn WorldGenerator>, provider: Option<Box<dyn WorldProvider>>, light: light::LightQueue, pool: &Pool) -> Self {
    let mut edge = Chunk::new(0, 0);
    generator.generate_edge(&mut edge);
    light::light_chunk_initial(&mut edge);
    World {
      data: RwLock::new(data),
      chunks: Mutex::new(HashMap::new()),
      edge,
      generator,
      provider,
      light,
      async_gen: async_gen::AsyncGenerator::new(pool),
      players: Mutex::new(HashMap::new()),
    }
  }

  #[cfg(test)]
  pub fn new_for_tests(name: String, generator: Box<dyn WorldGenerator>, pool: &Pool) -> Self {
    let (tx, _rx) = crossbeam_channel::unbounded();
    let light = light::LightQueue::for_tests(tx);
    let spawn = generator.find_spawn();
    World::new(WorldData { name, seed: 0, generator_name: generator.name().to_string(), spawn, bounds: None }, generator, None, light, pool)
  }

  pub fn name(&self) -> String { self.data.read().name.clone() }
  pub fn spawn(&self) -> Position { self.data.read().spawn }
  pub fn async_gen(&self) -> &async_gen::AsyncGenerator { &self.async_gen }
  pub fn light_queue(&self) -> &light::LightQueue { &self.light }

  fn chunk_radius(&self) -> Option<i32> { self.data.read().bounds }

  pub fn is_out_of_bounds(&self, cx: i32, cz: i32) -> bool {
    match self.chunk_radius() {
      Some(radius) => cx.abs() > radius || cz.abs() > radius,
      None => false,
    }
  }

  pub fn chunks_mut(&self) -> MutexGuard<'_, HashMap<(i32, i32), Chunk>> { self.chunks.lock() }

  pub fn has_chunk_loaded(&self, cx: i32, cz: i32) -> bool { self.chunks.lock().contains_key(&(cx, cz)) }

  /// Gives mutable access to a real, loaded chunk through an already-locked
  /// map (§4.9's lighting engine reads and writes this way so a single lock
  /// acquisition covers both the centre cell and its neighbours). The shared
  /// edge chunk is never returned here: it is immutable by construction.
  pub fn resolve_chunk_mut<'a>(&self, chunks: &'a mut HashMap<(i32, i32), Chunk>, cx: i32, cz: i32) -> Option<&'a mut Chunk> {
    chunks.get_mut(&(cx, cz))
  }

  /// Reads sky light at world block coordinates against an already-locked
  /// chunk map. An unloaded coordinate inside a finite world's bounds falls
  /// through to the generator's own initial pass is skipped: finite-world
  /// chunks are expected to be fully loaded up front, so this only matters
  /// for an infinite world's unloaded neighbour, which reads as dark rather
  /// than inventing brightness for content nobody has generated yet.
  pub fn sky_light_at_locked(&self, chunks: &HashMap<(i32, i32), Chunk>, x: i32, y: i32, z: i32) -> u8 {
    let cx = x.div_euclid(16);
    let cz = z.div_euclid(16);
    let lx = x.rem_euclid(16) as usize;
    let lz = z.rem_euclid(16) as usize;
    if let Some(chunk) = chunks.get(&(cx, cz)) {
      return chunk.get_sky_light(lx, y as usize, lz);
    }
    if self.is_out_of_bounds(cx, cz) {
      return self.edge.get_sky_light(lx, y as usize, lz);
    }
    0
  }

  /// Loads chunk `(cx, cz)` into memory if it isn't already: from the
  /// provider if one is configured and has it, else freshly generated
  /// (§4.10). Out-of-bounds coordinates in a finite world are never inserted
  /// into the chunk map; callers read them via the shared edge chunk
  /// instead, same as [`sky_light_at_locked`](Self::sky_light_at_locked).
  pub fn load_chunk(&self, cx: i32, cz: i32) {
    if self.is_out_of_bounds(cx, cz) || self.has_chunk_loaded(cx, cz) {
      return;
    }
    let chunk = self
      .provider
      .as_ref()
      .and_then(|p| p.load_chunk(cx, cz))
      .unwrap_or_else(|| {
        let mut chunk = Chunk::new(cx, cz);
        self.generator.generate(&mut chunk, cx, cz);
        light::light_chunk_initial(&mut chunk);
        chunk
      });
    self.chunks.lock().insert((cx, cz), chunk);
  }

  pub fn put_chunk(&self, chunk: Chunk) { self.chunks.lock().insert(chunk.pos(), chunk); }

  pub fn unload_chunk(&self, cx: i32, cz: i32) {
    if let Some(chunk) = self.chunks.lock().remove(&(cx, cz)) {
      if let Some(provider) = &self.provider {
        provider.save_chunk(&chunk);
      }
    }
  }

  pub fn get_id(&self, x: i32, y: i32, z: i32) -> u16 {
    if !(0..256).contains(&y) {
      return 0;
    }
    let (cx, cz) = (x.div_euclid(16), z.div_euclid(16));
    let (lx, lz) = (x.rem_euclid(16) as usize, z.rem_euclid(16) as usize);
    match self.chunks.lock().get(&(cx, cz)) {
      Some(chunk) => chunk.get_id(lx, y as usize, lz),
      None if self.is_out_of_bounds(cx, cz) => self.edge.get_id(lx, y as usize, lz),
      None => 0,
    }
  }

  /// Sets a block's id and queues a sky-light recompute at this column
  /// (§4.9's "any block write enqueues its own column"). No-op outside the
  /// world's vertical range or in a finite world's out-of-bounds area, which
  /// is immutable.
  pub fn set_id(self: &Arc<Self>, x: i32, y: i32, z: i32, id: u16) {
    if !(0..256).contains(&y) {
      return;
    }
    let (cx, cz) = (x.div_euclid(16), z.div_euclid(16));
    if self.is_out_of_bounds(cx, cz) {
      return;
    }
    let (lx, lz) = (x.rem_euclid(16) as usize, z.rem_euclid(16) as usize);
    self.load_chunk(cx, cz);
    {
      let mut chunks = self.chunks.lock();
      if let Some(chunk) = chunks.get_mut(&(cx, cz)) {
        chunk.set_id(lx, y as usize, lz, id);
      }
    }
    self.light.enqueue(self.clone(), x, y, z);
  }

  pub fn add_player(&self, player: Arc<Player>) { self.players.lock().insert(player.uuid(), player); }
  pub fn remove_player(&self, uuid: &Uuid) { self.players.lock().remove(uuid); }
  pub fn players(&self) -> Vec<Arc<Player>> { self.players.lock().values().cloned().collect() }

  /// Saves every loaded chunk and the world's own metadata to disk (§4.11's
  /// shutdown sequence), a no-op when no provider is configured.
  pub fn save_all(&self) {
    let Some(provider) = &self.provider else { return };
    provider.save_data(&self.data.read());
    for chunk in self.chunks.lock().values() {
      provider.save_chunk(chunk);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use generator::FlatGenerator;
  use pretty_assertions::assert_eq;

  #[test]
  fn loading_a_chunk_runs_the_generator() {
    let pool = Pool::new(1);
    let world = World::new_for_tests("t".into(), Box::new(FlatGenerator), &pool);
    world.load_chunk(0, 0);
    assert_eq!(world.get_id(0, 0, 0), 1);
    assert_eq!(world.get_id(0, 64, 0), 2);
  }

  #[test]
  fn unloaded_chunk_reads_as_air() {
    let pool = Pool::new(1);
    let world = World::new_for_tests("t".into(), Box::new(FlatGenerator), &pool);
    assert_eq!(world.get_id(100, 5, 100), 0);
  }

  #[test]
  fn out_of_bounds_in_finite_world_reads_edge_chunk() {
    let pool = Pool::new(1);
    let mut world = World::new_for_tests("t".into(), Box::new(FlatGenerator), &pool);
    world.data.get_mut().bounds = Some(2);
    assert_eq!(world.get_id(16 * 5, 0, 0), 7); // bedrock
    assert_eq!(world.get_id(16 * 5, 64, 0), 9); // still water
  }
}
