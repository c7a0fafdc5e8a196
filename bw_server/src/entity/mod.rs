//! Dynamic world objects (§3): an integer id, position, velocity, volume,
//! health, and a back-reference to the chunk currently holding it. Grounded
//! on `include/entity/entity.hpp`'s `entity` base class; the virtual
//! `spawn_to`/`despawn_from`/`build_metadata` dispatch collapses here into
//! plain methods since this crate only ever spawns one concrete kind (the
//! player's own spawn-representation, §4.11).

pub mod metadata;

use metadata::{EntityMetadata, MetadataValue};
use std::sync::atomic::{AtomicI32, Ordering};

/// Allocates server-unique, monotonically increasing entity ids (§3).
static NEXT_EID: AtomicI32 = AtomicI32::new(1);

pub fn next_eid() -> i32 { NEXT_EID.fetch_add(1, Ordering::Relaxed) }

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
  pub x: f64,
  pub y: f64,
  pub z: f64,
  pub yaw: f32,
  pub pitch: f32,
}

impl Position {
  pub fn new(x: f64, y: f64, z: f64) -> Self { Position { x, y, z, yaw: 0.0, pitch: 0.0 } }

  pub fn chunk_x(&self) -> i32 { (self.x / 16.0).floor() as i32 }
  pub fn chunk_z(&self) -> i32 { (self.z / 16.0).floor() as i32 }
}

/// An axis-aligned bounding box, in blocks, centered on the entity's feet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volume {
  pub width: f64,
  pub height: f64,
}

impl Volume {
  pub const PLAYER: Volume = Volume { width: 0.6, height: 1.8 };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

impl Velocity {
  pub const ZERO: Velocity = Velocity { x: 0.0, y: 0.0, z: 0.0 };
}

/// A dynamic moving object (§3). Only ever constructed through
/// [`crate::player::Player::spawn_entity`] in this crate's current scope —
/// non-player entities (mobs, dropped items) are out of scope (§1).
#[derive(Debug, Clone)]
pub struct Entity {
  eid: i32,
  pos: Position,
  vel: Velocity,
  vol: Volume,
  health: i32,
  world_name: String,
  chunk: Option<(i32, i32)>,
  metadata: EntityMetadata,
}

impl Entity {
  pub fn new(world_name: impl Into<String>, pos: Position, vol: Volume) -> Self {
    Entity {
      eid: next_eid(),
      pos,
      vel: Velocity::ZERO,
      vol,
      health: 20, // 10 full hearts, half-heart units (§3)
      world_name: world_name.into(),
      chunk: None,
      metadata: EntityMetadata::new(),
    }
  }

  pub fn eid(&self) -> i32 { self.eid }
  pub fn pos(&self) -> Position { self.pos }
  pub fn velocity(&self) -> Velocity { self.vel }
  pub fn volume(&self) -> Volume { self.vol }
  pub fn health(&self) -> i32 { self.health }
  pub fn world_name(&self) -> &str { &self.world_name }
  pub fn current_chunk(&self) -> Option<(i32, i32)> { self.chunk }

  /// Moves the entity and keeps its current-chunk back-reference in sync.
  pub fn move_to(&mut self, pos: Position) {
    self.pos = pos;
    self.chunk = Some((pos.chunk_x(), pos.chunk_z()));
  }

  /// Spawns the entity into a world at `pos`. The caller must have already
  /// confirmed the containing chunk is loaded (§9 open question: spawning
  /// into an unloaded chunk is a caller error, not silently ignored).
  pub fn spawn(&mut self, world_name: impl Into<String>, pos: Position) {
    self.world_name = world_name.into();
    self.move_to(pos);
  }

  pub fn despawn(&mut self) { self.chunk = None; }

  /// Populates a metadata dictionary with this entity's default fields
  /// (health as a byte, per vanilla's `Entity` metadata index 0 analogue).
  pub fn build_metadata(&self, meta: &mut EntityMetadata) {
    meta.set(0, MetadataValue::Byte(self.health.clamp(0, i8::MAX as i32) as i8));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn eids_are_monotonically_increasing() {
    let a = next_eid();
    let b = next_eid();
    assert!(b > a);
  }

  #[test]
  fn move_to_updates_current_chunk() {
    let mut e = Entity::new("world", Position::new(0.0, 64.0, 0.0), Volume::PLAYER);
    e.move_to(Position::new(20.0, 64.0, 0.0));
    assert_eq!(e.current_chunk(), Some((1, 0)));
  }

  #[test]
  fn build_metadata_sets_health_byte() {
    let e = Entity::new("world", Position::new(0.0, 64.0, 0.0), Volume::PLAYER);
    let mut meta = EntityMetadata::new();
    e.build_metadata(&mut meta);
    assert_eq!(meta.get(0), Some(&MetadataValue::Byte(20)));
  }
}
