//! World generator capability interface plus a name-keyed registry (§9
//! Design Notes: "polymorphic component swapping... maps to a small set of
//! capability interfaces... plus a registry keyed by a name string").
//! Grounded on `include/world/world_generator.hpp`'s virtual base and
//! `src/world/world_generator.cpp`'s static name→constructor map, and on
//! `include/world/generators/flatgrass.hpp`/`.cpp` for the one concrete
//! generator this crate ships (§1's "flat terrain generator's content" is
//! out of scope beyond this minimal placement).

use super::chunk::Chunk;
use crate::entity::Position;
use std::collections::HashMap;

/// Responsible for generating a chunk's content when it exists neither in
/// memory nor on disk (§4.10).
pub trait WorldGenerator: Send + Sync {
  fn name(&self) -> &'static str;

  /// Fills `chunk` (already positioned at `cx, cz`, though most generators
  /// ignore the coordinates — flat terrain does).
  fn generate(&self, chunk: &mut Chunk, cx: i32, cz: i32);

  /// Generates the content for a finite world's shared out-of-bounds "edge"
  /// chunk (§4.10). The default matches the original's base-class
  /// behaviour: bedrock through y=63, still water at y=64.
  fn generate_edge(&self, chunk: &mut Chunk) {
    for y in 0..64 {
      for x in 0..16 {
        for z in 0..16 {
          chunk.set_id(x, y, z, 7); // bedrock
        }
      }
    }
    for x in 0..16 {
      for z in 0..16 {
        chunk.set_id(x, 64, z, 9); // still water
      }
    }
  }

  fn find_spawn(&self) -> Position;
}

/// Flat stone/dirt/grass terrain, grounded on `flatgrass_world_generator`.
pub struct FlatGenerator;

impl WorldGenerator for FlatGenerator {
  fn name(&self) -> &'static str { "flatgrass" }

  fn generate(&self, chunk: &mut Chunk, _cx: i32, _cz: i32) {
    for y in 0..58 {
      for x in 0..16 {
        for z in 0..16 {
          chunk.set_id(x, y, z, 1); // stone
        }
      }
    }
    for y in 58..64 {
      for x in 0..16 {
        for z in 0..16 {
          chunk.set_id(x, y, z, 3); // dirt
        }
      }
    }
    for x in 0..16 {
      for z in 0..16 {
        chunk.set_id(x, 64, z, 2); // grass
      }
    }
  }

  fn find_spawn(&self) -> Position { Position::new(0.0, 66.0, 0.0) }
}

/// Name-keyed registry of generator constructors (§9). Generators are added
/// by registering a constructor closure, never by growing an inheritance
/// chain.
pub struct GeneratorRegistry {
  constructors: HashMap<&'static str, fn() -> Box<dyn WorldGenerator>>,
}

impl GeneratorRegistry {
  pub fn new() -> Self {
    let mut constructors: HashMap<&'static str, fn() -> Box<dyn WorldGenerator>> = HashMap::new();
    constructors.insert("flatgrass", || Box::new(FlatGenerator));
    GeneratorRegistry { constructors }
  }

  pub fn create(&self, name: &str) -> Option<Box<dyn WorldGenerator>> { self.constructors.get(name).map(|f| f()) }
}

impl Default for GeneratorRegistry {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn flat_generator_produces_expected_column() {
    let gen = FlatGenerator;
    let mut chunk = Chunk::new(0, 0);
    gen.generate(&mut chunk, 0, 0);
    assert_eq!(chunk.get_id(0, 0, 0), 1);
    assert_eq!(chunk.get_id(0, 60, 0), 3);
    assert_eq!(chunk.get_id(0, 64, 0), 2);
    assert_eq!(chunk.height(0, 0), 65);
  }

  #[test]
  fn edge_chunk_is_bedrock_then_water() {
    let gen = FlatGenerator;
    let mut chunk = Chunk::new(0, 0);
    gen.generate_edge(&mut chunk);
    assert_eq!(chunk.get_id(0, 0, 0), 7);
    assert_eq!(chunk.get_id(0, 63, 0), 7);
    assert_eq!(chunk.get_id(0, 64, 0), 9);
  }

  #[test]
  fn registry_looks_up_by_name() {
    let reg = GeneratorRegistry::new();
    assert!(reg.create("flatgrass").is_some());
    assert!(reg.create("nonexistent").is_none());
  }
}
