//! Serializes a [`crate::world::chunk::Chunk`] into the `ChunkData` payload
//! §6 describes: per-section id+meta, block-light, sky-light, then biomes
//! for a full (`ground_up_continuous`) send. Kept apart from
//! [`crate::net::packet`] since the wire shape here depends on chunk
//! internals that module doesn't otherwise need to know about.

use crate::world::chunk::{Chunk, SUB_CHUNKS};

/// Returns the primary bit mask (one bit per non-empty section) and the
/// payload bytes for a full chunk send.
pub fn encode_full_chunk(chunk: &Chunk) -> (u16, Vec<u8>) {
  let mut mask: u16 = 0;
  for sy in 0..SUB_CHUNKS {
    if chunk.sub(sy).is_some() {
      mask |= 1 << sy;
    }
  }

  let mut out = Vec::new();
  for sy in 0..SUB_CHUNKS {
    if let Some(sub) = chunk.sub(sy) {
      sub.write_ids_le(&mut out);
    }
  }
  for sy in 0..SUB_CHUNKS {
    if let Some(sub) = chunk.sub(sy) {
      sub.write_block_light(&mut out);
    }
  }
  for sy in 0..SUB_CHUNKS {
    if let Some(sub) = chunk.sub(sy) {
      sub.write_sky_light(&mut out);
    }
  }
  out.extend_from_slice(chunk.biomes());
  (mask, out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::world::generator::{FlatGenerator, WorldGenerator};

  #[test]
  fn mask_has_a_bit_for_every_populated_section() {
    let mut chunk = Chunk::new(0, 0);
    FlatGenerator.generate(&mut chunk, 0, 0);
    let (mask, _) = encode_full_chunk(&chunk);
    assert_eq!(mask, 0b11111); // sections 0-4 hold blocks up through y=64
  }

  #[test]
  fn payload_ends_with_the_256_byte_biome_array() {
    let mut chunk = Chunk::new(0, 0);
    FlatGenerator.generate(&mut chunk, 0, 0);
    let (_, data) = encode_full_chunk(&chunk);
    assert_eq!(&data[data.len() - 256..], chunk.biomes());
  }
}
