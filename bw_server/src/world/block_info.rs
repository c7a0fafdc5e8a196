//! Static block property table (supplements §3/§4.7/§4.9, which only need
//! "is this id solid+opaque" and "how much light does it absorb"). Grounded
//! on `include/slot/blocks.hpp`'s `block_type`/`block_info` pair; trimmed to
//! the ids this crate's flat generator and edge chunk actually place, plus
//! enough of the common early-game vanilla ids to make `from_id` a
//! believable lookup rather than a two-entry stub.

#[derive(Debug, Clone, Copy)]
pub struct BlockInfo {
  pub id:               u16,
  pub name:             &'static str,
  pub blast_resistance: f32,
  /// Light absorbed per block of travel through it (0 = none, 15 = full).
  pub opacity:          u8,
  pub luminance:        u8,
  pub opaque:           bool,
  pub max_stack:        u8,
  pub solid:            bool,
}

macro_rules! block {
  ($id:expr, $name:expr, $blast:expr, $opacity:expr, $luminance:expr, $opaque:expr, $stack:expr, $solid:expr) => {
    BlockInfo {
      id:               $id,
      name:             $name,
      blast_resistance: $blast,
      opacity:          $opacity,
      luminance:        $luminance,
      opaque:           $opaque,
      max_stack:        $stack,
      solid:            $solid,
    }
  };
}

/// Indexed by id (§4.10's edge chunk and the flat generator only ever place
/// a handful of these, but the table covers the early-game solid/transparent
/// split so heightmap/lighting math behaves sensibly for any id a future
/// generator or provider-loaded chunk might contain).
pub static TABLE: &[BlockInfo] = &[
  block!(0, "air", 0.0, 0, 0, false, 0, false),
  block!(1, "stone", 30.0, 15, 0, true, 64, true),
  block!(2, "grass", 3.0, 15, 0, true, 64, true),
  block!(3, "dirt", 2.5, 15, 0, true, 64, true),
  block!(4, "cobblestone", 30.0, 15, 0, true, 64, true),
  block!(5, "planks", 15.0, 15, 0, true, 64, true),
  block!(7, "bedrock", 18_000_000.0, 15, 0, true, 64, true),
  block!(8, "flowing_water", 100.0, 3, 0, false, 0, true),
  block!(9, "water", 100.0, 3, 0, false, 0, true),
  block!(10, "flowing_lava", 0.0, 15, 15, true, 0, true),
  block!(11, "lava", 0.0, 15, 15, true, 0, true),
  block!(12, "sand", 2.5, 15, 0, true, 64, true),
  block!(13, "gravel", 3.0, 15, 0, true, 64, true),
  block!(17, "log", 10.0, 15, 0, true, 64, true),
  block!(18, "leaves", 1.0, 1, 0, false, 64, true),
  block!(20, "glass", 1.5, 0, 0, false, 64, true),
  block!(24, "sandstone", 4.0, 15, 0, true, 64, true),
];

const UNKNOWN: BlockInfo = block!(0xFFFF, "unknown", 0.0, 15, 0, true, 64, true);

/// Looks up a block's static properties by id, falling back to a solid,
/// fully-opaque default for any id this table doesn't know about — most
/// blocks are solid, and treating unknown ids otherwise would silently let
/// light leak through walls a future generator builds from ids not yet
/// listed here.
pub fn from_id(id: u16) -> &'static BlockInfo {
  TABLE.iter().find(|b| b.id == id).unwrap_or(&UNKNOWN)
}

/// The heightmap and lighting predicate from §3/§4.9: "solid and opaque".
pub fn is_solid_opaque(id: u16) -> bool {
  let info = from_id(id);
  info.solid && info.opaque
}

/// Light units absorbed passing through one block of this id (§4.9).
pub fn opacity(id: u16) -> u8 { from_id(id).opacity }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn air_is_neither_solid_nor_opaque() {
    assert!(!is_solid_opaque(0));
    assert_eq!(opacity(0), 0);
  }

  #[test]
  fn stone_is_solid_and_opaque() {
    assert!(is_solid_opaque(1));
  }

  #[test]
  fn water_is_solid_but_not_opaque() {
    assert!(!is_solid_opaque(9));
    assert!(from_id(9).solid);
  }

  #[test]
  fn unknown_id_falls_back_to_solid_opaque() {
    assert!(is_solid_opaque(9999));
  }
}
