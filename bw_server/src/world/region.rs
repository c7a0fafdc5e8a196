//! Anvil-format disk persistence (§6, §9 Design Notes), grounded on
//! `src/world/providers/anvil/provider.cpp`'s `anvil_world_provider`: a
//! `level.dat` (gzip NBT) plus `region/r.<rx>.<rz>.mca` files, each an 8 KB
//! location/timestamp header followed by 4 KB-aligned zlib chunk records.
//!
//! **Simplification from the original.** `_overwrite_chunk` in the source
//! relocates any chunk whose sectors would be clobbered by a bigger
//! replacement to the end of the file before writing. This port always
//! appends a grown chunk to the end of the file and repoints the header
//! entry at it, leaving the old sectors as unreferenced slack instead of
//! reclaiming them — a real region-file defragmenter is out of scope here
//! (§1 excludes "the concrete disk format... beyond what §6 lists"; nothing
//! in §6 specifies compaction), and is noted in `DESIGN.md`.

use super::{chunk::Chunk, WorldData, WorldProvider};
use bw_common::nbt::{Nbt, Tag};
use flate2::{
  write::{GzEncoder, ZlibEncoder},
  Compression,
};
use std::{
  collections::HashMap,
  fs::{self, File, OpenOptions},
  io::{Read, Seek, SeekFrom, Write},
  path::PathBuf,
  sync::Mutex,
};

const SECTOR_SIZE: u64 = 4096;
const HEADER_SECTORS: u64 = 2;

pub struct AnvilProvider {
  root: PathBuf,
  // One file handle per region at a time would thrash; a single mutex
  // around all disk access keeps this provider simple and correct, the
  // same "coarse but correct" tradeoff `World`'s single chunk-map mutex
  // makes (§5).
  lock: Mutex<()>,
}

impl AnvilProvider {
  /// Ensures `root` and `root/region` exist, creating them if this is a
  /// brand new world (§4.10's "provider-recognition step" precedes this:
  /// the caller decides whether `level.dat` is present and falls back to
  /// generation if [`WorldProvider::load_data`] returns `None`).
  pub fn open(root: PathBuf) -> Option<Self> {
    if let Err(e) = fs::create_dir_all(root.join("region")) {
      error!("failed to prepare world directory {}: {e}", root.display());
      return None;
    }
    Some(AnvilProvider { root, lock: Mutex::new(()) })
  }

  fn region_path(&self, rx: i32, rz: i32) -> PathBuf { self.root.join("region").join(format!("r.{rx}.{rz}.mca")) }

  fn level_dat_path(&self) -> PathBuf { self.root.join("level.dat") }
}

fn region_coords(cx: i32, cz: i32) -> (i32, i32, u64) {
  let rx = cx >> 5;
  let rz = cz >> 5;
  let index = (((cz & 31) << 5) | (cx & 31)) as u64;
  (rx, rz, index)
}

fn sectors_for(byte_len: usize) -> u32 {
  let total = byte_len as u64 + 5; // 4-byte length + 1-byte compression tag
  (total.div_ceil(SECTOR_SIZE)) as u32
}

impl WorldProvider for AnvilProvider {
  fn load_chunk(&self, cx: i32, cz: i32) -> Option<Chunk> {
    let _guard = self.lock.lock().unwrap();
    let (rx, rz, index) = region_coords(cx, cz);
    let path = self.region_path(rx, rz);
    let mut file = File::open(&path).ok()?;

    let mut header = [0u8; 4];
    file.seek(SeekFrom::Start(index * 4)).ok()?;
    file.read_exact(&mut header).ok()?;
    let sector = u32::from_be_bytes([0, header[0], header[1], header[2]]);
    if sector == 0 {
      return None;
    }

    file.seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE)).ok()?;
    let mut len_buf = [0u8; 4];
    file.read_exact(&mut len_buf).ok()?;
    let record_len = u32::from_be_bytes(len_buf) as usize;
    if record_len == 0 {
      return None;
    }
    let mut body = vec![0u8; record_len];
    file.read_exact(&mut body).ok()?;
    // body[0] is the compression type tag (1 = gzip, 2 = zlib); the
    // remaining bytes carry a format signature that identifies which, so
    // `deserialize_compressed` does not need the tag itself.
    let nbt = Nbt::deserialize_compressed(body[1..].to_vec()).ok()?;
    chunk_from_nbt(&nbt.tag)
  }

  fn save_chunk(&self, chunk: &Chunk) {
    let _guard = self.lock.lock().unwrap();
    let (cx, cz) = chunk.pos();
    let (rx, rz, index) = region_coords(cx, cz);
    let path = self.region_path(rx, rz);

    if !path.exists() {
      if let Err(e) = create_empty_region(&path) {
        error!("failed to create region file {}: {e}", path.display());
        return;
      }
    }

    let compressed = compress_zlib(&chunk_to_nbt(chunk).serialize());
    let record_len = compressed.len() + 1; // + compression type byte
    let needed_sectors = sectors_for(compressed.len());

    let mut file = match OpenOptions::new().read(true).write(true).open(&path) {
      Ok(f) => f,
      Err(e) => {
        error!("failed to open region file {}: {e}", path.display());
        return;
      }
    };

    let mut loc_entry = [0u8; 4];
    let _ = file.seek(SeekFrom::Start(index * 4));
    let _ = file.read_exact(&mut loc_entry);
    let existing_sector = u32::from_be_bytes([0, loc_entry[0], loc_entry[1], loc_entry[2]]);
    let existing_sector_count = loc_entry[3] as u32;

    let target_sector = if existing_sector != 0 && needed_sectors <= existing_sector_count.max(1) {
      existing_sector as u64
    } else {
      let end = file.seek(SeekFrom::End(0)).unwrap_or(HEADER_SECTORS * SECTOR_SIZE);
      end.div_ceil(SECTOR_SIZE)
    };

    let _ = file.seek(SeekFrom::Start(target_sector * SECTOR_SIZE));
    let _ = file.write_all(&(record_len as u32).to_be_bytes());
    let _ = file.write_all(&[2u8]); // compression type: zlib
    let _ = file.write_all(&compressed);
    let padded_total = needed_sectors as u64 * SECTOR_SIZE;
    let written = 5 + compressed.len() as u64;
    if written < padded_total {
      let _ = file.write_all(&vec![0u8; (padded_total - written) as usize]);
    }

    let mut entry = [0u8; 4];
    entry[..3].copy_from_slice(&(target_sector as u32).to_be_bytes()[1..]);
    entry[3] = needed_sectors as u8;
    let _ = file.seek(SeekFrom::Start(index * 4));
    let _ = file.write_all(&entry);
  }

  fn load_data(&self) -> Option<WorldData> {
    let bytes = fs::read(self.level_dat_path()).ok()?;
    let nbt = Nbt::deserialize_compressed(bytes).ok()?;
    let data = nbt.tag.get("Data")?;
    let name = data.get("LevelName")?.as_str()?.to_string();
    let generator_name = data.get("generatorName")?.as_str()?.to_string();
    let seed = data.get("RandomSeed")?.as_long()?;
    let spawn = crate::entity::Position::new(
      data.get("SpawnX")?.as_int()? as f64,
      data.get("SpawnY")?.as_int()? as f64,
      data.get("SpawnZ")?.as_int()? as f64,
    );
    let bounds = data
      .get("hCraft")
      .and_then(|hc| hc.get("Width"))
      .and_then(Tag::as_int)
      .filter(|w| *w >= 0);
    Some(WorldData { name, seed, generator_name, spawn, bounds })
  }

  fn save_data(&self, wd: &WorldData) {
    let mut data_fields = vec![
      ("version".to_string(), Tag::Int(19133)),
      ("initialized".to_string(), Tag::Byte(1)),
      ("LevelName".to_string(), Tag::String(wd.name.clone())),
      ("generatorName".to_string(), Tag::String(wd.generator_name.clone())),
      ("generatorVersion".to_string(), Tag::Int(0)),
      ("RandomSeed".to_string(), Tag::Long(wd.seed)),
      ("MapFeatures".to_string(), Tag::Byte(0)),
      ("SpawnX".to_string(), Tag::Int(wd.spawn.x as i32)),
      ("SpawnY".to_string(), Tag::Int(wd.spawn.y as i32)),
      ("SpawnZ".to_string(), Tag::Int(wd.spawn.z as i32)),
    ];
    if let Some(radius) = wd.bounds {
      data_fields.push((
        "hCraft".to_string(),
        Tag::Compound(HashMap::from([("Width".to_string(), Tag::Int(radius)), ("Depth".to_string(), Tag::Int(radius))])),
      ));
    }
    let root = Nbt::new("", Tag::Compound(HashMap::from([("Data".to_string(), Tag::Compound(data_fields.into_iter().collect()))])));
    let compressed = compress_gzip(&root.serialize());
    if let Err(e) = fs::write(self.level_dat_path(), compressed) {
      error!("failed to write level.dat under {}: {e}", self.root.display());
    }
  }
}

fn create_empty_region(path: &PathBuf) -> std::io::Result<()> {
  let mut file = File::create(path)?;
  file.write_all(&vec![0u8; (HEADER_SECTORS * SECTOR_SIZE) as usize])
}

fn compress_zlib(data: &[u8]) -> Vec<u8> {
  let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
  enc.write_all(data).expect("in-memory zlib encode");
  enc.finish().expect("in-memory zlib encode")
}

fn compress_gzip(data: &[u8]) -> Vec<u8> {
  let mut enc = GzEncoder::new(Vec::new(), Compression::default());
  enc.write_all(data).expect("in-memory gzip encode");
  enc.finish().expect("in-memory gzip encode")
}

/// Builds the per-section NBT record §6 specifies: `Y`, `Blocks`, `Add`
/// (always emitted so a reader never has to special-case its absence),
/// `Data`, `BlockLight`, `SkyLight`.
fn chunk_to_nbt(chunk: &Chunk) -> Nbt {
  let mut sections = Vec::new();
  for sy in 0..super::chunk::SUB_CHUNKS {
    let Some(sub) = chunk.sub(sy) else { continue };
    let mut ids_le = Vec::new();
    sub.write_ids_le(&mut ids_le);

    let mut blocks = vec![0u8; 4096];
    let mut add = vec![0u8; 2048];
    let mut meta = vec![0u8; 2048];
    for cell in 0..4096 {
      let v = u16::from_le_bytes([ids_le[cell * 2], ids_le[cell * 2 + 1]]);
      let id = v >> 4;
      let m = (v & 0xF) as u8;
      blocks[cell] = (id & 0xFF) as u8;
      let add_nibble = ((id >> 8) & 0xF) as u8;
      if cell % 2 == 0 {
        add[cell / 2] = (add[cell / 2] & 0xF0) | add_nibble;
        meta[cell / 2] = (meta[cell / 2] & 0xF0) | m;
      } else {
        add[cell / 2] = (add[cell / 2] & 0x0F) | (add_nibble << 4);
        meta[cell / 2] = (meta[cell / 2] & 0x0F) | (m << 4);
      }
    }
    let mut block_light = Vec::new();
    sub.write_block_light(&mut block_light);
    let mut sky_light = Vec::new();
    sub.write_sky_light(&mut sky_light);

    sections.push(Tag::Compound(HashMap::from([
      ("Y".to_string(), Tag::Byte(sy as i8)),
      ("Blocks".to_string(), Tag::ByteArr(blocks)),
      ("Add".to_string(), Tag::ByteArr(add)),
      ("Data".to_string(), Tag::ByteArr(meta)),
      ("BlockLight".to_string(), Tag::ByteArr(block_light)),
      ("SkyLight".to_string(), Tag::ByteArr(sky_light)),
    ])));
  }

  let (cx, cz) = chunk.pos();
  let level = Tag::Compound(HashMap::from([
    ("xPos".to_string(), Tag::Int(cx)),
    ("zPos".to_string(), Tag::Int(cz)),
    ("Biomes".to_string(), Tag::ByteArr(chunk.biomes().to_vec())),
    ("HeightMap".to_string(), Tag::IntArray(chunk.heightmap().to_vec())),
    ("Sections".to_string(), Tag::List(sections)),
  ]));
  Nbt::new("", Tag::Compound(HashMap::from([("Level".to_string(), level)])))
}

/// Reverses [`chunk_to_nbt`]. The heightmap tag is read but not trusted:
/// [`Chunk::set_id_and_meta`] re-derives it from the restored id/meta data
/// on every write, so the invariant (§3) holds regardless of what a
/// (possibly stale) on-disk `HeightMap` claims.
fn chunk_from_nbt(root: &Tag) -> Option<Chunk> {
  let level = root.get("Level")?;
  let cx = level.get("xPos")?.as_int()?;
  let cz = level.get("zPos")?.as_int()?;
  let mut chunk = Chunk::new(cx, cz);

  if let Some(biomes) = level.get("Biomes").and_then(Tag::as_byte_arr) {
    for (i, b) in biomes.iter().enumerate().take(256) {
      chunk.set_biome(i & 0xF, i >> 4, *b);
    }
  }

  for section in level.get("Sections")?.as_list()? {
    let sy = match section.get("Y")? {
      Tag::Byte(b) => *b as i32,
      other => other.as_int().unwrap_or(0),
    };
    let blocks = section.get("Blocks")?.as_byte_arr()?;
    let add = section.get("Add").and_then(Tag::as_byte_arr);
    let data = section.get("Data")?.as_byte_arr()?;
    let block_light = section.get("BlockLight")?.as_byte_arr()?;
    let sky_light = section.get("SkyLight")?.as_byte_arr()?;

    for cell in 0..4096usize {
      let x = cell & 0xF;
      let z = (cell >> 4) & 0xF;
      let y = sy as usize * 16 + (cell >> 8);
      let add_nibble = add.map(|a| if cell % 2 == 0 { a[cell / 2] & 0xF } else { a[cell / 2] >> 4 }).unwrap_or(0);
      let id = ((add_nibble as u16) << 8) | blocks[cell] as u16;
      let meta = if cell % 2 == 0 { data[cell / 2] & 0xF } else { data[cell / 2] >> 4 };
      chunk.set_id_and_meta(x, y, z, id, meta);

      let bl = if cell % 2 == 0 { block_light[cell / 2] & 0xF } else { block_light[cell / 2] >> 4 };
      chunk.set_block_light(x, y, z, bl);
      let sl = if cell % 2 == 0 { sky_light[cell / 2] & 0xF } else { sky_light[cell / 2] >> 4 };
      chunk.set_sky_light(x, y, z, sl);
    }
  }

  Some(chunk)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::world::generator::{FlatGenerator, WorldGenerator};
  use pretty_assertions::assert_eq;

  fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bw_region_test_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
  }

  #[test]
  fn chunk_roundtrips_through_nbt() {
    let mut chunk = Chunk::new(2, -3);
    FlatGenerator.generate(&mut chunk, 2, -3);
    let nbt = chunk_to_nbt(&chunk);
    let restored = chunk_from_nbt(&nbt.tag).unwrap();
    assert_eq!(restored.pos(), (2, -3));
    for y in 0..66 {
      assert_eq!(restored.get_id(0, y, 0), chunk.get_id(0, y, 0), "id mismatch at y={y}");
      assert_eq!(restored.get_meta(0, y, 0), chunk.get_meta(0, y, 0));
    }
    assert_eq!(restored.biomes(), chunk.biomes());
  }

  #[test]
  fn save_then_load_chunk_through_a_region_file() {
    let dir = temp_dir("chunk");
    let provider = AnvilProvider::open(dir.clone()).unwrap();
    let mut chunk = Chunk::new(0, 0);
    FlatGenerator.generate(&mut chunk, 0, 0);
    provider.save_chunk(&chunk);

    let loaded = provider.load_chunk(0, 0).unwrap();
    assert_eq!(loaded.get_id(0, 0, 0), 1);
    assert_eq!(loaded.get_id(0, 64, 0), 2);
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn missing_chunk_returns_none() {
    let dir = temp_dir("missing");
    let provider = AnvilProvider::open(dir.clone()).unwrap();
    assert!(provider.load_chunk(5, 5).is_none());
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn world_data_roundtrips_through_level_dat() {
    let dir = temp_dir("leveldat");
    let provider = AnvilProvider::open(dir.clone()).unwrap();
    let wd = WorldData {
      name: "test world".into(),
      seed: 1234,
      generator_name: "flatgrass".into(),
      spawn: crate::entity::Position::new(1.0, 2.0, 3.0),
      bounds: Some(4),
    };
    provider.save_data(&wd);
    let loaded = provider.load_data().unwrap();
    assert_eq!(loaded.name, wd.name);
    assert_eq!(loaded.seed, wd.seed);
    assert_eq!(loaded.generator_name, wd.generator_name);
    assert_eq!(loaded.bounds, wd.bounds);
    fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn resaving_a_chunk_in_place_does_not_corrupt_the_region_file() {
    let dir = temp_dir("resave");
    let provider = AnvilProvider::open(dir.clone()).unwrap();
    let mut chunk = Chunk::new(1, 1);
    FlatGenerator.generate(&mut chunk, 1, 1);
    provider.save_chunk(&chunk);
    provider.save_chunk(&chunk); // same size: overwrites in place
    let loaded = provider.load_chunk(1, 1).unwrap();
    assert_eq!(loaded.get_id(0, 0, 0), 1);
    fs::remove_dir_all(&dir).ok();
  }
}
