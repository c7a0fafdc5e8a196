use super::{Nbt, NbtError, Result, Tag};
use crate::buffer::PacketReader;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::{collections::HashMap, io::Read};

impl Nbt {
  /// Deserializes a possibly gzip- or zlib-compressed NBT blob, as found in
  /// `level.dat` or a region file chunk record.
  pub fn deserialize_compressed(buf: Vec<u8>) -> Result<Self> {
    if buf.len() >= 2 && buf[0] == 0x1f && buf[1] == 0x8b {
      let mut d = GzDecoder::new(buf.as_slice());
      let mut out = vec![];
      d.read_to_end(&mut out)?;
      Self::deserialize(out)
    } else {
      let mut d = ZlibDecoder::new(buf.as_slice());
      let mut out = vec![];
      match d.read_to_end(&mut out) {
        Ok(_) => Self::deserialize(out),
        Err(_) => Self::deserialize(buf),
      }
    }
  }

  pub fn deserialize(buf: Vec<u8>) -> Result<Self> {
    let mut r = PacketReader::new(buf);
    Self::deserialize_from(&mut r)
  }

  fn deserialize_from(r: &mut PacketReader) -> Result<Self> {
    let ty = r.read_u8()?;
    if ty == Tag::End.ty() {
      return Ok(Nbt::empty());
    }
    let name = read_name(r)?;
    Ok(Nbt::new(name, Tag::deserialize(ty, r)?))
  }
}

fn read_name(r: &mut PacketReader) -> Result<String> {
  let len = r.read_u16()? as usize;
  let bytes = r.read_bytes(len)?;
  Ok(String::from_utf8(bytes)?)
}

impl Tag {
  fn deserialize(ty: u8, r: &mut PacketReader) -> Result<Self> {
    Ok(match ty {
      0 => Tag::End,
      1 => Tag::Byte(r.read_i8()?),
      2 => Tag::Short(r.read_i16()?),
      3 => Tag::Int(r.read_i32()?),
      4 => Tag::Long(r.read_i64()?),
      5 => Tag::Float(r.read_f32()?),
      6 => Tag::Double(r.read_f64()?),
      7 => {
        let len = r.read_i32()?.max(0) as usize;
        Tag::ByteArr(r.read_bytes(len)?)
      }
      8 => Tag::String(read_name(r)?),
      9 => {
        let inner_ty = r.read_u8()?;
        let len = r.read_i32()?.max(0);
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
          items.push(Tag::deserialize(inner_ty, r)?);
        }
        Tag::List(items)
      }
      10 => {
        let mut map = HashMap::new();
        loop {
          let ty = r.read_u8()?;
          if ty == Tag::End.ty() {
            break;
          }
          let name = read_name(r)?;
          map.insert(name, Tag::deserialize(ty, r)?);
        }
        Tag::Compound(map)
      }
      11 => {
        let len = r.read_i32()?.max(0);
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
          items.push(r.read_i32()?);
        }
        Tag::IntArray(items)
      }
      12 => {
        let len = r.read_i32()?.max(0);
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
          items.push(r.read_i64()?);
        }
        Tag::LongArray(items)
      }
      other => return Err(NbtError::InvalidType(other)),
    })
  }
}
