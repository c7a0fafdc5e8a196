//! NBT (Named Binary Tag), grounded on `bb_common::nbt` (`Tag`/`NBT` split
//! into `mod.rs`/`serialize.rs`/`deserialize.rs`). Used for `level.dat` and
//! the per-chunk records inside a region file (§6).

mod read;
mod write;

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NbtError {
  #[error("invalid tag type: {0}")]
  InvalidType(u8),
  #[error("invalid string in nbt data")]
  InvalidString(#[from] std::string::FromUtf8Error),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("buffer error: {0}")]
  Codec(#[from] crate::codec::CodecError),
}

pub type Result<T> = std::result::Result<T, NbtError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
  End,
  Byte(i8),
  Short(i16),
  Int(i32),
  Long(i64),
  Float(f32),
  Double(f64),
  ByteArr(Vec<u8>),
  String(String),
  List(Vec<Tag>),
  Compound(HashMap<String, Tag>),
  IntArray(Vec<i32>),
  LongArray(Vec<i64>),
}

impl Tag {
  pub fn ty(&self) -> u8 {
    match self {
      Self::End => 0,
      Self::Byte(_) => 1,
      Self::Short(_) => 2,
      Self::Int(_) => 3,
      Self::Long(_) => 4,
      Self::Float(_) => 5,
      Self::Double(_) => 6,
      Self::ByteArr(_) => 7,
      Self::String(_) => 8,
      Self::List(_) => 9,
      Self::Compound(_) => 10,
      Self::IntArray(_) => 11,
      Self::LongArray(_) => 12,
    }
  }

  pub fn new_compound(entries: &[(&str, Tag)]) -> Tag {
    Tag::Compound(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
  }

  pub fn as_compound(&self) -> Option<&HashMap<String, Tag>> {
    match self {
      Tag::Compound(m) => Some(m),
      _ => None,
    }
  }

  pub fn get<'a>(&'a self, key: &str) -> Option<&'a Tag> { self.as_compound()?.get(key) }

  pub fn as_int(&self) -> Option<i32> {
    match self {
      Tag::Int(v) => Some(*v),
      _ => None,
    }
  }
  pub fn as_long(&self) -> Option<i64> {
    match self {
      Tag::Long(v) => Some(*v),
      _ => None,
    }
  }
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Tag::String(s) => Some(s),
      _ => None,
    }
  }
  pub fn as_byte_arr(&self) -> Option<&[u8]> {
    match self {
      Tag::ByteArr(v) => Some(v),
      _ => None,
    }
  }
  pub fn as_int_arr(&self) -> Option<&[i32]> {
    match self {
      Tag::IntArray(v) => Some(v),
      _ => None,
    }
  }
  pub fn as_list(&self) -> Option<&[Tag]> {
    match self {
      Tag::List(v) => Some(v),
      _ => None,
    }
  }
}

/// A named root tag: the top-level unit NBT data is always serialized as.
#[derive(Debug, Clone, PartialEq)]
pub struct Nbt {
  pub name: String,
  pub tag: Tag,
}

impl Nbt {
  pub fn new(name: impl Into<String>, tag: Tag) -> Self { Nbt { name: name.into(), tag } }
  pub fn empty() -> Self { Nbt { name: String::new(), tag: Tag::End } }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn roundtrip_nested_compound() {
    let nbt = Nbt::new(
      "root",
      Tag::new_compound(&[
        ("byte", Tag::Byte(5)),
        ("str", Tag::String("hi".into())),
        ("list", Tag::List(vec![Tag::Int(1), Tag::Int(2)])),
        ("nested", Tag::new_compound(&[("inner", Tag::Long(99))])),
        ("bytes", Tag::ByteArr(vec![1, 2, 3])),
        ("ints", Tag::IntArray(vec![4, 5, 6])),
      ]),
    );
    let bytes = nbt.serialize();
    let back = Nbt::deserialize(bytes).unwrap();
    assert_eq!(back, nbt);
  }
}
