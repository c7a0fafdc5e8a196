use super::{Nbt, Tag};
use crate::buffer::Packet;

impl Nbt {
  pub fn serialize(&self) -> Vec<u8> {
    let mut out = Packet::unreserved();
    self.serialize_into(&mut out);
    out.into_vec()
  }

  fn serialize_into(&self, out: &mut Packet) {
    out.write_u8(self.tag.ty());
    if matches!(self.tag, Tag::End) {
      return;
    }
    write_name(out, &self.name);
    self.tag.serialize_into(out);
  }
}

fn write_name(out: &mut Packet, name: &str) {
  out.write_u16(name.len() as u16);
  out.write_bytes(name.as_bytes());
}

impl Tag {
  fn serialize_into(&self, out: &mut Packet) {
    match self {
      Tag::End => {}
      Tag::Byte(v) => out.write_i8(*v),
      Tag::Short(v) => out.write_i16(*v),
      Tag::Int(v) => out.write_i32(*v),
      Tag::Long(v) => out.write_i64(*v),
      Tag::Float(v) => out.write_f32(*v),
      Tag::Double(v) => out.write_f64(*v),
      Tag::ByteArr(v) => {
        out.write_i32(v.len() as i32);
        out.write_bytes(v);
      }
      Tag::String(v) => write_name(out, v),
      Tag::List(items) => {
        let inner_ty = items.first().map(Tag::ty).unwrap_or(0);
        out.write_u8(inner_ty);
        out.write_i32(items.len() as i32);
        for item in items {
          item.serialize_into(out);
        }
      }
      Tag::Compound(map) => {
        for (name, tag) in map {
          out.write_u8(tag.ty());
          if tag.ty() == Tag::End.ty() {
            continue;
          }
          write_name(out, name);
          tag.serialize_into(out);
        }
        out.write_u8(Tag::End.ty());
      }
      Tag::IntArray(v) => {
        out.write_i32(v.len() as i32);
        for n in v {
          out.write_i32(*n);
        }
      }
      Tag::LongArray(v) => {
        out.write_i32(v.len() as i32);
        for n in v {
          out.write_i64(*n);
        }
      }
    }
  }
}
