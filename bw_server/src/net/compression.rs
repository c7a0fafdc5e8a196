//! Threshold-gated per-packet deflate/inflate (§4.3), grounded on
//! `sc_proxy::stream::java::JavaStream::write`/`read`'s zlib framing, but
//! using `flate2` (the compressor already in this workspace's stack via
//! `bw_common::nbt`) instead of `miniz_oxide`.

use super::transform::{PacketTransformer, Readiness};
use crate::error::{ProtoError, Result};
use bw_common::codec::VarintState;
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use std::io::{Read, Write};

/// Operates on an already length-delimited packet body (the bytes between
/// the outer `varint(total_len)` framing handled by the
/// [`super::delimiter::PacketDelimiter`]). When active, adds/strips the inner
/// `varint(uncompressed_len)` prefix described in §4.3/§6.
pub struct CompressionTransformer {
  active:    bool,
  threshold: usize,
  level:     u32,
}

impl CompressionTransformer {
  pub fn new() -> Self { CompressionTransformer { active: false, threshold: 0, level: 6 } }

  /// Must precede [`PacketTransformer::start`].
  pub fn setup(&mut self, threshold: usize, level: u32) {
    self.threshold = threshold;
    self.level = level;
  }

  pub fn threshold(&self) -> usize { self.threshold }
}

impl Default for CompressionTransformer {
  fn default() -> Self { Self::new() }
}

impl PacketTransformer for CompressionTransformer {
  fn transform_in(&mut self, bytes: &[u8]) -> Result<(Vec<u8>, usize)> {
    if !self.active {
      return Ok((bytes.to_vec(), bytes.len()));
    }
    let mut reader = bw_common::PacketReader::new(bytes.to_vec());
    let uncompressed_len = reader.read_varint()?;
    let rest = reader.read_rest();
    let body = if uncompressed_len == 0 {
      rest
    } else {
      let mut decoder = ZlibDecoder::new(rest.as_slice());
      let mut out = Vec::with_capacity(uncompressed_len as usize);
      decoder
        .read_to_end(&mut out)
        .map_err(|e| ProtoError::Transformer(format!("inflate failed: {e}")))?;
      out
    };
    Ok((body, bytes.len()))
  }

  fn transform_out(&mut self, bytes: &[u8]) -> Vec<u8> {
    if !self.active {
      return bytes.to_vec();
    }
    let mut out = bw_common::Packet::unreserved();
    if bytes.len() >= self.threshold {
      let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
      encoder.write_all(bytes).expect("in-memory zlib write cannot fail");
      let compressed = encoder.finish().expect("in-memory zlib finish cannot fail");
      out.write_varint(bytes.len() as i32);
      out.write_bytes(&compressed);
    } else {
      out.write_varint(0);
      out.write_bytes(bytes);
    }
    out.into_vec()
  }

  fn in_enough(&self, bytes: &[u8]) -> Readiness {
    if !self.active {
      return Readiness::Ready;
    }
    match bw_common::codec::got_varint(bytes, 5) {
      VarintState::Ready(_) => Readiness::Ready,
      VarintState::NeedMore => Readiness::NeedMore,
      VarintState::Invalid => Readiness::Invalid,
    }
  }

  fn max_out_size(&self, in_len: usize) -> usize { in_len + (in_len / 1000) + 64 }

  fn start(&mut self) {
    self.active = true;
    debug!("compression enabled, threshold={}", self.threshold);
  }
  fn stop(&mut self) { self.active = false; }
  fn is_active(&self) -> bool { self.active }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn below_threshold_is_stored_raw() {
    let mut t = CompressionTransformer::new();
    t.setup(256, 6);
    t.start();
    let framed = t.transform_out(b"tiny");
    assert_eq!(framed[0], 0);
    let (body, consumed) = t.transform_in(&framed).unwrap();
    assert_eq!(consumed, framed.len());
    assert_eq!(body, b"tiny");
  }

  #[test]
  fn above_threshold_round_trips_through_zlib() {
    let mut t = CompressionTransformer::new();
    t.setup(4, 6);
    t.start();
    let payload = vec![7u8; 5000];
    let framed = t.transform_out(&payload);
    assert!(framed.len() < payload.len());
    let (body, _) = t.transform_in(&framed).unwrap();
    assert_eq!(body, payload);
  }

  #[test]
  fn disabled_is_identity() {
    let mut t = CompressionTransformer::new();
    let out = t.transform_out(b"hello");
    assert_eq!(out, b"hello");
    let (body, consumed) = t.transform_in(b"hello").unwrap();
    assert_eq!(body, b"hello");
    assert_eq!(consumed, 5);
  }
}
