//! Free functions for the wire primitives: varint/varlong encode-size and the
//! side-effect-free "do we have a full varint yet" probe the framing layer
//! needs before it owns a cursor over the data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
  #[error("varint is too long")]
  VarintTooLong,
  #[error("varlong is too long")]
  VarlongTooLong,
  #[error("buffer underrun: needed {needed} more byte(s)")]
  Underrun { needed: usize },
  #[error("string of {len} bytes exceeds the {max}-byte limit")]
  StringTooLong { len: usize, max: usize },
  #[error("invalid utf-8 in string field")]
  InvalidUtf8,
  #[error("invalid leading byte 0x{0:02x} in utf-8 string")]
  InvalidLeadByte(u8),
  #[error("negative length {0}")]
  NegativeLength(i32),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Outcome of probing a buffer for a complete varint-length-prefixed value,
/// without consuming anything or allocating a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintState {
  /// Not enough bytes buffered yet to even finish reading the length varint.
  NeedMore,
  /// A full varint length prefix, plus a payload of that length, are present.
  /// Carries the total byte count consumed by prefix + payload.
  Ready(usize),
  /// The varint itself is malformed (more than 5/10 continuation bytes).
  Invalid,
}

/// Returns the state of the length-prefixed frame at the start of `buf`,
/// without mutating `buf`. Used by [`crate::buffer`] delimiters.
pub fn got_varint(buf: &[u8], max_bytes: usize) -> VarintState {
  let mut value: i64 = 0;
  for (i, &b) in buf.iter().enumerate() {
    if i >= max_bytes {
      return VarintState::Invalid;
    }
    value |= ((b & 0x7f) as i64) << (7 * i);
    if b & 0x80 == 0 {
      let len = value as usize;
      let total = i + 1 + len;
      if total <= buf.len() {
        return VarintState::Ready(total);
      }
      return VarintState::NeedMore;
    }
  }
  VarintState::NeedMore
}

/// Number of bytes a 32-bit varint-encoding of `n` would occupy.
pub fn varint_size(n: i32) -> usize {
  let mut val = n as u32;
  let mut size = 1;
  while val >= 0x80 {
    val >>= 7;
    size += 1;
  }
  size
}

/// Number of bytes a 64-bit varint-encoding of `n` would occupy.
pub fn varlong_size(n: i64) -> usize {
  let mut val = n as u64;
  let mut size = 1;
  while val >= 0x80 {
    val >>= 7;
    size += 1;
  }
  size
}

/// Validates that `bytes` is a syntactically sound UTF-8 string under the
/// wire rules §4.1 describes: every multibyte sequence must begin with a byte
/// whose leading-one-bit run is 0 (ASCII) or 2..=6 (a valid UTF-8 lead byte),
/// never 1 (a continuation byte in lead position) and never more than 6.
pub fn validate_string_bytes(bytes: &[u8]) -> Result<()> {
  let mut i = 0;
  while i < bytes.len() {
    let b = bytes[i];
    let ones = b.leading_ones();
    if ones == 1 || ones > 6 {
      return Err(CodecError::InvalidLeadByte(b));
    }
    let extra = if ones == 0 { 0 } else { ones as usize - 1 };
    if i + extra >= bytes.len() {
      return Err(CodecError::InvalidUtf8);
    }
    i += 1 + extra;
  }
  std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn varint_size_boundaries() {
    assert_eq!(varint_size(0), 1);
    assert_eq!(varint_size(127), 1);
    assert_eq!(varint_size(128), 2);
    assert_eq!(varint_size(16383), 2);
    assert_eq!(varint_size(2097151), 3);
    assert_eq!(varint_size(i32::MAX), 5);
  }

  #[test]
  fn got_varint_need_more_on_partial_prefix() {
    // 0x80 has the continuation bit set, so we need more bytes for the length
    // varint itself.
    assert_eq!(got_varint(&[0x80], 5), VarintState::NeedMore);
  }

  #[test]
  fn got_varint_need_more_on_partial_body() {
    // length = 5, but only 2 bytes of body buffered.
    assert_eq!(got_varint(&[5, 1, 2], 5), VarintState::NeedMore);
  }

  #[test]
  fn got_varint_ready() {
    assert_eq!(got_varint(&[3, 1, 2, 3], 5), VarintState::Ready(4));
    // Extra trailing bytes (start of the next packet) don't change this.
    assert_eq!(got_varint(&[3, 1, 2, 3, 9, 9], 5), VarintState::Ready(4));
  }

  #[test]
  fn got_varint_invalid_too_long() {
    assert_eq!(got_varint(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01], 5), VarintState::Invalid);
  }

  #[test]
  fn validate_string_rejects_stray_continuation_byte() {
    assert!(validate_string_bytes(&[0x80]).is_err());
  }

  #[test]
  fn validate_string_accepts_multibyte() {
    assert!(validate_string_bytes("héllo".as_bytes()).is_ok());
  }
}
