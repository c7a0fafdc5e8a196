//! The packet delimiter (§3, §4.4): finds the byte boundary of one complete
//! outer `varint(total_len) || body` unit inside an accumulating read
//! buffer, independent of whether compression or encryption are active
//! (those operate on the body bytes once the delimiter has carved them out).

use bw_common::codec::{got_varint, VarintState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterResult {
  /// At least this many more bytes are required before trying again.
  NeedMore(usize),
  /// A full packet (length prefix + body) occupies the first `total` bytes.
  Ready { total: usize },
  Invalid,
}

pub trait PacketDelimiter: Send {
  fn next(&mut self, buf: &[u8]) -> DelimiterResult;
}

/// The standard varint-length delimiter used once a version has been
/// settled on.
#[derive(Default)]
pub struct VarintDelimiter;

impl PacketDelimiter for VarintDelimiter {
  fn next(&mut self, buf: &[u8]) -> DelimiterResult {
    match got_varint(buf, 5) {
      VarintState::NeedMore => match length_prefix(buf, 5) {
        // The length varint itself is fully buffered, so the real shortfall
        // is however much of the body is still missing (§4.4).
        Some((prefix_len, body_len)) => DelimiterResult::NeedMore(prefix_len + body_len - buf.len()),
        None => DelimiterResult::NeedMore(1),
      },
      VarintState::Invalid => DelimiterResult::Invalid,
      VarintState::Ready(total) => DelimiterResult::Ready { total },
    }
  }
}

/// Returns `(prefix_len, body_len)` once the outer length varint is fully
/// readable, independent of whether the body it announces is. `None` while
/// the varint's own continuation bytes are still incomplete.
fn length_prefix(buf: &[u8], max_bytes: usize) -> Option<(usize, usize)> {
  let mut value: i64 = 0;
  for (i, &b) in buf.iter().enumerate() {
    if i >= max_bytes {
      return None;
    }
    value |= ((b & 0x7f) as i64) << (7 * i);
    if b & 0x80 == 0 {
      return Some((i + 1, value as usize));
    }
  }
  None
}

/// Wraps [`VarintDelimiter`] for the handshake packet only: this is the one
/// packet read before a concrete protocol version has been settled on, so
/// there is nothing to "infer" beyond using the same framing (§4.4, §4.6).
#[derive(Default)]
pub struct VersionInferenceDelimiter {
  inner: VarintDelimiter,
}

impl PacketDelimiter for VersionInferenceDelimiter {
  fn next(&mut self, buf: &[u8]) -> DelimiterResult { self.inner.next(buf) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bw_common::Packet;
  use pretty_assertions::assert_eq;

  #[test]
  fn need_more_when_length_prefix_incomplete() {
    let mut d = VarintDelimiter;
    assert_eq!(d.next(&[0x80]), DelimiterResult::NeedMore(1));
  }

  #[test]
  fn need_more_when_body_incomplete() {
    let mut p = Packet::unreserved();
    p.write_varint(300);
    p.write_bytes(&vec![0u8; 100]);
    let buf = p.into_vec();
    let mut d = VarintDelimiter;
    match d.next(&buf) {
      DelimiterResult::NeedMore(n) => assert_eq!(n, 200),
      other => panic!("expected NeedMore, got {other:?}"),
    }
  }

  #[test]
  fn ready_when_full_packet_present() {
    let mut p = Packet::unreserved();
    p.write_varint(5);
    p.write_bytes(&[1, 2, 3, 4, 5]);
    let buf = p.into_vec();
    let mut d = VarintDelimiter;
    assert_eq!(d.next(&buf), DelimiterResult::Ready { total: buf.len() });
  }

  #[test]
  fn split_across_two_reads() {
    let mut p = Packet::unreserved();
    p.write_varint(300);
    p.write_bytes(&vec![7u8; 300]);
    let full = p.into_vec();
    let (first, second) = full.split_at(100);
    let mut d = VarintDelimiter;
    assert!(matches!(d.next(first), DelimiterResult::NeedMore(_)));
    let mut acc = first.to_vec();
    acc.extend_from_slice(second);
    assert_eq!(d.next(&acc), DelimiterResult::Ready { total: full.len() });
  }
}
