//! Per-connection framing pipeline (§3, §4.5). Grounded on
//! `bb_server::net::ConnPlayer`'s `conn: Mutex<Connection>` split and on
//! `sc_proxy::conn::Conn`'s per-connection transformer/state bundle, but
//! reorganized around the explicit delimiter/transformer-chain split §4.3/
//! §4.4 call for.
//!
//! A [`Connection`] owns only framing state. Socket I/O and sequence-class
//! dispatch live one layer up, in [`super::manager::ConnectionManager`], so
//! this type can be unit-tested by feeding it raw bytes directly.

use super::{
  compression::CompressionTransformer,
  delimiter::{DelimiterResult, PacketDelimiter, VarintDelimiter},
  encryption::EncryptionTransformer,
  packet::{ClientBound, ServerBound},
  protocol::State,
  transform::PacketTransformer,
};
use crate::{
  concurrency::SeqClass,
  error::{ProtoError, Result},
};
use bw_common::PacketReader;
use parking_lot::Mutex;
use std::{
  net::SocketAddr,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
  },
};

/// Maximum size of the fixed-capacity inbound read chunk (§3).
pub const READ_CHUNK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
  Active,
  DisconnectRequested,
  Disconnected,
}

/// One fully decoded inbound packet, extracted by the reactor thread and
/// handed off for sequence-class dispatch (§4.5) — never executed inline.
pub struct Inbound {
  pub opcode: i32,
  pub reader: PacketReader,
}

pub struct Connection {
  pub peer_addr: SocketAddr,
  /// Cross-connection server state (config, keypair, world, player
  /// registry) this connection's handlers need but does not own.
  pub shared:    Arc<crate::server::Shared>,
  /// Scratch state for the in-progress login handshake (username chosen so
  /// far, the verification token sent, etc). Reset once the connection
  /// reaches `Play`.
  pub login:     super::protocol::login::LoginState,
  /// Set once this connection's player has joined the world (§3).
  pub player:    Option<Arc<crate::player::Player>>,
  state:         State,
  compression:   CompressionTransformer,
  encryption:    EncryptionTransformer,
  delimiter:     Box<dyn PacketDelimiter>,

  /// Bytes read from the socket and decrypted, not yet delimited into whole
  /// packets.
  read_buf: Vec<u8>,

  /// Fully framed (and, if active, encrypted) bytes waiting for the
  /// reactor's writable callback to drain them to the socket.
  outbound: Vec<Vec<u8>>,
  next_outbound_id: AtomicU64,

  lifecycle: Lifecycle,

  /// Holds the disconnect payload requested via [`Connection::disconnect`]
  /// until the tick timer performs the real teardown (§4.5).
  pending_disconnect_reason: Option<String>,

  /// This connection's job sequence class (§3: "a per-connection job
  /// sequence class"). Every dispatched packet, and nothing else, runs
  /// through it, so at most one handler call is ever in flight per
  /// connection (§8).
  seq: SeqClass,

  /// A weak handle back to the `Arc<Mutex<Connection>>` the reactor wraps
  /// this value in, set once via [`Self::attach_self`] right after
  /// construction. Needed so a packet handler holding only `&mut Connection`
  /// can still hand a login-finalized [`crate::player::Player`] a
  /// `Weak<Mutex<Connection>>` of its own (§9's non-owning back-reference).
  self_handle: Option<Weak<Mutex<Connection>>>,
}

impl Connection {
  pub fn new(peer_addr: SocketAddr, shared: Arc<crate::server::Shared>) -> Self {
    let seq = shared.pool.create_seq();
    Connection {
      peer_addr,
      shared,
      login: super::protocol::login::LoginState::default(),
      player: None,
      state: State::Handshake,
      compression: CompressionTransformer::new(),
      encryption: EncryptionTransformer::new(),
      delimiter: Box::new(VarintDelimiter),
      read_buf: Vec::with_capacity(READ_CHUNK_SIZE),
      outbound: Vec::new(),
      next_outbound_id: AtomicU64::new(0),
      lifecycle: Lifecycle::Active,
      pending_disconnect_reason: None,
      seq,
      self_handle: None,
    }
  }

  /// Records the handle the reactor wraps this connection in. Called exactly
  /// once, right after construction, before the connection is reachable from
  /// any other thread.
  pub fn attach_self(&mut self, handle: Weak<Mutex<Connection>>) { self.self_handle = Some(handle); }

  /// A fresh `Weak` to this connection, for handing to a newly-created
  /// player. Only `None` if called before [`Self::attach_self`].
  pub fn weak_handle(&self) -> Option<Weak<Mutex<Connection>>> { self.self_handle.clone() }

  pub fn seq(&self) -> SeqClass { self.seq.clone() }

  pub fn state(&self) -> State { self.state }
  pub fn set_state(&mut self, state: State) { self.state = state; }
  pub fn lifecycle(&self) -> Lifecycle { self.lifecycle }

  pub fn compression_mut(&mut self) -> &mut CompressionTransformer { &mut self.compression }
  pub fn encryption_mut(&mut self) -> &mut EncryptionTransformer { &mut self.encryption }

  /// Feeds newly-read socket bytes through decryption and framing, returning
  /// every whole packet now available. Called from the reactor thread; the
  /// caller is responsible for submitting each result to the connection's
  /// sequence class rather than dispatching inline (§4.5).
  pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Inbound>> {
    let (decrypted, _) = self.encryption.transform_in(data)?;
    self.read_buf.extend_from_slice(&decrypted);

    let mut out = Vec::new();
    loop {
      match self.delimiter.next(&self.read_buf) {
        DelimiterResult::Ready { total } => {
          let framed: Vec<u8> = self.read_buf.drain(..total).collect();
          let mut r = PacketReader::new(framed);
          let _len = r.read_varint()?;
          let body = r.read_rest();
          let (body, _) = self.compression.transform_in(&body)?;
          let mut br = PacketReader::new(body);
          let opcode = br.read_varint()?;
          out.push(Inbound { opcode, reader: br });
        }
        DelimiterResult::NeedMore(_) => break,
        DelimiterResult::Invalid => {
          return Err(ProtoError::Violation("invalid packet length varint".into()))
        }
      }
    }
    Ok(out)
  }

  /// Decodes and dispatches one packet already extracted by [`Self::feed`].
  /// Runs on a pool thread under this connection's sequence class — at most
  /// one such call is ever in flight for a given connection (§8).
  pub fn dispatch(&mut self, mut inbound: Inbound) -> Result<()> {
    match ServerBound::decode(self.state, inbound.opcode, &mut inbound.reader)? {
      Some(packet) => super::protocol::dispatch(self, packet),
      None => Ok(()),
    }
  }

  /// Transforms and enqueues a packet for sending. Dropped (never queued) if
  /// a disconnect has already been requested (§4.5).
  pub fn send(&mut self, packet: ClientBound) {
    if self.lifecycle != Lifecycle::Active {
      return;
    }
    let body = self.compression.transform_out(&packet.encode().into_vec());
    let mut framed = bw_common::Packet::unreserved();
    framed.write_varint(body.len() as i32);
    framed.write_bytes(&body);
    let bytes = self.encryption.transform_out(&framed.into_vec());
    self.next_outbound_id.fetch_add(1, Ordering::Relaxed);
    self.outbound.push(bytes);
  }

  /// Sends `packet`, then requests disconnection once it has been flushed.
  pub fn send_and_disconnect(&mut self, packet: ClientBound, reason: impl Into<String>) {
    self.send(packet);
    self.disconnect(reason);
  }

  /// Drains everything queued for the socket's writable callback.
  pub fn drain_outbound(&mut self) -> Vec<Vec<u8>> { std::mem::take(&mut self.outbound) }

  pub fn has_outbound(&self) -> bool { !self.outbound.is_empty() }

  /// Sets the disconnect-requested flag; the actual teardown happens on the
  /// next tick, never inline from an inbound-transform path (§4.5).
  pub fn disconnect(&mut self, reason: impl Into<String>) {
    if self.lifecycle == Lifecycle::Active {
      self.lifecycle = Lifecycle::DisconnectRequested;
      self.pending_disconnect_reason = Some(reason.into());
    }
  }

  /// Called by the 20ms tick timer (§4.5). Returns `true` the first time it
  /// observes a pending disconnect request, signalling the caller to perform
  /// the real teardown (drop from live list into the gray list, etc).
  pub fn tick(&mut self) -> bool {
    if self.lifecycle == Lifecycle::DisconnectRequested {
      self.lifecycle = Lifecycle::Disconnected;
      if let Some(reason) = self.pending_disconnect_reason.take() {
        debug!("connection {} disconnected: {}", self.peer_addr, reason);
      }
      self.outbound.clear();
      // Disables the sequence class so any handler job still queued behind
      // one in flight is dropped rather than run against a dead socket
      // (§4.5's teardown step 2).
      self.seq.disable();
      return true;
    }
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bw_common::Packet;
  use pretty_assertions::assert_eq;

  fn addr() -> SocketAddr { "127.0.0.1:0".parse().unwrap() }

  fn test_connection() -> Connection {
    Connection::new(addr(), crate::server::Shared::for_tests())
  }

  #[test]
  fn feed_extracts_one_whole_packet() {
    let mut conn = test_connection();
    let mut p = Packet::unreserved();
    p.write_varint(0x00); // opcode
    let body = p.into_vec();
    let mut framed = Packet::unreserved();
    framed.write_varint(body.len() as i32);
    framed.write_bytes(&body);
    let packets = conn.feed(&framed.into_vec()).unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].opcode, 0x00);
  }

  #[test]
  fn feed_across_two_reads_yields_one_packet() {
    let mut conn = test_connection();
    let mut body = Packet::unreserved();
    body.write_varint(0x01);
    body.write_bytes(&vec![9u8; 250]);
    let body = body.into_vec();
    let mut framed = Packet::unreserved();
    framed.write_varint(body.len() as i32);
    framed.write_bytes(&body);
    let bytes = framed.into_vec();
    let (first, second) = bytes.split_at(100);
    assert!(conn.feed(first).unwrap().is_empty());
    let packets = conn.feed(second).unwrap();
    assert_eq!(packets.len(), 1);
  }

  #[test]
  fn send_after_disconnect_is_dropped() {
    let mut conn = test_connection();
    conn.disconnect("bye");
    conn.send(ClientBound::KeepAlive { id: 1 });
    assert!(!conn.has_outbound());
  }
}
