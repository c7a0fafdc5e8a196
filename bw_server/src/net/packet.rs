//! Server-bound (`sb`) and client-bound (`cb`) packet shapes for all four
//! protocol states (§6), plus the encode/decode glue. Grounded on the
//! `sb::Packet`/`cb::Packet` match-dispatch style used throughout
//! `bb_server::net::packet`, but flattened to this one protocol version
//! instead of a multi-version enum.

use crate::error::{ProtoError, Result};
use bw_common::{Packet, PacketReader};

pub const PROTOCOL_VERSION: i32 = 47;
const MAX_STRING_LEN: usize = 32767;

/// Opcodes and fields a client sends us, by state.
#[derive(Debug, Clone)]
pub enum ServerBound {
  Handshake { version: i32, address: String, port: u16, next_state: i32 },

  StatusRequest,
  StatusPing { payload: i64 },

  LoginStart { username: String },
  EncryptionResponse { shared_secret: Vec<u8>, verify_token: Vec<u8> },

  KeepAlive { id: i32 },
  Chat { message: String },
  Player { on_ground: bool },
  PlayerPosition { x: f64, y: f64, z: f64, on_ground: bool },
  PlayerLook { yaw: f32, pitch: f32, on_ground: bool },
  PlayerPositionLook { x: f64, y: f64, z: f64, yaw: f32, pitch: f32, on_ground: bool },
  PlayerDigging { status: i8, x: i32, y: i32, z: i32, face: i8 },
  BlockPlacement { x: i32, y: i32, z: i32, face: i8, held_item: RawSlot, cx: i8, cy: i8, cz: i8 },
  HeldItemChange { slot: i16 },
  CloseWindow { window_id: u8 },
  ClickWindow { window_id: u8, slot: i16, button: i8, action: i16, mode: i8, clicked_item: RawSlot },
  CreativeInventoryAction { slot: i16, item: RawSlot },
}

/// A slot as it appears on the wire, decoded only as far as §6 specifies
/// (NBT payload, if present, is kept as opaque bytes — NBT item semantics
/// are outside this crate's scope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSlot {
  pub id:     i16,
  pub count:  u8,
  pub damage: i16,
  pub nbt:    Option<Vec<u8>>,
}

impl RawSlot {
  pub const EMPTY: RawSlot = RawSlot { id: -1, count: 0, damage: 0, nbt: None };

  fn read(r: &mut PacketReader) -> Result<Self> {
    let id = r.read_i16()?;
    if id == -1 {
      return Ok(RawSlot::EMPTY);
    }
    let count = r.read_u8()?;
    let damage = r.read_i16()?;
    let has_nbt = r.read_u8()?;
    let nbt = if has_nbt != 0 { Some(r.read_rest()) } else { None };
    Ok(RawSlot { id, count, damage, nbt })
  }

  fn write(&self, p: &mut Packet) {
    p.write_i16(self.id);
    if self.id == -1 {
      return;
    }
    p.write_u8(self.count);
    p.write_i16(self.damage);
    match &self.nbt {
      Some(bytes) => {
        p.write_u8(1);
        p.write_bytes(bytes);
      }
      None => p.write_u8(0),
    }
  }
}

impl ServerBound {
  /// Decodes one packet body (opcode + fields already stripped of framing)
  /// for the given protocol state.
  ///
  /// `Ok(None)` means the opcode falls within the state's valid range but has
  /// no handler (silently ignored, per §4.6); `Err` means the opcode is
  /// outside the state's valid range entirely, which closes the connection.
  pub fn decode(
    state: super::protocol::State,
    opcode: i32,
    r: &mut PacketReader,
  ) -> Result<Option<Self>> {
    use super::protocol::State::*;
    if opcode < 0 || opcode > state.max_opcode() {
      return Err(ProtoError::OpcodeOutOfRange { state: state.name(), opcode });
    }
    Ok(Some(match (state, opcode) {
      (Handshake, 0x00) => ServerBound::Handshake {
        version:    r.read_varint()?,
        address:    r.read_str(255)?,
        port:       r.read_u16()?,
        next_state: r.read_varint()?,
      },
      (Status, 0x00) => ServerBound::StatusRequest,
      (Status, 0x01) => ServerBound::StatusPing { payload: r.read_i64()? },
      (Login, 0x00) => ServerBound::LoginStart { username: r.read_str(16)? },
      (Login, 0x01) => {
        let secret_len = r.read_varint()?;
        if secret_len < 0 {
          return Err(ProtoError::Violation("negative shared secret length".into()));
        }
        let shared_secret = r.read_bytes(secret_len as usize)?;
        let token_len = r.read_varint()?;
        if token_len < 0 {
          return Err(ProtoError::Violation("negative verify token length".into()));
        }
        let verify_token = r.read_bytes(token_len as usize)?;
        ServerBound::EncryptionResponse { shared_secret, verify_token }
      }
      (Play, 0x00) => ServerBound::KeepAlive { id: r.read_varint()? },
      (Play, 0x01) => ServerBound::Chat { message: r.read_str(MAX_STRING_LEN)? },
      (Play, 0x03) => ServerBound::Player { on_ground: r.read_bool()? },
      (Play, 0x04) => ServerBound::PlayerPosition {
        x: r.read_f64()?,
        y: r.read_f64()?,
        z: r.read_f64()?,
        on_ground: r.read_bool()?,
      },
      (Play, 0x05) => ServerBound::PlayerLook {
        yaw:       r.read_f32()?,
        pitch:     r.read_f32()?,
        on_ground: r.read_bool()?,
      },
      (Play, 0x06) => ServerBound::PlayerPositionLook {
        x:         r.read_f64()?,
        y:         r.read_f64()?,
        z:         r.read_f64()?,
        yaw:       r.read_f32()?,
        pitch:     r.read_f32()?,
        on_ground: r.read_bool()?,
      },
      (Play, 0x07) => {
        let status = r.read_i8()?;
        let (x, y, z) = r.read_position()?;
        let face = r.read_i8()?;
        ServerBound::PlayerDigging { status, x, y, z, face }
      }
      (Play, 0x08) => {
        let (x, y, z) = r.read_position()?;
        let face = r.read_i8()?;
        let held_item = RawSlot::read(r)?;
        let cx = r.read_i8()?;
        let cy = r.read_i8()?;
        let cz = r.read_i8()?;
        ServerBound::BlockPlacement { x, y, z, face, held_item, cx, cy, cz }
      }
      (Play, 0x09) => ServerBound::HeldItemChange { slot: r.read_i16()? },
      (Play, 0x0D) => ServerBound::CloseWindow { window_id: r.read_u8()? },
      (Play, 0x0E) => ServerBound::ClickWindow {
        window_id:    r.read_u8()?,
        slot:         r.read_i16()?,
        button:       r.read_i8()?,
        action:       r.read_i16()?,
        mode:         r.read_i8()?,
        clicked_item: RawSlot::read(r)?,
      },
      (Play, 0x10) => {
        let slot = r.read_i16()?;
        let item = RawSlot::read(r)?;
        ServerBound::CreativeInventoryAction { slot, item }
      }
      // In-range but unimplemented opcodes (e.g. Play 0x02, 0x0A-0x0C, 0x0F):
      // silently ignored per §4.6 rather than closing the connection.
      _ => return Ok(None),
    }))
  }
}

/// Packets we send to a client. `encode` writes the opcode and fields into
/// the body of `p` (framing/compression/encryption happen afterwards in the
/// connection's send path).
#[derive(Debug, Clone)]
pub enum ClientBound {
  StatusResponse { json: String },
  StatusPong { payload: i64 },

  LoginDisconnect { json_reason: String },
  EncryptionRequest { public_key_der: Vec<u8>, verify_token: [u8; 4] },
  LoginSuccess { uuid: String, username: String },
  SetCompression { threshold: i32 },

  KeepAlive { id: i32 },
  JoinGame {
    entity_id:        i32,
    gamemode:         u8,
    dimension:        i32,
    difficulty:       u8,
    max_players:      u8,
    level_type:       String,
    reduced_debug:    bool,
  },
  Chat { json: String, position: u8 },
  SpawnPosition { x: i32, y: i32, z: i32 },
  PlayerPositionLook { x: f64, y: f64, z: f64, yaw: f32, pitch: f32, flags: u8 },
  SpawnPlayer { entity_id: i32, uuid: String, x: f64, y: f64, z: f64, yaw: f32, pitch: f32 },
  ChunkData { cx: i32, cz: i32, ground_up_continuous: bool, primary_bit_mask: u16, data: Vec<u8> },
  PlayerListAddItem { uuid: String, username: String, gamemode: i32, ping: i32 },
  PlayerListRemoveItem { uuid: String },
  Disconnect { json_reason: String },
}

impl ClientBound {
  pub fn opcode(&self) -> i32 {
    use ClientBound::*;
    match self {
      StatusResponse { .. } => 0x00,
      StatusPong { .. } => 0x01,
      LoginDisconnect { .. } => 0x00,
      EncryptionRequest { .. } => 0x01,
      LoginSuccess { .. } => 0x02,
      SetCompression { .. } => 0x03,
      KeepAlive { .. } => 0x00,
      JoinGame { .. } => 0x01,
      Chat { .. } => 0x02,
      SpawnPosition { .. } => 0x05,
      PlayerPositionLook { .. } => 0x08,
      SpawnPlayer { .. } => 0x0C,
      ChunkData { .. } => 0x21,
      PlayerListAddItem { .. } | PlayerListRemoveItem { .. } => 0x38,
      Disconnect { .. } => 0x40,
    }
  }

  /// Builds the packet body: `varint(opcode) || fields`. Framing (length
  /// prefix, compression, encryption) is layered on by the connection.
  pub fn encode(&self) -> Packet {
    let mut p = Packet::unreserved();
    p.write_varint(self.opcode());
    use ClientBound::*;
    match self {
      StatusResponse { json } => p.write_str(json),
      StatusPong { payload } => p.write_i64(*payload),
      LoginDisconnect { json_reason } => p.write_str(json_reason),
      EncryptionRequest { public_key_der, verify_token } => {
        p.write_str("");
        p.write_varint(public_key_der.len() as i32);
        p.write_bytes(public_key_der);
        p.write_varint(verify_token.len() as i32);
        p.write_bytes(verify_token);
      }
      LoginSuccess { uuid, username } => {
        p.write_str(uuid);
        p.write_str(username);
      }
      SetCompression { threshold } => p.write_varint(*threshold),
      KeepAlive { id } => p.write_varint(*id),
      JoinGame {
        entity_id,
        gamemode,
        dimension,
        difficulty,
        max_players,
        level_type,
        reduced_debug,
      } => {
        p.write_i32(*entity_id);
        p.write_u8(*gamemode);
        p.write_i8(*dimension as i8);
        p.write_u8(*difficulty);
        p.write_u8(*max_players);
        p.write_str(level_type);
        p.write_bool(*reduced_debug);
      }
      Chat { json, position } => {
        p.write_str(json);
        p.write_u8(*position);
      }
      SpawnPosition { x, y, z } => p.write_position(*x, *y, *z),
      PlayerPositionLook { x, y, z, yaw, pitch, flags } => {
        p.write_f64(*x);
        p.write_f64(*y);
        p.write_f64(*z);
        p.write_f32(*yaw);
        p.write_f32(*pitch);
        p.write_u8(*flags);
      }
      SpawnPlayer { entity_id, uuid, x, y, z, yaw, pitch } => {
        p.write_varint(*entity_id);
        p.write_str(uuid);
        p.write_f64(*x);
        p.write_f64(*y);
        p.write_f64(*z);
        p.write_i8((*yaw * 256.0 / 360.0) as i8);
        p.write_i8((*pitch * 256.0 / 360.0) as i8);
        p.write_i16(0); // current item, unused until inventories are modeled beyond slots
        p.write_u8(0x7F); // empty metadata
      }
      ChunkData { cx, cz, ground_up_continuous, primary_bit_mask, data } => {
        p.write_i32(*cx);
        p.write_i32(*cz);
        p.write_bool(*ground_up_continuous);
        p.write_u16(*primary_bit_mask);
        p.write_varint(data.len() as i32);
        p.write_bytes(data);
      }
      PlayerListAddItem { uuid, username, gamemode, ping } => {
        p.write_varint(0);
        p.write_varint(1);
        p.write_str(uuid);
        p.write_str(username);
        p.write_varint(0); // no properties
        p.write_varint(*gamemode);
        p.write_varint(*ping);
        p.write_bool(false); // no display name
      }
      PlayerListRemoveItem { uuid } => {
        p.write_varint(4);
        p.write_varint(1);
        p.write_str(uuid);
      }
      Disconnect { json_reason } => p.write_str(json_reason),
    }
    p
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::protocol::State;
  use pretty_assertions::assert_eq;

  #[test]
  fn handshake_roundtrip() {
    let mut p = Packet::unreserved();
    p.write_varint(47);
    p.write_str("x");
    p.write_u16(0);
    p.write_varint(1);
    let mut r = PacketReader::new(p.into_vec());
    let opcode = r.read_varint().unwrap();
    let decoded = ServerBound::decode(State::Handshake, opcode, &mut r).unwrap().unwrap();
    match decoded {
      ServerBound::Handshake { version, address, port, next_state } => {
        assert_eq!(version, 47);
        assert_eq!(address, "x");
        assert_eq!(port, 0);
        assert_eq!(next_state, 1);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn out_of_range_opcode_is_an_error() {
    let mut r = PacketReader::new(vec![]);
    assert!(ServerBound::decode(State::Play, 0xFF, &mut r).is_err());
  }

  #[test]
  fn in_range_unimplemented_opcode_is_silently_ignored() {
    let mut r = PacketReader::new(vec![]);
    assert!(ServerBound::decode(State::Play, 0x02, &mut r).unwrap().is_none());
  }

  #[test]
  fn empty_slot_roundtrips() {
    let mut p = Packet::unreserved();
    RawSlot::EMPTY.write(&mut p);
    let mut r = PacketReader::new(p.into_vec());
    assert_eq!(RawSlot::read(&mut r).unwrap(), RawSlot::EMPTY);
  }

  #[test]
  fn join_game_encodes_expected_opcode() {
    let pkt = ClientBound::JoinGame {
      entity_id:     1,
      gamemode:      1,
      dimension:     0,
      difficulty:    0,
      max_players:   20,
      level_type:    "default".into(),
      reduced_debug: true,
    };
    assert_eq!(pkt.opcode(), 0x01);
    let body = pkt.encode().into_vec();
    let mut r = PacketReader::new(body);
    assert_eq!(r.read_varint().unwrap(), 0x01);
  }
}
