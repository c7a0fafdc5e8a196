//! Play-state dispatch (§4.6, §6): movement, chat, digging/placement, and
//! the inventory opcodes. Grounded on `src/network/handlers/mc18.cpp`'s
//! `handle_packet_play_*` family, folded down to this crate's in-scope
//! subset — §9's open question on `click_window` leaves that handler's
//! game-logic effect out of scope, so it only does the bookkeeping the
//! protocol itself requires (closing/opening are not modelled, there being
//! no server-opened windows yet).

use super::State;
use crate::{
  error::Result,
  net::{connection::Connection, packet::ServerBound},
};

pub fn handle(conn: &mut Connection, packet: ServerBound) -> Result<()> {
  let Some(player) = conn.player.clone() else {
    // A Play-state packet with no attached player can't happen on a
    // well-behaved client (login always attaches one before advancing the
    // connection's state), but a malformed client could still get here.
    return Ok(());
  };

  match packet {
    ServerBound::KeepAlive { id } => player.handle_keep_alive(id),

    ServerBound::Chat { message } => broadcast_chat(conn, &player, &message),

    ServerBound::Player { .. } => {}

    ServerBound::PlayerPosition { x, y, z, .. } => {
      let mut pos = player.position();
      pos.x = x;
      pos.y = y;
      pos.z = z;
      player.on_move(pos);
    }

    ServerBound::PlayerLook { yaw, pitch, .. } => {
      let mut pos = player.position();
      pos.yaw = yaw;
      pos.pitch = pitch;
      player.on_move(pos);
    }

    ServerBound::PlayerPositionLook { x, y, z, yaw, pitch, .. } => {
      let mut pos = player.position();
      pos.x = x;
      pos.y = y;
      pos.z = z;
      pos.yaw = yaw;
      pos.pitch = pitch;
      player.on_move(pos);
    }

    ServerBound::PlayerDigging { status, x, y, z, face: _ } => {
      // 0 = started digging, 2 = finished digging (vanilla 1.8's subset of
      // `sb::PlayerDigging` status codes); everything else (cancel,
      // drop item, shoot arrow, swap item in hand) has no block effect.
      if status == 2 {
        if let Some(world) = player.world() {
          world.set_id(x, y, z, 0);
        }
      }
    }

    ServerBound::BlockPlacement { x, y, z, face, held_item, .. } => {
      if let Some(world) = player.world() {
        if held_item.id >= 0 {
          let (dx, dy, dz) = face_offset(face);
          world.set_id(x + dx, y + dy, z + dz, held_item.id as u16);
        }
      }
    }

    ServerBound::HeldItemChange { .. } => {}

    ServerBound::CloseWindow { .. } => {}

    // The click-window handler's game-logic effect is an open question
    // left out of scope (§9); the opcode is still accepted so the
    // connection never closes over it.
    ServerBound::ClickWindow { .. } => {}

    ServerBound::CreativeInventoryAction { slot, item } => {
      if slot >= 0 {
        player.window().lock().set(slot as usize, item);
      }
    }

    _ => {}
  }
  Ok(())
}

/// Maps a digging/placement face byte to the unit offset of the block it
/// points at (§6's opcode table: bottom, top, north, south, west, east).
fn face_offset(face: i8) -> (i32, i32, i32) {
  match face {
    0 => (0, -1, 0),
    1 => (0, 1, 0),
    2 => (0, 0, -1),
    3 => (0, 0, 1),
    4 => (-1, 0, 0),
    5 => (1, 0, 0),
    _ => (0, 0, 0),
  }
}

/// Relays a chat message to every player in the sender's world, prefixed
/// with their username (§6's minimum-viable chat component).
fn broadcast_chat(conn: &Connection, player: &std::sync::Arc<crate::player::Player>, message: &str) {
  let Some(world) = player.world() else { return };
  let text = format!("<{}> {}", player.username(), message);
  info!("{}: {}", conn.peer_addr, message);
  for other in world.players() {
    other.message(text.clone());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{net::packet::RawSlot, server::Shared};
  use std::sync::Weak;

  fn test_conn_with_player() -> (Connection, std::sync::Arc<crate::player::Player>) {
    let shared = Shared::for_tests();
    let mut conn = Connection::new("127.0.0.1:0".parse().unwrap(), shared.clone());
    conn.set_state(State::Play);
    let player = crate::player::Player::new(Weak::new(), bw_common::uuid::generate_v4(), "t".into());
    let world = shared.main_world();
    world.load_chunk(0, 0);
    player.join_world(world, crate::entity::Position::new(0.5, 66.0, 0.5));
    conn.player = Some(player.clone());
    (conn, player)
  }

  #[test]
  fn finished_digging_clears_the_block() {
    let (mut conn, player) = test_conn_with_player();
    let world = player.world().unwrap();
    world.set_id(0, 60, 0, 1);
    assert_eq!(world.get_id(0, 60, 0), 1);
    handle(&mut conn, ServerBound::PlayerDigging { status: 2, x: 0, y: 60, z: 0, face: 1 }).unwrap();
    assert_eq!(world.get_id(0, 60, 0), 0);
  }

  #[test]
  fn block_placement_sets_the_adjacent_cell() {
    let (mut conn, player) = test_conn_with_player();
    let world = player.world().unwrap();
    handle(&mut conn, ServerBound::BlockPlacement {
      x: 0,
      y: 60,
      z: 0,
      face: 1, // top
      held_item: RawSlot { id: 1, count: 1, damage: 0, nbt: None },
      cx: 8,
      cy: 8,
      cz: 8,
    })
    .unwrap();
    assert_eq!(world.get_id(0, 61, 0), 1);
  }

  #[test]
  fn creative_inventory_action_sets_the_slot() {
    let (mut conn, player) = test_conn_with_player();
    handle(&mut conn, ServerBound::CreativeInventoryAction {
      slot: 5,
      item: RawSlot { id: 1, count: 1, damage: 0, nbt: None },
    })
    .unwrap();
    assert_eq!(player.window().lock().get(5).id, 1);
  }
}
