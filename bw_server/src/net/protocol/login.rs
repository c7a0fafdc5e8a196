//! Login-state dispatch (§4.6): username intake, the optional RSA/AES
//! encryption handshake, and the login-finalization packet burst. Grounded
//! on `sc_proxy::conn::State::Login`'s encryption-response handling, with
//! the online-mode auth-server round trip out of scope (§1) — usernames are
//! always resolved to an offline-style v3 UUID.

use super::State;
use crate::{
  entity::Position,
  error::{ProtoError, Result},
  net::{connection::Connection, packet::{ClientBound, ServerBound}},
  player::Player,
};
use bw_common::uuid::{self, Uuid};
use rand::Rng;

/// Per-connection login scratch state, reset implicitly once the connection
/// leaves this state (a fresh [`Connection`] is never reused across logins).
#[derive(Debug, Default)]
pub struct LoginState {
  verify_token: [u8; 4],
  username:     Option<String>,
}

pub fn handle(conn: &mut Connection, packet: ServerBound) -> Result<()> {
  match packet {
    ServerBound::LoginStart { username } => {
      conn.login.username = Some(username.clone());
      if conn.shared.config.net.encryption {
        let token: [u8; 4] = rand::thread_rng().gen();
        conn.login.verify_token = token;
        conn.send(ClientBound::EncryptionRequest {
          public_key_der: conn.shared.keypair.public_key_der().to_vec(),
          verify_token: token,
        });
        Ok(())
      } else {
        let uuid = uuid::generate_v3(&username);
        finish_login(conn, username, uuid)
      }
    }
    ServerBound::EncryptionResponse { shared_secret, verify_token } => {
      let secret = conn.shared.keypair.decrypt(&shared_secret)?;
      let token = conn.shared.keypair.decrypt(&verify_token)?;
      if token != conn.login.verify_token {
        return Err(ProtoError::TokenMismatch);
      }
      if secret.len() != 16 {
        return Err(ProtoError::BadSecretLength(secret.len()));
      }
      let mut key = [0u8; 16];
      key.copy_from_slice(&secret);
      conn.encryption_mut().enable(&key);
      conn.encryption_mut().start();

      let username = conn
        .login
        .username
        .clone()
        .ok_or_else(|| ProtoError::Violation("encryption response before login start".into()))?;
      let uuid = uuid::generate_v3(&username);
      finish_login(conn, username, uuid)
    }
    _ => Ok(()),
  }
}

/// Sends the login-success/join-game burst and attaches a new [`Player`] to
/// this connection (§4.6, §8 scenario 3). Order: `LoginSuccess`, `JoinGame`,
/// `SpawnPosition`, `PlayerPositionLook`, then — only once all of the above
/// went out uncompressed — `SetCompression`, after which compression turns
/// on for everything that follows.
fn finish_login(conn: &mut Connection, username: String, uuid: Uuid) -> Result<()> {
  let max_players = conn.shared.config.general.max_players as usize;
  if conn.shared.registry.player_count() >= max_players {
    let reason = bw_common::chat::Chat::new("Server is full").to_json();
    conn.send_and_disconnect(ClientBound::LoginDisconnect { json_reason: reason }, ProtoError::ServerFull.to_string());
    return Ok(());
  }

  conn.send(ClientBound::LoginSuccess { uuid: uuid::format_dashed(uuid), username: username.clone() });
  conn.set_state(State::Play);

  let handle = conn
    .weak_handle()
    .ok_or_else(|| ProtoError::Violation("connection not yet attached to its own handle".into()))?;
  let player = Player::new(handle, uuid, username);
  conn.player = Some(player.clone());

  let world = conn.shared.main_world();
  let spawn = world.spawn();

  conn.send(ClientBound::JoinGame {
    entity_id:     player.eid(),
    gamemode:      player.game_mode(),
    dimension:     0,
    difficulty:    0,
    max_players:   conn.shared.config.general.max_players.clamp(0, 255) as u8,
    level_type:    "default".into(),
    reduced_debug: true,
  });
  conn.send(ClientBound::SpawnPosition { x: spawn.x as i32, y: spawn.y as i32, z: spawn.z as i32 });
  conn.send(ClientBound::PlayerPositionLook {
    x: spawn.x,
    y: spawn.y,
    z: spawn.z,
    yaw: spawn.yaw,
    pitch: spawn.pitch,
    flags: 0,
  });

  let threshold = conn.shared.config.net.compression.threshold;
  if threshold > 0 {
    conn.send(ClientBound::SetCompression { threshold: threshold as i32 });
    conn.compression_mut().setup(threshold, conn.shared.config.net.compression.level);
    conn.compression_mut().start();
  }

  announce_join(&player, &world, spawn);

  world.load_chunk(spawn.chunk_x(), spawn.chunk_z());
  player.join_world(world, spawn);
  player.spawn_entity(spawn)?;
  Ok(())
}

/// Tells every player already in `world` about the new arrival, and the new
/// arrival about them, via the player-list and spawn-player opcodes (§6's
/// opcode table, 0x38 and 0x0C). Run before [`Player::join_world`] adds the
/// new player to `world`'s own list, so it isn't told about itself.
fn announce_join(player: &std::sync::Arc<Player>, world: &std::sync::Arc<crate::world::World>, pos: Position) {
  let uuid = uuid::format_dashed(player.uuid());
  for other in world.players() {
    other.send(ClientBound::PlayerListAddItem {
      uuid: uuid.clone(),
      username: player.username().to_string(),
      gamemode: player.game_mode() as i32,
      ping: 0,
    });
    other.send(ClientBound::SpawnPlayer {
      entity_id: player.eid(),
      uuid: uuid.clone(),
      x: pos.x,
      y: pos.y,
      z: pos.z,
      yaw: pos.yaw,
      pitch: pos.pitch,
    });
    player.send(ClientBound::PlayerListAddItem {
      uuid: uuid::format_dashed(other.uuid()),
      username: other.username().to_string(),
      gamemode: other.game_mode() as i32,
      ping: 0,
    });
  }
}
