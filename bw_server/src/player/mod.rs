//! A connected player (§3, §4.11), grounded on `include/player/player.hpp`.
//!
//! **Shared mutable back-reference.** The original's `player` holds a raw
//! `connection&` while the connection owns the player through a
//! `shared_ptr` — a cycle broken only by C++ convention. Per §9 Design
//! Notes ("the player holds a non-owning reference to its connection"),
//! this port makes that explicit: [`Player`] stores a `Weak` handle into the
//! connection, which is owned (as an `Arc<Mutex<_>>`) by
//! [`crate::net::manager::ConnectionManager`]. Background jobs extend the
//! player's own lifetime by holding an `Arc<Player>`, standing in for the
//! original's `ref_counter` (see `concurrency::pool`'s module doc).

pub mod window;

use crate::{
  entity::{next_eid, Entity, Position, Volume},
  error::{ProtoError, Result},
  net::{connection::Connection, packet::ClientBound},
  world::{async_gen::Token, World},
};
use bw_common::{chat::Chat, uuid::Uuid};
use parking_lot::Mutex;
use rand::Rng;
use std::{
  collections::HashSet,
  sync::{
    atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering},
    Arc, Weak,
  },
};
use window::Window;

/// How many chunks out, in each direction, a player's view extends (§8
/// scenario 5). Not part of the configuration schema (§6 lists no such
/// key), so it is a server-wide constant rather than a per-player setting.
pub const VIEW_DISTANCE: i32 = 2;

struct JoinedWorld {
  world: Arc<World>,
  token: Token,
}

pub struct Player {
  conn: Weak<Mutex<Connection>>,
  uuid: Uuid,
  name: String,

  ka_expecting: AtomicBool,
  ka_id:        AtomicI32,

  joined:      Mutex<Option<JoinedWorld>>,
  vis_chunks:  Mutex<HashSet<(i32, i32)>>,
  pos:         Mutex<Position>,
  spawned:     AtomicBool,
  spawn_pos:   Mutex<Position>,

  eid:       i32,
  entity:    Mutex<Entity>,
  game_mode: AtomicU8,
  window:    Mutex<Window>,
}

impl Player {
  pub fn new(conn: Weak<Mutex<Connection>>, uuid: Uuid, name: String) -> Arc<Self> {
    let eid = next_eid();
    let mut window = Window::new(0, 45);
    window.push_add_range(9, 44); // main inventory; hotbar/crafting slot mechanics are out of scope
    Arc::new(Player {
      conn,
      uuid,
      name,
      ka_expecting: AtomicBool::new(false),
      ka_id: AtomicI32::new(0),
      joined: Mutex::new(None),
      vis_chunks: Mutex::new(HashSet::new()),
      pos: Mutex::new(Position::new(0.0, 0.0, 0.0)),
      spawned: AtomicBool::new(false),
      spawn_pos: Mutex::new(Position::new(0.0, 0.0, 0.0)),
      eid,
      entity: Mutex::new(Entity::new("", Position::new(0.0, 0.0, 0.0), Volume::PLAYER)),
      game_mode: AtomicU8::new(1), // creative: this crate ships no survival mechanics
      window: Mutex::new(window),
    })
  }

  pub fn uuid(&self) -> Uuid { self.uuid }
  pub fn username(&self) -> &str { &self.name }
  pub fn eid(&self) -> i32 { self.eid }
  pub fn position(&self) -> Position { *self.pos.lock() }
  pub fn game_mode(&self) -> u8 { self.game_mode.load(Ordering::Relaxed) }
  pub fn window(&self) -> &Mutex<Window> { &self.window }
  pub fn world(&self) -> Option<Arc<World>> { self.joined.lock().as_ref().map(|j| j.world.clone()) }

  /// Runs `f` against this player's connection if it's still alive. Returns
  /// `None` if the connection has already been torn down (§9: the
  /// reference the player holds is non-owning).
  fn with_connection<R>(&self, f: impl FnOnce(&mut Connection) -> R) -> Option<R> {
    let conn = self.conn.upgrade()?;
    let mut guard = conn.lock();
    Some(f(&mut guard))
  }

  pub fn send(&self, packet: ClientBound) { self.with_connection(|c| c.send(packet)); }

  /// Sends a plain chat message, old-style formatting assumed client-side
  /// (§6's minimum-viable chat component).
  pub fn message(&self, text: impl Into<String>) {
    self.send(ClientBound::Chat { json: Chat::new(text.into()).to_json(), position: 0 });
  }

  /// Disconnects with a reason (§4.11's kick path).
  pub fn kick(&self, reason: impl Into<String>) {
    let reason = reason.into();
    let json = Chat::new(reason.clone()).color("red").to_json();
    self.with_connection(|c| c.send_and_disconnect(ClientBound::Disconnect { json_reason: json }, reason));
  }

  /// Sends a Keep-Alive with a fresh random id and marks a response expected
  /// (§4.11's 15 s keep-alive sweep).
  pub fn send_keep_alive(&self) {
    if self.ka_expecting.swap(true, Ordering::SeqCst) {
      self.kick("timed out");
      return;
    }
    let id = rand::thread_rng().gen::<i32>();
    self.ka_id.store(id, Ordering::SeqCst);
    self.send(ClientBound::KeepAlive { id });
  }

  /// Clears the outstanding keep-alive flag if `id` matches what was sent.
  pub fn handle_keep_alive(&self, id: i32) {
    if self.ka_id.load(Ordering::SeqCst) == id {
      self.ka_expecting.store(false, Ordering::SeqCst);
    }
  }

  /// Moves the player to `world` at `pos`, acquiring a fresh async-generation
  /// token and streaming the chunks around the new position (§4.11's
  /// "join_world"). Replaces any previously joined world.
  pub fn join_world(self: &Arc<Self>, world: Arc<World>, pos: Position) {
    {
      let mut joined = self.joined.lock();
      if let Some(prev) = joined.take() {
        prev.world.async_gen().release_token(&prev.token);
        prev.world.remove_player(&self.uuid);
      }
      let token = world.async_gen().acquire_token();
      world.add_player(self.clone());
      *joined = Some(JoinedWorld { world, token });
    }
    *self.pos.lock() = pos;
    *self.spawn_pos.lock() = pos;
    self.vis_chunks.lock().clear();
    self.spawned.store(true, Ordering::SeqCst);
    self.stream_chunks();
  }

  /// Invoked on every inbound movement packet (§4.11's `on_move`). Streams
  /// chunks only when the player's chunk coordinate actually changed — a
  /// no-op otherwise, per §8's boundary test.
  pub fn on_move(self: &Arc<Self>, pos: Position) {
    let crossed = {
      let mut current = self.pos.lock();
      let crossed = current.chunk_x() != pos.chunk_x() || current.chunk_z() != pos.chunk_z();
      *current = pos;
      crossed
    };
    self.entity.lock().move_to(pos);
    if crossed {
      self.stream_chunks();
    }
  }

  /// Sends newly-visible chunks (closest first) and forgets ones now outside
  /// view distance (§4.11, §8 scenario 5).
  fn stream_chunks(self: &Arc<Self>) {
    let Some(world) = self.world() else { return };
    let pos = *self.pos.lock();
    let (cx0, cz0) = (pos.chunk_x(), pos.chunk_z());

    let mut wanted: Vec<(i32, i32)> = Vec::new();
    for dx in -VIEW_DISTANCE..=VIEW_DISTANCE {
      for dz in -VIEW_DISTANCE..=VIEW_DISTANCE {
        wanted.push((cx0 + dx, cz0 + dz));
      }
    }
    wanted.sort_by_key(|(cx, cz)| {
      let dx = (cx - cx0) as i64;
      let dz = (cz - cz0) as i64;
      dx * dx + dz * dz
    });

    let mut vis = self.vis_chunks.lock();
    let wanted_set: HashSet<(i32, i32)> = wanted.iter().copied().collect();
    let stale: Vec<(i32, i32)> = vis.iter().copied().filter(|c| !wanted_set.contains(c)).collect();
    for c in stale {
      vis.remove(&c);
    }
    drop(vis);

    let Some(token) = self.joined.lock().as_ref().map(|j| j.token) else { return };
    for (cx, cz) in wanted {
      if self.vis_chunks.lock().contains(&(cx, cz)) {
        continue;
      }
      self.vis_chunks.lock().insert((cx, cz));
      let player = self.clone();
      let world2 = world.clone();
      world.async_gen().generate(world.clone(), &token, cx, cz, move || {
        player.send_chunk(&world2, cx, cz);
      });
    }
  }

  fn send_chunk(&self, world: &Arc<World>, cx: i32, cz: i32) {
    let chunks = world.chunks_mut();
    let Some(chunk) = chunks.get(&(cx, cz)) else { return };
    let (mask, data) = crate::net::chunk_codec::encode_full_chunk(chunk);
    drop(chunks);
    self.send(ClientBound::ChunkData { cx, cz, ground_up_continuous: true, primary_bit_mask: mask, data });
  }

  /// Spawns this player's own entity representation at `pos` inside its
  /// current world. Fails with [`ProtoError::ChunkNotLoaded`] rather than
  /// silently leaving the entity unregistered (§9 open question).
  pub fn spawn_entity(&self, pos: Position) -> Result<()> {
    let world = self.world().ok_or_else(|| ProtoError::ChunkNotLoaded { cx: pos.chunk_x(), cz: pos.chunk_z() })?;
    if !world.has_chunk_loaded(pos.chunk_x(), pos.chunk_z()) {
      return Err(ProtoError::ChunkNotLoaded { cx: pos.chunk_x(), cz: pos.chunk_z() });
    }
    self.entity.lock().spawn(world.name(), pos);
    Ok(())
  }

  /// Called every 20 ms by the connection manager's tick sweep (§4.11).
  pub fn tick(self: &Arc<Self>) {}
}
