//! The four-state protocol state machine (§3, §4.6), grounded on
//! `sc_proxy::conn::State` for the state set and on `bb_server::net::packet`
//! for the per-state dispatch style.

pub mod handshake;
pub mod login;
pub mod play;
pub mod status;

use crate::{
  error::Result,
  net::{connection::Connection, packet::ServerBound},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Handshake,
  Status,
  Login,
  Play,
}

impl State {
  pub fn name(&self) -> &'static str {
    match self {
      State::Handshake => "handshake",
      State::Status => "status",
      State::Login => "login",
      State::Play => "play",
    }
  }

  /// Highest valid server-bound opcode for this state; anything above this
  /// closes the connection, per §4.6's dispatch rule.
  pub fn max_opcode(&self) -> i32 {
    match self {
      State::Handshake => 0x00,
      State::Status => 0x01,
      State::Login => 0x01,
      State::Play => 0x10,
    }
  }
}

/// Dispatches one fully-decoded packet to its state's handler. Called from
/// the connection's sequence-class job (§4.5), never from the reactor
/// thread.
pub fn dispatch(conn: &mut Connection, packet: ServerBound) -> Result<()> {
  match conn.state() {
    State::Handshake => handshake::handle(conn, packet),
    State::Status => status::handle(conn, packet),
    State::Login => login::handle(conn, packet),
    State::Play => play::handle(conn, packet),
  }
}
