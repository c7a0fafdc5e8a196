//! Handshake-state dispatch (§4.6): the single inbound packet that picks
//! the protocol version and the next state. Grounded on
//! `sc_proxy::conn::State::Handshake`'s handling of the same packet, folded
//! down to this crate's one supported protocol version.

use super::State;
use crate::{
  error::{ProtoError, Result},
  net::{connection::Connection, packet::{PROTOCOL_VERSION, ServerBound}},
};

/// Scenario 1 (§8): a version mismatch closes the connection with no reply,
/// regardless of which state the client asked to move to next.
pub fn handle(conn: &mut Connection, packet: ServerBound) -> Result<()> {
  match packet {
    ServerBound::Handshake { version, next_state, .. } => {
      if version != PROTOCOL_VERSION {
        return Err(ProtoError::UnsupportedVersion(version));
      }
      match next_state {
        1 => conn.set_state(State::Status),
        2 => conn.set_state(State::Login),
        _ => return Err(ProtoError::Violation(format!("bad next_state {next_state}"))),
      }
      Ok(())
    }
    _ => Ok(()),
  }
}
