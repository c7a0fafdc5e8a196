//! Status-state dispatch (§4.6, §6): server list ping. Grounded on
//! `bb_server::net::packet`'s status handler shape, with the JSON payload
//! built directly rather than through a typed status-response struct since
//! §6 specifies the document verbatim.

use crate::{
  error::Result,
  net::{connection::Connection, packet::{ClientBound, ServerBound}},
};
use serde_json::json;

pub fn handle(conn: &mut Connection, packet: ServerBound) -> Result<()> {
  match packet {
    ServerBound::StatusRequest => {
      let shared = &conn.shared;
      let json = json!({
        "version": { "name": "1.8", "protocol": crate::net::packet::PROTOCOL_VERSION },
        "players": {
          "max": shared.config.general.max_players,
          "online": shared.registry.player_count(),
          "sample": [],
        },
        "description": { "text": shared.config.general.motd },
      });
      conn.send(ClientBound::StatusResponse { json: json.to_string() });
      Ok(())
    }
    ServerBound::StatusPing { payload } => {
      // Status-ping is the terminal step of this state; a clean close may
      // follow the pong (§4.6's tie-break).
      conn.send_and_disconnect(ClientBound::StatusPong { payload }, "status ping complete");
      Ok(())
    }
    _ => Ok(()),
  }
}
