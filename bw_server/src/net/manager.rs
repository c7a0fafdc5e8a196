//! Spawns and supervises the reactor worker threads (§4.2, §5: "N reactor
//! workers (default 2), each running a nonblocking event loop on its own
//! event base"). Grounded on `sc_server::net::ConnectionManager::run`'s
//! accept/poll loop, but split one step further: each worker here owns an
//! independent `mio::Poll` and races the others on `accept()`, rather than
//! funnelling every event through one poll instance and a thread pool (§9
//! Design Notes).

use super::reactor;
use crate::server::Shared;
use std::{
  net::{SocketAddr, TcpListener},
  sync::Arc,
};

pub struct ConnectionManager {
  shared: Arc<Shared>,
}

impl ConnectionManager {
  pub fn new(shared: Arc<Shared>) -> Self { ConnectionManager { shared } }

  /// Binds `addr` and spawns `workers` reactor threads, each with its own
  /// cloned listener handle racing the others on `accept()`. Returns once
  /// every thread has been spawned; the threads themselves run for the
  /// lifetime of the process.
  pub fn run(&self, addr: SocketAddr, workers: usize) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    for id in 0..workers {
      let listener = listener.try_clone()?;
      let shared = self.shared.clone();
      std::thread::Builder::new()
        .name(format!("reactor-{id}"))
        .spawn(move || {
          if let Err(e) = reactor::run(id, listener, shared) {
            error!("reactor {id} exited: {e}");
          }
        })?;
    }
    Ok(())
  }
}
