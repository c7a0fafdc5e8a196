//! One reactor worker's event loop: its own `mio::Poll`, its own slice of
//! connections, and the 20 ms tick driving disconnect teardown (§4.5, §5).
//! Grounded on `sc_server::net::ConnectionManager::run`'s accept/poll/
//! dispatch loop, reshaped so each reactor owns an independent event base
//! instead of sharing one `Poll` across a thread pool (§9 Design Notes).
//!
//! A connection's socket I/O lives entirely here; [`super::connection::Connection`]
//! only ever sees already-read bytes in and framed bytes out, so it can stay
//! unit-testable without a real socket.

use super::connection::{Connection, READ_CHUNK_SIZE};
use crate::server::Shared;
use mio::{event::Event, net::TcpListener, net::TcpStream, Events, Interest, Poll, Token, Waker};
use parking_lot::Mutex;
use std::{
  collections::HashMap,
  io::{ErrorKind, Read, Write},
  sync::Arc,
  time::Duration,
};

const LISTEN: Token = Token(usize::MAX);
const WAKE: Token = Token(usize::MAX - 1);
const TICK_INTERVAL: Duration = Duration::from_millis(20);

struct Slot {
  stream: TcpStream,
  conn: Arc<Mutex<Connection>>,
  /// Bytes already drained from `conn`'s outbound queue but not yet fully
  /// written to the socket (§4.5's write-side backpressure).
  pending_write: Vec<u8>,
  writable_registered: bool,
}

/// Runs this reactor's event loop forever. `listener` is this thread's own
/// handle on the shared bound socket, raced against every other reactor's
/// own `accept()` (§5).
pub fn run(id: usize, listener: std::net::TcpListener, shared: Arc<Shared>) -> std::io::Result<()> {
  let mut poll = Poll::new()?;
  let mut events = Events::with_capacity(256);
  let mut listener = TcpListener::from_std(listener);
  poll.registry().register(&mut listener, LISTEN, Interest::READABLE)?;
  let _waker = Waker::new(poll.registry(), WAKE)?;

  let mut conns: HashMap<Token, Slot> = HashMap::new();
  let mut next_token: usize = 0;

  loop {
    poll.poll(&mut events, Some(TICK_INTERVAL))?;

    let mut dead = Vec::new();
    for event in events.iter() {
      match event.token() {
        LISTEN => accept_all(&mut poll, &mut listener, &mut conns, &mut next_token, &shared, id),
        WAKE => {
          // A background job finished and may have queued outbound bytes;
          // the sweep below rechecks every connection regardless.
        }
        token => {
          if let Some(slot) = conns.get_mut(&token) {
            if handle_event(&mut poll, token, slot, event) {
              dead.push(token);
            }
          }
        }
      }
    }
    remove(&mut poll, &mut conns, dead);

    let mut dead = Vec::new();
    for (token, slot) in conns.iter_mut() {
      if flush(&mut poll, *token, slot) {
        dead.push(*token);
        continue;
      }
      if slot.conn.lock().tick() {
        shared.registry.move_to_gray(&slot.conn);
        dead.push(*token);
      }
    }
    remove(&mut poll, &mut conns, dead);
  }
}

fn accept_all(
  poll: &mut Poll,
  listener: &mut TcpListener,
  conns: &mut HashMap<Token, Slot>,
  next_token: &mut usize,
  shared: &Arc<Shared>,
  id: usize,
) {
  loop {
    let (mut stream, peer) = match listener.accept() {
      Ok(v) => v,
      Err(e) if e.kind() == ErrorKind::WouldBlock => return,
      Err(e) => {
        warn!("reactor {id}: accept failed: {e}");
        return;
      }
    };
    let token = Token(*next_token);
    *next_token += 1;
    if let Err(e) = poll.registry().register(&mut stream, token, Interest::READABLE) {
      warn!("reactor {id}: failed to register {peer}: {e}");
      continue;
    }
    let conn = Arc::new(Mutex::new(Connection::new(peer, shared.clone())));
    conn.lock().attach_self(Arc::downgrade(&conn));
    shared.registry.add_live(conn.clone());
    conns.insert(token, Slot { stream, conn, pending_write: Vec::new(), writable_registered: false });
  }
}

/// Returns `true` if this connection should be torn down.
fn handle_event(poll: &mut Poll, token: Token, slot: &mut Slot, event: &Event) -> bool {
  if event.is_readable() && read_ready(slot) {
    return true;
  }
  if event.is_writable() && write_pending(poll, token, slot) {
    return true;
  }
  false
}

/// Reads everything currently available, feeding it through the
/// connection's framing pipeline and dispatching each whole packet onto the
/// connection's sequence class (§4.5) rather than running it inline here.
fn read_ready(slot: &mut Slot) -> bool {
  let mut buf = [0u8; READ_CHUNK_SIZE];
  loop {
    match slot.stream.read(&mut buf) {
      Ok(0) => return true,
      Ok(n) => {
        let inbound = {
          let mut conn = slot.conn.lock();
          match conn.feed(&buf[..n]) {
            Ok(v) => v,
            Err(e) => {
              debug!("{}: {e}", conn.peer_addr);
              conn.disconnect(e.to_string());
              return false;
            }
          }
        };
        for item in inbound {
          let conn = slot.conn.clone();
          let seq = slot.conn.lock().seq();
          seq.enqueue(move || {
            let mut c = conn.lock();
            if let Err(e) = c.dispatch(item) {
              debug!("{}: {e}", c.peer_addr);
              c.disconnect(e.to_string());
            }
          });
        }
      }
      Err(e) if e.kind() == ErrorKind::WouldBlock => return false,
      Err(e) if e.kind() == ErrorKind::Interrupted => continue,
      Err(_) => return true,
    }
  }
}

/// Drains anything newly queued by a handler job, appends it to this slot's
/// write backlog, and tries to push the backlog to the socket.
fn flush(poll: &mut Poll, token: Token, slot: &mut Slot) -> bool {
  for packet in slot.conn.lock().drain_outbound() {
    slot.pending_write.extend_from_slice(&packet);
  }
  write_pending(poll, token, slot)
}

/// Returns `true` if the connection should be torn down.
fn write_pending(poll: &mut Poll, token: Token, slot: &mut Slot) -> bool {
  while !slot.pending_write.is_empty() {
    match slot.stream.write(&slot.pending_write) {
      Ok(0) => break,
      Ok(n) => {
        slot.pending_write.drain(..n);
      }
      Err(e) if e.kind() == ErrorKind::WouldBlock => {
        set_writable_interest(poll, token, slot, true);
        return false;
      }
      Err(e) if e.kind() == ErrorKind::Interrupted => continue,
      Err(_) => return true,
    }
  }
  set_writable_interest(poll, token, slot, false);
  false
}

fn set_writable_interest(poll: &mut Poll, token: Token, slot: &mut Slot, want: bool) {
  if want == slot.writable_registered {
    return;
  }
  let interest = if want { Interest::READABLE | Interest::WRITABLE } else { Interest::READABLE };
  let _ = poll.registry().reregister(&mut slot.stream, token, interest);
  slot.writable_registered = want;
}

fn remove(poll: &mut Poll, conns: &mut HashMap<Token, Slot>, tokens: Vec<Token>) {
  for token in tokens {
    if let Some(mut slot) = conns.remove(&token) {
      let _ = poll.registry().deregister(&mut slot.stream);
    }
  }
}
