//! Error kinds (§7). Every variant here corresponds to one of the closing
//! conditions in the error handling design: the connection handler matches
//! on these to decide whether to just log, or log and close.

use bw_common::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
  #[error("protocol violation: {0}")]
  Violation(String),

  #[error("codec error: {0}")]
  Codec(#[from] CodecError),

  #[error("opcode {opcode:#x} out of range for state {state}")]
  OpcodeOutOfRange { state: &'static str, opcode: i32 },

  #[error("unsupported protocol version {0} (expected 47)")]
  UnsupportedVersion(i32),

  #[error("cryptographic failure: {0}")]
  Crypto(String),

  #[error("verification token mismatch")]
  TokenMismatch,

  #[error("shared secret length {0} != 16")]
  BadSecretLength(usize),

  #[error("server is full")]
  ServerFull,

  #[error("transformer failure: {0}")]
  Transformer(String),

  #[error("keep-alive timeout")]
  KeepAliveTimeout,

  #[error("chunk ({cx}, {cz}) is not loaded")]
  ChunkNotLoaded { cx: i32, cz: i32 },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl ProtoError {
  /// Whether this error should close the connection, per §7's policy: every
  /// handler either succeeds fully or closes, no partial states survive.
  pub fn closes_connection(&self) -> bool { true }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
