#[macro_use]
extern crate log;

pub mod buffer;
pub mod chat;
pub mod codec;
pub mod logging;
pub mod nbt;
pub mod uuid;

pub use buffer::{Packet, PacketReader};
pub use codec::{CodecError, VarintState};
pub use uuid::Uuid;
