#[macro_use]
extern crate log;

pub mod concurrency;
pub mod config;
pub mod entity;
pub mod error;
pub mod net;
pub mod player;
pub mod server;
pub mod world;

pub use error::ProtoError;
pub use server::Server;
