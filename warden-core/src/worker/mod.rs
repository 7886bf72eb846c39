//! `worker` drains a protocol queue into the protocol handlers
pub mod types;
pub mod worker;

pub use types::{Inbound, ProtocolHandler};
pub use worker::Worker;
