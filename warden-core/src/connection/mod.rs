pub mod bouncer;
pub mod connection;

pub use connection::{connection_key, require_completed, AgentConnection, ConnectionState};
