pub mod agent;
pub mod types;

pub use agent::Agent;
pub use types::{AgentEvent, AgentEventType};
