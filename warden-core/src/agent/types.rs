use serde::{Deserialize, Serialize};

use super::agent::Agent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentEventType {
    Add,
    Update,
    Delete,
}

/// AgentEvent is published to every watcher on agent lifecycle changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub event_type: AgentEventType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Agent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Agent>,
}

impl AgentEvent {
    pub fn added(agent: Agent) -> Self {
        Self {
            event_type: AgentEventType::Add,
            old: None,
            new: Some(agent),
        }
    }

    pub fn updated(old: Agent, new: Agent) -> Self {
        Self {
            event_type: AgentEventType::Update,
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn deleted(old: Agent) -> Self {
        Self {
            event_type: AgentEventType::Delete,
            old: Some(old),
            new: None,
        }
    }
}
