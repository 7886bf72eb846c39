use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::types::HubError;
use crate::store::types::{composite_key, Document};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Invited,
    Completed,
}

/// connection_key is the natural key of an [`AgentConnection`], it makes the pair
/// (agent, external id) unique
pub fn connection_key(agent: &str, external_id: &str) -> String {
    composite_key(agent, external_id)
}

/// AgentConnection binds an agent and an external subject to a DIDComm connection
///
/// The DIDs are only set once the bootstrap completes and never change afterwards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConnection {
    pub id: String,
    pub agent: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    #[serde(rename = "invitationID")]
    pub invitation_id: String,

    #[serde(rename = "myDID", default, skip_serializing_if = "Option::is_none")]
    pub my_did: Option<String>,

    #[serde(rename = "theirDID", default, skip_serializing_if = "Option::is_none")]
    pub their_did: Option<String>,

    #[serde(rename = "theirLabel", default, skip_serializing_if = "Option::is_none")]
    pub their_label: Option<String>,

    #[serde(rename = "connectionID", default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    pub state: ConnectionState,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl AgentConnection {
    pub fn invited(agent: &str, external_id: &str, invitation_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            agent: agent.to_string(),
            external_id: external_id.to_string(),
            invitation_id: invitation_id.to_string(),
            my_did: None,
            their_did: None,
            their_label: None,
            connection_id: None,
            state: ConnectionState::Invited,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == ConnectionState::Completed && self.my_did.is_some() && self.their_did.is_some()
    }

    /// dids returns `(my_did, their_did)` of a completed connection
    pub fn dids(&self) -> Option<(String, String)> {
        match (&self.my_did, &self.their_did) {
            (Some(mine), Some(theirs)) if self.is_completed() => {
                Some((mine.clone(), theirs.clone()))
            }
            _ => None,
        }
    }
}

/// require_completed loads the connection of `(agent, external_id)` and checks it can carry a
/// credential or presentation exchange
pub async fn require_completed(
    store: &Store,
    agent: &str,
    external_id: &str,
) -> Result<AgentConnection, HubError> {
    let conn = store
        .find::<AgentConnection>(&connection_key(agent, external_id))
        .await?
        .ok_or_else(|| {
            HubError::NotFound(format!("connection {} of agent {}", external_id, agent))
        })?;

    if !conn.is_completed() {
        return Err(HubError::FailedPrecondition(format!(
            "connection {} of agent {} is not completed",
            external_id, agent
        )));
    }

    Ok(conn)
}

impl Document for AgentConnection {
    const COLLECTION: &'static str = "agent-connections";

    fn key(&self) -> String {
        connection_key(&self.agent, &self.external_id)
    }
}
